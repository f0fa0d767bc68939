use async_trait::async_trait;
use reqwest::Client;
use statlas_ports::{FetchError, HttpResponse, HttpTransport, SessionFactory};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("statlas/", env!("CARGO_PKG_VERSION"));

/// Opens one `reqwest::Client` (connection pool) per session
#[derive(Debug, Clone)]
pub struct ReqwestSessionFactory {
    request_timeout: Duration,
}

impl ReqwestSessionFactory {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

impl Default for ReqwestSessionFactory {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT)
    }
}

impl SessionFactory for ReqwestSessionFactory {
    fn open(&self) -> Result<Arc<dyn HttpTransport>, FetchError> {
        let client = Client::builder()
            .timeout(self.request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Arc::new(ReqwestTransport { client }))
    }
}

/// HTTP session over a pooled `reqwest::Client`
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    async fn handle_response(&self, resp: reqwest::Response) -> Result<HttpResponse, FetchError> {
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(HttpResponse::new(status, body))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &Url) -> Result<HttpResponse, FetchError> {
        let resp = self
            .client
            .get(url.clone())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        self.handle_response(resp).await
    }
}

use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

use crate::error::FetchError;

/// Raw HTTP response: status code and body text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 200 response with the given body
    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// An open HTTP session (connection pool)
///
/// Only GET is needed: every source exposes read-only REST endpoints.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &Url) -> Result<HttpResponse, FetchError>;
}

/// Opens HTTP sessions
///
/// A connector opens one session when it enters its active scope and drops it
/// on exit. Opening is synchronous so sessions can be released from `Drop`.
pub trait SessionFactory: Send + Sync {
    fn open(&self) -> Result<Arc<dyn HttpTransport>, FetchError>;
}

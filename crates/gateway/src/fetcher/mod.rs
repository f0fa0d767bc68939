//! Rate-limited, cached JSON fetcher
//!
//! Explicit composition of two policies around an HTTP session, applied in a
//! fixed order:
//!
//! ```text
//! fetch(endpoint, params)
//!    │
//!    ├─► cache hit? ──yes──► return cached payload (no slot consumed)
//!    │
//!    ├─► rate gate (sliding window, FIFO waiters)
//!    ├─► cache hit or closed session after the wait? ──► return
//!    ├─► GET base_url/endpoint?params
//!    ├─► validate: 2xx, JSON object or array
//!    └─► store in cache, return
//! ```

mod cache;
mod params;
mod rate_limiter;

pub use cache::{CacheKey, DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL, ResponseCache};
pub use params::QueryParams;
pub use rate_limiter::{DEFAULT_RATE_WINDOW, SlidingWindowLimiter};

use log::{debug, warn};
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use statlas_ports::{FetchError, FetchStats, HttpTransport, SessionFactory};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Fetcher policy configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetcherConfig {
    /// Maximum requests per `rate_window`
    pub rate_limit: u32,
    pub rate_window: Duration,
    pub cache_ttl: Duration,
    pub cache_capacity: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            rate_limit: 60,
            rate_window: DEFAULT_RATE_WINDOW,
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// Performs one HTTP GET per logical call, behind a TTL cache and a
/// sliding-window rate limiter
///
/// Each connector owns exactly one fetcher; cache and limiter are never
/// shared between connectors.
pub struct RateLimitedFetcher {
    /// Source label used in logs
    label: String,
    base_url: Url,
    factory: Arc<dyn SessionFactory>,
    session: RwLock<Option<Arc<dyn HttpTransport>>>,
    cache: Mutex<ResponseCache>,
    limiter: SlidingWindowLimiter,
    stats: Mutex<FetchStats>,
}

impl RateLimitedFetcher {
    pub fn new(
        label: impl Into<String>,
        base_url: Url,
        factory: Arc<dyn SessionFactory>,
        config: FetcherConfig,
    ) -> Self {
        Self {
            label: label.into(),
            base_url,
            factory,
            session: RwLock::new(None),
            cache: Mutex::new(ResponseCache::new(config.cache_ttl, config.cache_capacity)),
            limiter: SlidingWindowLimiter::new(config.rate_limit, config.rate_window),
            stats: Mutex::new(FetchStats::default()),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn rate_limit(&self) -> u32 {
        self.limiter.limit()
    }

    /// Open the HTTP session; a no-op when already open
    pub fn open_session(&self) -> Result<(), FetchError> {
        let mut session = self.session.write();
        if session.is_none() {
            *session = Some(self.factory.open()?);
            debug!("[FETCH] {} session opened", self.label);
        }
        Ok(())
    }

    /// Drop the HTTP session; a no-op when already closed
    pub fn close_session(&self) {
        if self.session.write().take().is_some() {
            debug!("[FETCH] {} session closed", self.label);
        }
    }

    pub fn is_open(&self) -> bool {
        self.session.read().is_some()
    }

    /// Fail-soft fetch: an empty JSON object on any failure
    ///
    /// The failure is logged and counted in [`RateLimitedFetcher::stats`];
    /// the calling connector decides whether an empty payload matters.
    pub async fn fetch(&self, endpoint: &str, params: &QueryParams) -> Value {
        self.try_fetch(endpoint, params)
            .await
            .unwrap_or_else(|_| Value::Object(Map::new()))
    }

    /// Fetch and surface the failure to the caller (still counted in stats)
    pub async fn try_fetch(&self, endpoint: &str, params: &QueryParams) -> Result<Value, FetchError> {
        match self.fetch_inner(endpoint, params).await {
            Ok(payload) => Ok(payload),
            Err(e) => {
                warn!("[FETCH] {} {} failed: {}", self.label, endpoint, e);
                let mut stats = self.stats.lock();
                stats.failures += 1;
                stats.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    fn cached(&self, key: &CacheKey) -> Option<Value> {
        let payload = self.cache.lock().get(key)?;
        debug!("[FETCH] {} cache hit {}", self.label, key);
        self.stats.lock().cache_hits += 1;
        Some(payload)
    }

    fn current_session(&self) -> Result<Arc<dyn HttpTransport>, FetchError> {
        self.session.read().clone().ok_or(FetchError::SessionClosed)
    }

    async fn fetch_inner(&self, endpoint: &str, params: &QueryParams) -> Result<Value, FetchError> {
        self.current_session()?;

        let key = CacheKey::new(endpoint, &params.canonical());
        if let Some(payload) = self.cached(&key) {
            return Ok(payload);
        }

        self.limiter.acquire().await;

        // The wait may span a concurrent fill of the same key or a close
        if let Some(payload) = self.cached(&key) {
            return Ok(payload);
        }
        let session = self.current_session()?;

        let url = self.endpoint_url(endpoint, params)?;
        debug!("[FETCH] {} GET {}", self.label, url);
        self.stats.lock().requests += 1;

        let response = session.get(&url).await?;
        if !response.is_success() {
            return Err(FetchError::Status {
                status: response.status,
                body: truncate(&response.body, 200),
            });
        }

        let payload: Value =
            serde_json::from_str(&response.body).map_err(|e| FetchError::Parse(e.to_string()))?;

        if !(payload.is_object() || payload.is_array()) {
            return Err(FetchError::UnexpectedShape(format!(
                "expected a JSON object or array from {}",
                endpoint
            )));
        }

        self.cache.lock().insert(key, payload.clone());
        Ok(payload)
    }

    /// `base_url/endpoint?params`
    pub fn endpoint_url(&self, endpoint: &str, params: &QueryParams) -> Result<Url, FetchError> {
        let raw = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        );
        let mut url = Url::parse(&raw).map_err(|e| FetchError::InvalidEndpoint(e.to_string()))?;

        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in params.iter() {
                pairs.append_pair(k, v);
            }
        }

        Ok(url)
    }

    /// Snapshot of the request counters
    pub fn stats(&self) -> FetchStats {
        self.stats.lock().clone()
    }

    pub fn cached_responses(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

//! Offline transport serving canned responses
//!
//! Routes are endpoint paths relative to a connector's base URL, optionally
//! with an exact query string (`DATOS_SERIE/IPC?nult=3`). A route with a query
//! string wins over the bare path. Unknown routes answer HTTP 404.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use statlas_ports::{FetchError, HttpResponse, HttpTransport, SessionFactory};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use url::Url;

#[derive(Clone)]
enum Reply {
    Respond(HttpResponse),
    Fail(String),
}

struct Route {
    key: String,
    path: String,
    query: Option<String>,
    reply: Reply,
}

impl Route {
    fn new(key: &str, reply: Reply) -> Self {
        let (path, query) = match key.split_once('?') {
            Some((p, q)) => (p, Some(q.to_string())),
            None => (key, None),
        };
        Self {
            key: key.to_string(),
            path: path.trim_matches('/').to_string(),
            query,
            reply,
        }
    }

    fn matches(&self, url: &Url) -> bool {
        let path = url.path().trim_end_matches('/');
        let path_ok = path == format!("/{}", self.path) || path.ends_with(&format!("/{}", self.path));
        match &self.query {
            Some(q) => path_ok && url.query() == Some(q.as_str()),
            None => path_ok,
        }
    }
}

#[derive(Default)]
struct State {
    routes: Vec<Route>,
    calls: HashMap<String, u64>,
    requested: Vec<Url>,
    fail_all: Option<String>,
    latency: Option<Duration>,
}

#[derive(Default)]
struct Shared {
    state: Mutex<State>,
    opened: AtomicU64,
    closed: AtomicU64,
    refuse_open: AtomicBool,
}

/// Scripted session factory; clones share routes and counters
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    shared: Arc<Shared>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `route` with a 200 JSON body
    pub fn with_json(self, route: &str, payload: Value) -> Self {
        self.set_json(route, payload);
        self
    }

    /// Answer `route` with a 200 raw body
    pub fn with_body(self, route: &str, body: &str) -> Self {
        self.set_reply(route, Reply::Respond(HttpResponse::ok(body)));
        self
    }

    pub fn with_status(self, route: &str, status: u16, body: &str) -> Self {
        self.set_reply(route, Reply::Respond(HttpResponse::new(status, body)));
        self
    }

    /// Fail `route` at the network level
    pub fn with_network_error(self, route: &str) -> Self {
        self.set_reply(route, Reply::Fail(format!("connection refused: {}", route)));
        self
    }

    /// Fail every request at the network level
    pub fn failing(self) -> Self {
        self.shared.state.lock().fail_all = Some("source unreachable".to_string());
        self
    }

    /// Delay every response (uses tokio's clock)
    pub fn with_latency(self, latency: Duration) -> Self {
        self.shared.state.lock().latency = Some(latency);
        self
    }

    /// Refuse to open sessions
    pub fn refusing_sessions(self) -> Self {
        self.shared.refuse_open.store(true, Ordering::SeqCst);
        self
    }

    /// Replace (or add) the JSON answer for `route`
    pub fn set_json(&self, route: &str, payload: Value) {
        self.set_reply(route, Reply::Respond(HttpResponse::ok(payload.to_string())));
    }

    /// Stop answering `route` (it becomes a 404)
    pub fn remove_route(&self, route: &str) {
        self.shared.state.lock().routes.retain(|r| r.key != route);
    }

    fn set_reply(&self, route: &str, reply: Reply) {
        let mut state = self.shared.state.lock();
        state.routes.retain(|r| r.key != route);
        state.routes.push(Route::new(route, reply));
    }

    /// Requests answered by `route`
    pub fn calls(&self, route: &str) -> u64 {
        self.shared
            .state
            .lock()
            .calls
            .get(route)
            .copied()
            .unwrap_or(0)
    }

    /// Every requested URL, in request order
    pub fn requested(&self) -> Vec<Url> {
        self.shared.state.lock().requested.clone()
    }

    pub fn total_requests(&self) -> usize {
        self.shared.state.lock().requested.len()
    }

    /// Sessions opened so far
    pub fn opened(&self) -> u64 {
        self.shared.opened.load(Ordering::SeqCst)
    }

    /// Sessions currently alive
    pub fn open_sessions(&self) -> u64 {
        self.opened() - self.shared.closed.load(Ordering::SeqCst)
    }

    fn resolve(&self, url: &Url) -> (Result<HttpResponse, FetchError>, Option<Duration>) {
        let mut state = self.shared.state.lock();
        state.requested.push(url.clone());
        let latency = state.latency;

        if let Some(reason) = &state.fail_all {
            return (Err(FetchError::Network(reason.clone())), latency);
        }

        let hit = state
            .routes
            .iter()
            .filter(|r| r.matches(url))
            .max_by_key(|r| r.query.is_some())
            .map(|r| (r.key.clone(), r.reply.clone()));

        match hit {
            Some((key, reply)) => {
                *state.calls.entry(key).or_insert(0) += 1;
                let result = match reply {
                    Reply::Respond(resp) => Ok(resp),
                    Reply::Fail(reason) => Err(FetchError::Network(reason)),
                };
                (result, latency)
            }
            None => (Ok(HttpResponse::new(404, "not found")), latency),
        }
    }
}

impl SessionFactory for ScriptedTransport {
    fn open(&self) -> Result<Arc<dyn HttpTransport>, FetchError> {
        if self.shared.refuse_open.load(Ordering::SeqCst) {
            return Err(FetchError::Network("session refused".to_string()));
        }
        self.shared.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(ScriptedSession {
            transport: self.clone(),
        }))
    }
}

/// One open scripted session; dropping it counts as a close
struct ScriptedSession {
    transport: ScriptedTransport,
}

#[async_trait]
impl HttpTransport for ScriptedSession {
    async fn get(&self, url: &Url) -> Result<HttpResponse, FetchError> {
        let (result, latency) = self.transport.resolve(url);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        result
    }
}

impl Drop for ScriptedSession {
    fn drop(&mut self) {
        self.transport.shared.closed.fetch_add(1, Ordering::SeqCst);
    }
}

//! HTTP session implementations
//!
//! - [`ReqwestSessionFactory`]: real HTTPS sessions backed by `reqwest`
//! - [`ScriptedTransport`]: offline sessions serving canned responses, used by
//!   tests and demos so the network is never touched

mod http;
mod scripted;

pub use http::{DEFAULT_REQUEST_TIMEOUT, ReqwestSessionFactory, ReqwestTransport};
pub use scripted::ScriptedTransport;

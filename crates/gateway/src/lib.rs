//! statlas Gateway
//!
//! Connectivity layer for the statlas discovery system. Provides:
//! - `RateLimitedFetcher`: one HTTP GET per logical call behind a TTL cache
//!   and a sliding-window rate limiter
//! - HTTP sessions (reqwest, plus an offline scripted transport for tests)
//! - Source connectors (INE, AEMET, Eurostat) normalising raw payloads into
//!   canonical `DatasetMetadata`
//!
//! ## Architecture
//!
//! ```text
//! External APIs (INE, AEMET, Eurostat)
//!         │ HTTPS / JSON
//!    ┌────▼──────────────┐
//!    │ HttpTransport     │  session (opened/closed per active scope)
//!    └────┬──────────────┘
//!    ┌────▼──────────────┐
//!    │ RateLimitedFetcher│  cache check → rate gate → GET → cache store
//!    └────┬──────────────┘
//!    ┌────▼──────────────┐
//!    │ StatisticsConnector<Dialect>
//!    │   raw payload → DatasetMetadata / SeriesRecord
//!    └────┬──────────────┘
//!         │ SourceConnector trait
//!    ┌────▼────┐
//!    │Discovery│
//!    └─────────┘
//! ```

pub mod adapters;
pub mod error;
pub mod fetcher;
pub mod transport;

// Re-export commonly used types
pub use adapters::{
    AemetConnector, AemetDialect, ConnectorSettings, EurostatConnector, EurostatDialect,
    IneConnector, IneDialect, SourceDialect, StatisticsConnector, VariableFilter,
};
pub use error::GatewayError;
pub use fetcher::{FetcherConfig, QueryParams, RateLimitedFetcher};
pub use transport::{ReqwestSessionFactory, ScriptedTransport};

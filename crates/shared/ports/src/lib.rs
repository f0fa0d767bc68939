//! statlas Ports
//!
//! Port definitions (traits) for the statlas discovery system.
//! These define the boundaries between domain logic and infrastructure:
//! HTTP sessions, source connectors and durable catalog stores.

mod connector;
mod error;
mod http;
mod store;

pub use connector::{FetchStats, SourceConnector};
pub use error::{
    CatalogError, CatalogResult, ConnectorError, FetchError, StoreError, StoreResult,
};
pub use http::{HttpResponse, HttpTransport, SessionFactory};
pub use store::{CatalogStore, DEFAULT_QUERY_LIMIT, StoreQuery};

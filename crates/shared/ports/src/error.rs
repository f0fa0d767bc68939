use thiserror::Error;

/// Transport-level failures of a single fetch
///
/// These are "transient" by policy: the fetcher and connectors absorb them
/// and degrade to an empty or fallback payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Session is not open")]
    SessionClosed,

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unexpected payload shape: {0}")]
    UnexpectedShape(String),
}

/// Connector-level failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectorError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Dataset {dataset_id} could not be normalised: {reason}")]
    Normalization { dataset_id: String, reason: String },
}

/// Catalog lookups
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Dataset with ID '{0}' not found")]
    NotFound(String),
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Persistence store failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Invalid connection string: {0}")]
    InvalidConnection(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

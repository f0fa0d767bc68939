use statlas_core::TaskError;
use statlas_gateway::GatewayError;
use statlas_ports::{CatalogError, StoreError};
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("{0} requires an active discovery session")]
    InvalidState(&'static str),

    #[error("Dataset with ID '{0}' not found")]
    NotFound(String),

    #[error("No connector registered for source '{0}'")]
    UnknownSource(String),

    #[error("Invalid task specification: {0}")]
    InvalidTask(#[from] TaskError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Connector setup failed: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Persistence error: {0}")]
    Store(#[from] StoreError),
}

impl From<CatalogError> for DiscoveryError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::NotFound(id) => DiscoveryError::NotFound(id),
        }
    }
}

pub type DiscoveryResult<T> = std::result::Result<T, DiscoveryError>;

//! Error types for the gateway crate

use thiserror::Error;

/// Connector construction errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Invalid base URL for {source_id}: {reason}")]
    InvalidBaseUrl { source_id: String, reason: String },

    #[error("Rate limit for {0} must be positive")]
    InvalidRateLimit(String),
}

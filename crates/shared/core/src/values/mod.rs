use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Timestamp in UTC
pub type Timestamp = DateTime<Utc>;

/// Observation value - uses Decimal so published figures round-trip exactly
pub type Value = Decimal;

/// Dataset identifier as reported by the source (unique within a catalog)
pub type DatasetId = String;

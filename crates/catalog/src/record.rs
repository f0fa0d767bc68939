//! Persisted representation of canonical metadata

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use statlas_core::DatasetMetadata;
use statlas_ports::{StoreError, StoreResult};

/// One stored row per dataset
///
/// The queryable columns mirror [`DatasetMetadata`]; `schema` and `tags` are
/// JSON, and `raw_data` holds the whole record so loads reconstruct it
/// losslessly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedRecord {
    pub id: String,
    pub name: String,
    pub source: String,
    pub endpoint: String,
    pub schema: Value,
    pub update_frequency: String,
    /// RFC 3339, UTC, fixed nanosecond precision (sorts lexicographically)
    pub last_updated: String,
    pub description: Option<String>,
    pub tags: Value,
    pub license: Option<String>,
    pub rate_limit: Option<u32>,
    pub raw_data: Value,
}

impl PersistedRecord {
    pub fn from_metadata(metadata: &DatasetMetadata) -> StoreResult<Self> {
        Ok(Self {
            id: metadata.id.clone(),
            name: metadata.name.clone(),
            source: metadata.source.to_string(),
            endpoint: metadata.endpoint.to_string(),
            schema: serde_json::to_value(&metadata.schema)?,
            update_frequency: metadata.update_frequency.clone(),
            last_updated: format_timestamp(&metadata.last_updated),
            description: metadata.description.clone(),
            tags: serde_json::to_value(&metadata.tags)?,
            license: metadata.license.clone(),
            rate_limit: metadata.rate_limit,
            raw_data: serde_json::to_value(metadata)?,
        })
    }

    /// Rebuild the canonical record from `raw_data`
    pub fn to_metadata(&self) -> StoreResult<DatasetMetadata> {
        let metadata: DatasetMetadata = serde_json::from_value(self.raw_data.clone())?;
        if metadata.id != self.id {
            return Err(StoreError::Serialization(format!(
                "record {} carries raw data for {}",
                self.id, metadata.id
            )));
        }
        Ok(metadata)
    }
}

pub(crate) fn format_timestamp(ts: &statlas_core::Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

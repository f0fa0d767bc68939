//! Source dialects: what differs between statistical APIs

use serde_json::{Value, json};
use statlas_core::{FieldSchema, SeriesQuery, SeriesRecord, SourceId, data_types};
use statlas_ports::ConnectorError;

use crate::fetcher::QueryParams;

/// One GET against a source: endpoint path relative to the base URL plus
/// query parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRequest {
    pub endpoint: String,
    pub params: QueryParams,
}

impl SourceRequest {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            params: QueryParams::new(),
        }
    }

    pub fn with_params(mut self, params: QueryParams) -> Self {
        self.params = params;
        self
    }
}

/// A listing entry read from a source payload, before normalisation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDataset {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// Absolute URL reported by the source, if any
    pub endpoint: Option<String>,
    pub update_frequency: Option<String>,
    /// Unparsed last-update value
    pub last_updated: Option<Value>,
    pub tags: Vec<String>,
    pub license: Option<String>,
}

impl RawDataset {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Source-specific strategy plugged into
/// [`StatisticsConnector`](super::StatisticsConnector)
///
/// A dialect is pure: it builds requests and reads payloads, never performs
/// I/O.
pub trait SourceDialect: Send + Sync + 'static {
    fn source_id(&self) -> SourceId;

    fn default_base_url(&self) -> &'static str;

    /// Requests per minute the source allows
    fn default_rate_limit(&self) -> u32;

    /// Catalog listing request
    fn listing_request(&self) -> SourceRequest;

    /// Payload returned by `get_metadata` when the listing cannot be fetched
    fn fallback_metadata(&self) -> Value;

    /// Listing entries; an `Err` marks an entry that cannot be normalised
    fn parse_listing(&self, payload: &Value) -> Vec<Result<RawDataset, ConnectorError>>;

    fn schema_request(&self, dataset_id: &str) -> SourceRequest;

    /// Payload returned by `get_dataset_schema` on failure
    fn empty_schema(&self) -> Value {
        json!({"fields": {}})
    }

    /// Fields described by a schema payload; empty when there are none
    fn parse_schema(&self, payload: &Value) -> Vec<FieldSchema>;

    /// Path (relative to the base URL) serving a dataset's data
    fn dataset_path(&self, dataset_id: &str) -> String;

    /// Tags the source implies for a dataset id
    fn implied_tags(&self, _dataset_id: &str) -> Vec<String> {
        Vec::new()
    }

    fn data_request(&self, dataset_id: &str, query: &SeriesQuery) -> SourceRequest;

    /// Observations in the order the source reports them; unparseable
    /// records are skipped
    fn parse_series(&self, payload: &Value) -> Vec<SeriesRecord>;
}

/// Fields every series exposes after [`SourceDialect::parse_series`]
pub fn series_fields() -> Vec<FieldSchema> {
    vec![
        FieldSchema::new("date", data_types::DATETIME).not_nullable(),
        FieldSchema::new("value", data_types::FLOAT),
        FieldSchema::new("change", data_types::FLOAT),
    ]
}

/// Normalisation failure for a listing entry
pub(crate) fn invalid_entry(entry: &Value, index: usize, reason: &str) -> ConnectorError {
    let dataset_id = super::parse::text(entry, &["id", "Id", "code", "Codigo"])
        .unwrap_or_else(|| format!("#{}", index));
    ConnectorError::Normalization {
        dataset_id,
        reason: reason.to_string(),
    }
}

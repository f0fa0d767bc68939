use async_trait::async_trait;
use serde_json::Value;
use statlas_core::{DatasetMetadata, SeriesQuery, SeriesRecord, SourceId};

use crate::error::{ConnectorError, FetchError};

/// Counters kept by a connector's fetcher
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Network requests issued (cache hits excluded)
    pub requests: u64,
    pub cache_hits: u64,
    /// Requests that failed and were degraded
    pub failures: u64,
    pub last_error: Option<String>,
}

impl FetchStats {
    /// Failures recorded since an earlier snapshot
    pub fn failures_since(&self, earlier: &FetchStats) -> u64 {
        self.failures.saturating_sub(earlier.failures)
    }
}

/// Source-specific adapter translating one external API into canonical form
///
/// Every variant exposes the same capability set; they differ only in base
/// URL, rate limit ceiling, raw payload shapes and field mapping.
///
/// Raw-payload operations (`get_metadata`, `get_dataset_schema`) never fail:
/// they degrade to a fallback or empty payload so one source being down
/// cannot break discovery.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    /// Identifier stored on every dataset this connector produces
    fn source_id(&self) -> &SourceId;

    /// Requests per rate window allowed for this source
    fn rate_limit(&self) -> u32;

    /// Open the underlying HTTP session (idempotent)
    fn open_session(&self) -> Result<(), FetchError>;

    /// Release the underlying HTTP session (idempotent)
    fn close_session(&self);

    fn is_open(&self) -> bool;

    /// Snapshot of the fetcher counters
    fn fetch_stats(&self) -> FetchStats;

    /// Raw catalog listing; a static fallback payload on failure
    async fn get_metadata(&self) -> Value;

    /// Raw schema of one dataset; an empty schema payload on failure
    async fn get_dataset_schema(&self, dataset_id: &str) -> Value;

    /// Datasets whose name, description or tags contain `query`
    /// (case-insensitive), filtered client-side from the cached listing
    async fn search_datasets(&self, query: &str) -> Vec<DatasetMetadata>;

    /// Normalise the full listing into canonical metadata
    ///
    /// Datasets that fail to normalise are skipped; an error means the
    /// listing itself could not be obtained.
    async fn convert_to_standard_metadata(&self) -> Result<Vec<DatasetMetadata>, ConnectorError>;

    /// Observations of one series, in the order the source reports them;
    /// unparseable records are skipped
    async fn get_dataset_data(&self, dataset_id: &str, query: &SeriesQuery) -> Vec<SeriesRecord>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn _assert_connector_object_safe(_: &dyn SourceConnector) {}

    #[test]
    fn test_failures_since() {
        let before = FetchStats {
            failures: 2,
            ..Default::default()
        };
        let after = FetchStats {
            failures: 5,
            ..Default::default()
        };
        assert_eq!(after.failures_since(&before), 3);
        assert_eq!(before.failures_since(&after), 0);
    }
}

use async_trait::async_trait;
use chrono::{Duration, Utc};
use statlas_core::{DatasetId, DatasetMetadata, Timestamp};

use crate::error::StoreResult;

/// Default maximum number of rows returned by [`CatalogStore::query`]
pub const DEFAULT_QUERY_LIMIT: usize = 100;

/// Predicate pushed down to a catalog store
///
/// Every set criterion must hold. Within `sources` and within `tags` any
/// single match is enough.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreQuery {
    pub sources: Vec<String>,
    pub updated_after: Option<Timestamp>,
    pub tags: Vec<String>,
    /// Case-insensitive substring of the dataset name
    pub name_contains: Option<String>,
    pub limit: usize,
}

impl Default for StoreQuery {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            updated_after: None,
            tags: Vec::new(),
            name_contains: None,
            limit: DEFAULT_QUERY_LIMIT,
        }
    }
}

impl StoreQuery {
    pub fn by_source(source: impl Into<String>) -> Self {
        Self::default().with_source(source)
    }

    pub fn by_tag(tag: impl Into<String>) -> Self {
        Self::default().with_tag(tag)
    }

    /// Datasets updated within the last `days` days
    pub fn updated_within(days: i64) -> Self {
        Self {
            updated_after: Some(Utc::now() - Duration::days(days)),
            ..Default::default()
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.sources.push(source.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_name_contains(mut self, fragment: impl Into<String>) -> Self {
        self.name_contains = Some(fragment.into());
        self
    }

    pub fn with_updated_after(mut self, after: Timestamp) -> Self {
        self.updated_after = Some(after);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Evaluate the predicate in memory (for stores without pushdown)
    pub fn matches(&self, dataset: &DatasetMetadata) -> bool {
        if !self.sources.is_empty() && !self.sources.iter().any(|s| s == dataset.source.as_str())
        {
            return false;
        }

        if let Some(after) = self.updated_after
            && dataset.last_updated <= after
        {
            return false;
        }

        if !self.tags.is_empty() && !dataset.has_any_tag(&self.tags) {
            return false;
        }

        if let Some(fragment) = &self.name_contains
            && !dataset
                .name
                .to_lowercase()
                .contains(&fragment.to_lowercase())
        {
            return false;
        }

        true
    }
}

/// Durable store for canonical metadata
///
/// Contract: `save_all` upserts by id (idempotent), `delete` drops records
/// by id, `load_all` reconstructs every saved record including its nested
/// schema, and `query` returns the same canonical shape as `load_all`.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Human-readable name for logs
    fn name(&self) -> &str;

    async fn save_all(&self, datasets: &[DatasetMetadata]) -> StoreResult<()>;

    /// Remove the records with these ids; absent ids are skipped.
    /// Returns how many records were removed.
    async fn delete(&self, ids: &[DatasetId]) -> StoreResult<usize>;

    async fn load_all(&self) -> StoreResult<Vec<DatasetMetadata>>;

    async fn query(&self, query: &StoreQuery) -> StoreResult<Vec<DatasetMetadata>>;

    /// Remove every record
    async fn clear(&self) -> StoreResult<()>;
}

use async_trait::async_trait;
use dashmap::DashMap;
use statlas_core::{DatasetId, DatasetMetadata};
use statlas_ports::{CatalogStore, StoreQuery, StoreResult};
use std::sync::Arc;

use crate::record::PersistedRecord;

/// In-memory catalog store
///
/// Thread-safe storage for persisted records using DashMap.
/// Suitable for simulation and testing.
pub struct InMemoryCatalogStore {
    /// Records by dataset id
    records: Arc<DashMap<String, PersistedRecord>>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(DashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn sorted(&self) -> StoreResult<Vec<DatasetMetadata>> {
        let mut datasets = self
            .records
            .iter()
            .map(|r| r.value().to_metadata())
            .collect::<StoreResult<Vec<_>>>()?;
        datasets.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(datasets)
    }
}

impl Default for InMemoryCatalogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for InMemoryCatalogStore {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
        }
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn save_all(&self, datasets: &[DatasetMetadata]) -> StoreResult<()> {
        // Encode everything first so a bad record leaves the store untouched
        let records = datasets
            .iter()
            .map(PersistedRecord::from_metadata)
            .collect::<StoreResult<Vec<_>>>()?;

        for record in records {
            self.records.insert(record.id.clone(), record);
        }
        Ok(())
    }

    async fn delete(&self, ids: &[DatasetId]) -> StoreResult<usize> {
        Ok(ids
            .iter()
            .filter(|id| self.records.remove(id.as_str()).is_some())
            .count())
    }

    async fn load_all(&self) -> StoreResult<Vec<DatasetMetadata>> {
        self.sorted()
    }

    async fn query(&self, query: &StoreQuery) -> StoreResult<Vec<DatasetMetadata>> {
        Ok(self
            .sorted()?
            .into_iter()
            .filter(|d| query.matches(d))
            .take(query.limit)
            .collect())
    }

    async fn clear(&self) -> StoreResult<()> {
        self.records.clear();
        Ok(())
    }
}

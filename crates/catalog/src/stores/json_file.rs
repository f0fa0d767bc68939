use async_trait::async_trait;
use log::debug;
use statlas_core::{DatasetId, DatasetMetadata};
use statlas_ports::{CatalogStore, StoreQuery, StoreResult};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::record::PersistedRecord;

/// Catalog store backed by one JSON document
///
/// The file holds an array of [`PersistedRecord`] sorted by id. Writes go to
/// a sibling temp file that is then renamed over the target, so a crash never
/// leaves a half-written catalog.
pub struct JsonFileCatalogStore {
    path: PathBuf,
    /// Serialises read-modify-write cycles
    lock: Mutex<()>,
}

impl JsonFileCatalogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_records(&self) -> StoreResult<BTreeMap<String, PersistedRecord>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(BTreeMap::new());
        }

        let records: Vec<PersistedRecord> = serde_json::from_slice(&bytes)?;
        Ok(records.into_iter().map(|r| (r.id.clone(), r)).collect())
    }

    async fn write_records(&self, records: &BTreeMap<String, PersistedRecord>) -> StoreResult<()> {
        let rows: Vec<&PersistedRecord> = records.values().collect();
        let bytes = serde_json::to_vec_pretty(&rows)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(
            "[STORE] wrote {} records to {}",
            rows.len(),
            self.path.display()
        );
        Ok(())
    }

    async fn load_sorted(&self) -> StoreResult<Vec<DatasetMetadata>> {
        let _guard = self.lock.lock().await;
        self.read_records()
            .await?
            .values()
            .map(PersistedRecord::to_metadata)
            .collect()
    }
}

#[async_trait]
impl CatalogStore for JsonFileCatalogStore {
    fn name(&self) -> &str {
        "json-file"
    }

    async fn save_all(&self, datasets: &[DatasetMetadata]) -> StoreResult<()> {
        let _guard = self.lock.lock().await;
        let mut records = self.read_records().await?;
        for dataset in datasets {
            let record = PersistedRecord::from_metadata(dataset)?;
            records.insert(record.id.clone(), record);
        }
        self.write_records(&records).await
    }

    async fn delete(&self, ids: &[DatasetId]) -> StoreResult<usize> {
        let _guard = self.lock.lock().await;
        let mut records = self.read_records().await?;
        let removed = ids
            .iter()
            .filter(|id| records.remove(id.as_str()).is_some())
            .count();
        if removed > 0 {
            self.write_records(&records).await?;
        }
        Ok(removed)
    }

    async fn load_all(&self) -> StoreResult<Vec<DatasetMetadata>> {
        self.load_sorted().await
    }

    async fn query(&self, query: &StoreQuery) -> StoreResult<Vec<DatasetMetadata>> {
        Ok(self
            .load_sorted()
            .await?
            .into_iter()
            .filter(|d| query.matches(d))
            .take(query.limit)
            .collect())
    }

    async fn clear(&self) -> StoreResult<()> {
        let _guard = self.lock.lock().await;
        self.write_records(&BTreeMap::new()).await
    }
}

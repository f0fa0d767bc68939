//! In-memory dataset catalog with an optional persistence bridge

use log::{debug, info, warn};
use statlas_core::{DatasetId, DatasetMetadata, SourceId};
use statlas_ports::{CatalogError, CatalogResult, CatalogStore, StoreQuery};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// Index of canonical metadata keyed by dataset id
///
/// The catalog is the sole mutator of its mapping. Writes are plain key
/// overwrites: re-adding an id replaces the whole value, never merges.
///
/// Persistence is opt-in through [`DatasetCatalog::with_store`]; without a
/// store, [`DatasetCatalog::load`] and [`DatasetCatalog::save`] never touch
/// disk or network. Entries removed from memory are remembered until the
/// next successful save deletes them from the store.
#[derive(Default)]
pub struct DatasetCatalog {
    datasets: HashMap<DatasetId, DatasetMetadata>,
    store: Option<Arc<dyn CatalogStore>>,
    /// Ids removed since the last save
    removed: BTreeSet<DatasetId>,
}

impl DatasetCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a persistence store
    pub fn with_store(mut self, store: Arc<dyn CatalogStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    /// Upsert by id, returning the replaced value
    pub fn add(&mut self, metadata: DatasetMetadata) -> Option<DatasetMetadata> {
        self.removed.remove(&metadata.id);
        self.datasets.insert(metadata.id.clone(), metadata)
    }

    pub fn get(&self, id: &str) -> CatalogResult<&DatasetMetadata> {
        self.datasets
            .get(id)
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.datasets.contains_key(id)
    }

    /// Entries whose name, description or any tag contains `query`
    /// (case-insensitive) and that carry every tag in `tags`
    pub fn search<S: AsRef<str>>(&self, query: &str, tags: &[S]) -> Vec<DatasetMetadata> {
        self.datasets
            .values()
            .filter(|d| d.matches_query(query) && d.has_all_tags(tags))
            .cloned()
            .collect()
    }

    /// Every entry, in no particular order
    pub fn list(&self) -> Vec<DatasetMetadata> {
        self.datasets.values().cloned().collect()
    }

    /// Remove an entry; absent ids are a no-op
    pub fn remove(&mut self, id: &str) -> Option<DatasetMetadata> {
        let removed = self.datasets.remove(id)?;
        self.removed.insert(removed.id.clone());
        Some(removed)
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// Sources with at least one entry, sorted
    pub fn sources(&self) -> Vec<SourceId> {
        self.datasets
            .values()
            .map(|d| d.source.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Ids of the entries a source contributed
    pub fn ids_for_source(&self, source: &SourceId) -> Vec<DatasetId> {
        self.datasets
            .values()
            .filter(|d| &d.source == source)
            .map(|d| d.id.clone())
            .collect()
    }

    /// Drop a source's entries, then upsert its fresh set
    ///
    /// Returns how many previous entries disappeared.
    pub fn replace_source(&mut self, source: &SourceId, datasets: Vec<DatasetMetadata>) -> usize {
        let fresh: HashSet<&str> = datasets.iter().map(|d| d.id.as_str()).collect();
        let stale: Vec<DatasetId> = self
            .datasets
            .values()
            .filter(|d| &d.source == source && !fresh.contains(d.id.as_str()))
            .map(|d| d.id.clone())
            .collect();

        self.datasets.retain(|_, d| &d.source != source);
        let dropped = stale.len();
        self.removed.extend(stale);
        let count = datasets.len();
        for dataset in datasets {
            self.add(dataset);
        }

        debug!(
            "[CATALOG] {}: {} entries, {} dropped",
            source, count, dropped
        );
        dropped
    }

    pub fn clear(&mut self) {
        self.removed.extend(self.datasets.drain().map(|(id, _)| id));
    }

    /// Ids removed since the last save, sorted
    pub fn pending_removals(&self) -> Vec<DatasetId> {
        self.removed.iter().cloned().collect()
    }

    /// Load every persisted entry into memory
    ///
    /// Returns the number of entries loaded; a store failure is logged and
    /// loads nothing.
    pub async fn load(&mut self) -> usize {
        let Some(store) = self.store.clone() else {
            debug!("[CATALOG] no store attached, nothing to load");
            return 0;
        };

        match store.load_all().await {
            Ok(datasets) => {
                let count = datasets.len();
                for dataset in datasets {
                    self.add(dataset);
                }
                info!("[CATALOG] loaded {} datasets from {}", count, store.name());
                count
            }
            Err(e) => {
                warn!("[CATALOG] load from {} failed: {}", store.name(), e);
                0
            }
        }
    }

    /// Persist the whole catalog and delete removed entries from the store,
    /// so the store ends up holding exactly the in-memory entries it was
    /// given. `false` when there is no store or the store rejected a write;
    /// removals that failed are retried on the next save.
    pub async fn save(&mut self) -> bool {
        let Some(store) = self.store.clone() else {
            debug!("[CATALOG] no store attached, nothing saved");
            return false;
        };

        let datasets = self.list();
        if let Err(e) = store.save_all(&datasets).await {
            warn!("[CATALOG] save to {} failed: {}", store.name(), e);
            return false;
        }
        info!("[CATALOG] saved {} datasets to {}", datasets.len(), store.name());

        if self.removed.is_empty() {
            return true;
        }
        let stale = self.pending_removals();
        match store.delete(&stale).await {
            Ok(deleted) => {
                info!("[CATALOG] deleted {} stale datasets from {}", deleted, store.name());
                self.removed.clear();
                true
            }
            Err(e) => {
                warn!("[CATALOG] delete on {} failed: {}", store.name(), e);
                false
            }
        }
    }

    /// Run a predicate query against the store; empty on failure or when
    /// there is no store
    pub async fn query_store(&self, query: &StoreQuery) -> Vec<DatasetMetadata> {
        let Some(store) = &self.store else {
            return Vec::new();
        };

        store.query(query).await.unwrap_or_else(|e| {
            warn!("[CATALOG] query on {} failed: {}", store.name(), e);
            Vec::new()
        })
    }

    /// Evaluate a store predicate against the in-memory entries
    pub fn filter(&self, query: &StoreQuery) -> Vec<DatasetMetadata> {
        let mut matches: Vec<DatasetMetadata> = self
            .datasets
            .values()
            .filter(|d| query.matches(d))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        matches.truncate(query.limit);
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::InMemoryCatalogStore;
    use async_trait::async_trait;
    use statlas_ports::{StoreError, StoreResult};
    use url::Url;

    fn dataset(id: &str, name: &str, tags: &[&str]) -> DatasetMetadata {
        DatasetMetadata::new(
            id,
            name,
            SourceId::ine(),
            Url::parse("https://servicios.ine.es/wstempus/js/ES").unwrap(),
        )
        .with_tags(tags.iter().copied())
    }

    fn ipc() -> DatasetMetadata {
        dataset("IPC", "Consumer Price Index", &["inflation", "prices"])
    }

    const NO_TAGS: &[&str] = &[];

    #[test]
    fn test_price_search_scenario() {
        let mut catalog = DatasetCatalog::new();
        catalog.add(ipc());

        let found = catalog.search("price", NO_TAGS);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "IPC");

        assert!(catalog.search("price", &["nonexistent"]).is_empty());
    }

    #[test]
    fn test_search_matches_description_and_tags_case_insensitively() {
        let mut catalog = DatasetCatalog::new();
        catalog.add(dataset("EPA", "Labour force survey", &["Employment"]));
        catalog.add(dataset("PIB", "GDP", &[]).with_description("Quarterly NATIONAL accounts"));

        assert_eq!(catalog.search("employment", NO_TAGS).len(), 1);
        assert_eq!(catalog.search("national", NO_TAGS)[0].id, "PIB");
        assert!(catalog.search("weather", NO_TAGS).is_empty());
    }

    #[test]
    fn test_tag_filter_requires_all_tags() {
        let mut catalog = DatasetCatalog::new();
        catalog.add(ipc());
        catalog.add(dataset("IPCA", "Harmonised price index", &["prices"]));

        let both = catalog.search("price", &["prices", "inflation"]);
        assert_eq!(both.len(), 1);
        assert_eq!(both[0].id, "IPC");
        assert_eq!(catalog.search("price", &["prices"]).len(), 2);
    }

    #[test]
    fn test_add_overwrites_without_merging() {
        let mut catalog = DatasetCatalog::new();
        catalog.add(ipc().with_description("first").with_license("CC-BY-4.0"));
        let second = ipc();
        let replaced = catalog.add(second.clone());

        assert!(replaced.is_some());
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("IPC").unwrap(), &second);
        assert!(catalog.get("IPC").unwrap().license.is_none());
    }

    #[test]
    fn test_remove_is_noop_when_absent() {
        let mut catalog = DatasetCatalog::new();
        catalog.add(ipc());

        assert!(catalog.remove("missing").is_none());
        assert!(catalog.remove("IPC").is_some());
        assert_eq!(
            catalog.get("IPC"),
            Err(CatalogError::NotFound("IPC".to_string()))
        );
    }

    #[test]
    fn test_replace_source_drops_vanished_entries() {
        let mut catalog = DatasetCatalog::new();
        catalog.add(ipc());
        catalog.add(dataset("EPA", "Labour force survey", &[]));
        let mut other = dataset("temp", "Temperature", &[]);
        other.source = SourceId::aemet();
        catalog.add(other);

        let stale = catalog.replace_source(&SourceId::ine(), vec![ipc()]);

        assert_eq!(stale, 1);
        assert!(catalog.contains("IPC"));
        assert!(!catalog.contains("EPA"));
        assert!(catalog.contains("temp"));
        assert_eq!(catalog.sources(), vec![SourceId::aemet(), SourceId::ine()]);
    }

    #[tokio::test]
    async fn test_no_store_never_persists() {
        let mut catalog = DatasetCatalog::new();
        catalog.add(ipc());
        assert!(!catalog.save().await);
        assert_eq!(catalog.load().await, 0);
        assert!(catalog.query_store(&StoreQuery::default()).await.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let store = InMemoryCatalogStore::new();
        let mut catalog = DatasetCatalog::new().with_store(Arc::new(store.clone()));
        catalog.add(ipc());
        catalog.add(dataset("EPA", "Labour force survey", &["labour"]));
        assert!(catalog.save().await);

        let mut restored = DatasetCatalog::new().with_store(Arc::new(store));
        assert_eq!(restored.load().await, 2);
        assert_eq!(restored.get("IPC").unwrap(), catalog.get("IPC").unwrap());
        assert_eq!(
            restored.query_store(&StoreQuery::by_tag("labour")).await.len(),
            1
        );
    }

    #[tokio::test]
    async fn test_save_deletes_pruned_entries_from_store() {
        let store = InMemoryCatalogStore::new();
        let mut catalog = DatasetCatalog::new().with_store(Arc::new(store.clone()));
        catalog.add(ipc());
        catalog.add(dataset("EPA", "Labour force survey", &["labour"]));
        catalog.add(dataset("PIB", "GDP", &[]));
        assert!(catalog.save().await);
        assert_eq!(store.len(), 3);

        assert_eq!(catalog.replace_source(&SourceId::ine(), vec![ipc()]), 2);
        assert_eq!(catalog.pending_removals(), vec!["EPA", "PIB"]);
        assert!(catalog.save().await);

        assert!(catalog.pending_removals().is_empty());
        let mut restored = DatasetCatalog::new().with_store(Arc::new(store.clone()));
        assert_eq!(restored.load().await, 1);
        assert!(restored.contains("IPC"));
        assert!(!restored.contains("EPA"));
    }

    #[test]
    fn test_readding_an_entry_cancels_its_removal() {
        let mut catalog = DatasetCatalog::new();
        catalog.add(ipc());
        catalog.remove("IPC");
        assert_eq!(catalog.pending_removals(), vec!["IPC"]);

        catalog.add(ipc());
        assert!(catalog.pending_removals().is_empty());
    }

    struct BrokenStore;

    #[async_trait]
    impl CatalogStore for BrokenStore {
        fn name(&self) -> &str {
            "broken"
        }

        async fn save_all(&self, _: &[DatasetMetadata]) -> StoreResult<()> {
            Err(StoreError::Backend("write rejected".into()))
        }

        async fn delete(&self, _: &[DatasetId]) -> StoreResult<usize> {
            Err(StoreError::Backend("write rejected".into()))
        }

        async fn load_all(&self) -> StoreResult<Vec<DatasetMetadata>> {
            Err(StoreError::Backend("unreachable".into()))
        }

        async fn query(&self, _: &StoreQuery) -> StoreResult<Vec<DatasetMetadata>> {
            Err(StoreError::Backend("unreachable".into()))
        }

        async fn clear(&self) -> StoreResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_store_failures_are_reported_not_raised() {
        let _ = env_logger::try_init();
        let mut catalog = DatasetCatalog::new().with_store(Arc::new(BrokenStore));
        catalog.add(ipc());

        assert!(!catalog.save().await);
        assert_eq!(catalog.load().await, 0);
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_filter_in_memory() {
        let mut catalog = DatasetCatalog::new();
        catalog.add(ipc());
        catalog.add(dataset("EPA", "Labour force survey", &["labour"]));

        let found = catalog.filter(&StoreQuery::by_tag("prices").with_tag("labour"));
        let ids: Vec<&str> = found.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["EPA", "IPC"]);
    }
}

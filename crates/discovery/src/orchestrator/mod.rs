//! Discovery orchestrator
//!
//! Owns the connector registry and the dataset catalog. Sessions are opened
//! for an active scope and closed on every exit path; catalog operations are
//! only available while the scope is active.
//!
//! ```text
//! Inactive ──open()/activate()──▶ Active ──close()/guard drop──▶ Inactive
//! ```

mod report;

pub use report::{IdCollision, RefreshReport};

use futures_util::future::join_all;
use log::{debug, info, warn};
use statlas_catalog::{DatasetCatalog, open_store};
use statlas_core::{
    DatasetId, DatasetMetadata, SeriesQuery, SeriesRecord, SourceHealth, SourceId, SourceStatus,
    TaskSpecification,
};
use statlas_ports::{CatalogStore, SessionFactory, SourceConnector};
use std::collections::{HashMap, HashSet};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::{DiscoveryConfig, GlobalConfig};
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::registry::ConnectorRegistry;

/// Upper bound for one connector's part of a refresh
pub const DEFAULT_CONNECTOR_TIMEOUT: Duration = Duration::from_secs(120);

/// Refresh policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSettings {
    pub connector_timeout: Duration,
    /// Replace a refreshed source's entries instead of upserting over them
    pub prune_missing: bool,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            connector_timeout: DEFAULT_CONNECTOR_TIMEOUT,
            prune_missing: true,
        }
    }
}

impl RefreshSettings {
    pub fn from_config(global: &GlobalConfig) -> Self {
        Self {
            connector_timeout: global.connector_timeout(),
            prune_missing: global.prune_missing,
        }
    }
}

/// What one connector produced during a refresh
struct Outcome {
    health: SourceHealth,
    /// `Some` only when the listing was usable
    datasets: Option<Vec<DatasetMetadata>>,
}

impl Outcome {
    fn unusable(health: SourceHealth) -> Self {
        Self {
            health,
            datasets: None,
        }
    }
}

async fn convert(
    connector: Arc<dyn SourceConnector>,
    timeout: Duration,
    cancel: CancellationToken,
) -> Outcome {
    let source = connector.source_id().clone();
    if !connector.is_open() {
        warn!("[DISCOVERY] {} skipped: session is not open", source);
        return Outcome::unusable(SourceHealth::Failed {
            reason: "session is not open".to_string(),
        });
    }

    let before = connector.fetch_stats();
    let converted = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            warn!("[DISCOVERY] {} refresh cancelled", source);
            return Outcome::unusable(SourceHealth::Cancelled);
        }
        converted = tokio::time::timeout(timeout, connector.convert_to_standard_metadata()) => converted,
    };

    match converted {
        Err(_) => {
            warn!("[DISCOVERY] {} timed out after {:?}", source, timeout);
            Outcome::unusable(SourceHealth::TimedOut { after: timeout })
        }
        Ok(Err(e)) => {
            warn!("[DISCOVERY] {} failed: {}", source, e);
            Outcome::unusable(SourceHealth::Failed {
                reason: e.to_string(),
            })
        }
        Ok(Ok(datasets)) => {
            let after = connector.fetch_stats();
            let failures = after.failures_since(&before);
            let health = if failures == 0 {
                SourceHealth::Healthy
            } else {
                warn!(
                    "[DISCOVERY] {} degraded: {} failed requests (last: {})",
                    source,
                    failures,
                    after.last_error.as_deref().unwrap_or("unknown")
                );
                SourceHealth::Degraded {
                    failures,
                    last_error: after.last_error,
                }
            };
            Outcome {
                health,
                datasets: Some(datasets),
            }
        }
    }
}

/// Coordinates connectors, the catalog and optional persistence
pub struct DiscoveryOrchestrator {
    registry: ConnectorRegistry,
    catalog: DatasetCatalog,
    settings: RefreshSettings,
    active: bool,
    statuses: HashMap<SourceId, SourceStatus>,
    cancel: CancellationToken,
}

impl DiscoveryOrchestrator {
    pub fn new(registry: ConnectorRegistry) -> Self {
        Self {
            registry,
            catalog: DatasetCatalog::new(),
            settings: RefreshSettings::default(),
            active: false,
            statuses: HashMap::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Persist the catalog after every refresh
    pub fn with_store(mut self, store: Arc<dyn CatalogStore>) -> Self {
        self.catalog = std::mem::take(&mut self.catalog).with_store(store);
        self
    }

    pub fn with_settings(mut self, settings: RefreshSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Built-in connectors over reqwest, plus the configured store
    pub fn from_config(config: &DiscoveryConfig) -> DiscoveryResult<Self> {
        let registry = ConnectorRegistry::from_config(config)?;
        Self::assemble(config, registry)
    }

    /// Built-in connectors over any session factory, plus the configured
    /// store
    pub fn from_config_with_factory(
        config: &DiscoveryConfig,
        factory: Arc<dyn SessionFactory>,
    ) -> DiscoveryResult<Self> {
        let registry = ConnectorRegistry::from_config_with_factory(config, factory)?;
        Self::assemble(config, registry)
    }

    fn assemble(config: &DiscoveryConfig, registry: ConnectorRegistry) -> DiscoveryResult<Self> {
        let orchestrator =
            Self::new(registry).with_settings(RefreshSettings::from_config(&config.global));

        match (&config.persistence.connection, config.persistence.enabled) {
            (Some(connection), true) => Ok(orchestrator.with_store(open_store(connection)?)),
            _ => Ok(orchestrator),
        }
    }

    pub fn registry(&self) -> &ConnectorRegistry {
        &self.registry
    }

    pub fn settings(&self) -> RefreshSettings {
        self.settings
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Open every connector's session and become active
    ///
    /// A connector whose session cannot be opened is logged and left closed;
    /// the others still open. Returns the number of open sessions.
    pub fn open(&mut self) -> usize {
        let mut opened = 0;
        for connector in self.registry.iter() {
            match connector.open_session() {
                Ok(()) => opened += 1,
                Err(e) => warn!(
                    "[DISCOVERY] {} session could not be opened: {}",
                    connector.source_id(),
                    e
                ),
            }
        }

        self.active = true;
        info!(
            "[DISCOVERY] active with {}/{} sessions",
            opened,
            self.registry.len()
        );
        opened
    }

    /// Close every session and become inactive (idempotent)
    pub fn close(&mut self) {
        for connector in self.registry.iter() {
            connector.close_session();
        }
        if self.active {
            info!("[DISCOVERY] inactive, sessions closed");
        }
        self.active = false;
    }

    /// Open sessions for the lifetime of the returned guard
    pub fn activate(&mut self) -> ActiveDiscovery<'_> {
        self.open();
        ActiveDiscovery { inner: self }
    }

    /// Token that cancels an in-flight refresh
    ///
    /// Once a refresh observes cancellation the token is replaced, so fetch
    /// a fresh one before the next refresh.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Health of every source after its last refresh, in registry order
    pub fn source_status(&self) -> Vec<SourceStatus> {
        self.registry
            .ids()
            .iter()
            .filter_map(|id| self.statuses.get(id).cloned())
            .collect()
    }

    fn ensure_active(&self, operation: &'static str) -> DiscoveryResult<()> {
        if self.active {
            Ok(())
        } else {
            Err(DiscoveryError::InvalidState(operation))
        }
    }

    /// Rebuild the catalog from every registered connector
    ///
    /// Connectors run concurrently, each under the connector timeout and the
    /// cancellation token. A failing, slow or cancelled source contributes
    /// nothing and keeps its previous entries; the refresh itself only fails
    /// when the orchestrator is inactive.
    pub async fn refresh_catalog(&mut self) -> DiscoveryResult<RefreshReport> {
        self.ensure_active("refresh_catalog")?;

        let timeout = self.settings.connector_timeout;
        let cancel = self.cancel.clone();
        let connectors: Vec<Arc<dyn SourceConnector>> = self.registry.iter().cloned().collect();
        info!("[DISCOVERY] refreshing {} sources", connectors.len());

        let runs = connectors.into_iter().map(move |connector| {
            let cancel = cancel.clone();
            async move {
                let source = connector.source_id().clone();
                (source, convert(connector, timeout, cancel).await)
            }
        });
        let outcomes = join_all(runs).await;

        let mut report = self.merge(outcomes);

        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }

        if self.catalog.has_store() {
            report.persisted = Some(self.catalog.save().await);
        }

        info!(
            "[DISCOVERY] refresh done: {} added, {} removed, {} collisions, {} failed sources, {} in catalog",
            report.added,
            report.removed,
            report.collisions.len(),
            report.failed_sources().len(),
            self.catalog.len()
        );
        Ok(report)
    }

    /// Fold per-source outcomes into the catalog in registry order
    fn merge(&mut self, outcomes: Vec<(SourceId, Outcome)>) -> RefreshReport {
        let prune = self.settings.prune_missing;
        let refreshed: HashSet<SourceId> = outcomes
            .iter()
            .filter(|(_, o)| o.datasets.is_some())
            .map(|(source, _)| source.clone())
            .collect();

        // Ids that stay owned by a source not being replaced this round
        let mut owners: HashMap<DatasetId, SourceId> = self
            .catalog
            .list()
            .into_iter()
            .filter(|d| !(prune && refreshed.contains(&d.source)))
            .map(|d| (d.id, d.source))
            .collect();

        let mut report = RefreshReport::default();
        for (source, outcome) in outcomes {
            let Outcome { health, datasets } = outcome;
            let usable = datasets.is_some();

            let mut fresh = Vec::new();
            for mut dataset in datasets.unwrap_or_default() {
                if let Some(owner) = owners.get(&dataset.id)
                    && owner != &source
                {
                    let stored_as = format!("{}:{}", source, dataset.id);
                    warn!(
                        "[DISCOVERY] id {} reported by {} and {}, storing as {}",
                        dataset.id, owner, source, stored_as
                    );
                    report.collisions.push(IdCollision {
                        id: dataset.id.clone(),
                        kept_by: owner.clone(),
                        renamed_for: source.clone(),
                        stored_as: stored_as.clone(),
                    });
                    dataset.id = stored_as;
                }
                owners.insert(dataset.id.clone(), source.clone());
                fresh.push(dataset);
            }

            let count = fresh.len();
            if usable {
                report.added += count;
                if prune {
                    report.removed += self.catalog.replace_source(&source, fresh);
                } else {
                    for dataset in fresh {
                        self.catalog.add(dataset);
                    }
                }
            }

            debug!("[DISCOVERY] {}: {} datasets ({:?})", source, count, health);
            let status = SourceStatus::new(source.clone(), health, count);
            self.statuses.insert(source, status.clone());
            report.statuses.push(status);
        }
        report
    }

    /// Entries matching `query` (name, description or tag) that carry
    /// every tag in `tags`, sorted by id
    pub fn search<S: AsRef<str>>(
        &self,
        query: &str,
        tags: &[S],
    ) -> DiscoveryResult<Vec<DatasetMetadata>> {
        self.ensure_active("search")?;
        let mut found = self.catalog.search(query, tags);
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    pub fn get(&self, id: &str) -> DiscoveryResult<&DatasetMetadata> {
        self.ensure_active("get")?;
        Ok(self.catalog.get(id)?)
    }

    /// Every catalog entry, sorted by id
    pub fn list(&self) -> DiscoveryResult<Vec<DatasetMetadata>> {
        self.ensure_active("list")?;
        let mut all = self.catalog.list();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    /// Direct access to one connector
    pub fn connector(&self, source: &str) -> DiscoveryResult<Arc<dyn SourceConnector>> {
        self.ensure_active("connector")?;
        self.registry
            .get(source)
            .cloned()
            .ok_or_else(|| DiscoveryError::UnknownSource(source.to_string()))
    }

    /// Observations of one dataset from its source
    ///
    /// Ids namespaced after a collision (`"{source}:{id}"`) are accepted.
    pub async fn fetch_series(
        &self,
        source: &str,
        dataset_id: &str,
        query: &SeriesQuery,
    ) -> DiscoveryResult<Vec<SeriesRecord>> {
        let connector = self.connector(source)?;
        let prefix = format!("{}:", connector.source_id());
        let upstream_id = dataset_id.strip_prefix(&prefix).unwrap_or(dataset_id);
        Ok(connector.get_dataset_data(upstream_id, query).await)
    }

    /// Candidate datasets for an upstream modelling task
    ///
    /// Searches for `"{target} {region}"` first and falls back to the target
    /// alone when that finds nothing.
    pub fn search_for_task(
        &self,
        task: &TaskSpecification,
        region: &str,
    ) -> DiscoveryResult<Vec<DatasetMetadata>> {
        task.validate()?;
        const NO_TAGS: &[&str] = &[];

        let found = self.search(&task.search_query(region), NO_TAGS)?;
        if !found.is_empty() {
            return Ok(found);
        }
        self.search(task.target.trim(), NO_TAGS)
    }

    /// Warm start: load the persisted catalog into memory
    pub async fn load_persisted(&mut self) -> DiscoveryResult<usize> {
        self.ensure_active("load_persisted")?;
        Ok(self.catalog.load().await)
    }
}

impl Drop for DiscoveryOrchestrator {
    fn drop(&mut self) {
        if self.active {
            self.close();
        }
    }
}

/// Active scope of a [`DiscoveryOrchestrator`]; dropping it closes every
/// session
pub struct ActiveDiscovery<'a> {
    inner: &'a mut DiscoveryOrchestrator,
}

impl Deref for ActiveDiscovery<'_> {
    type Target = DiscoveryOrchestrator;

    fn deref(&self) -> &Self::Target {
        self.inner
    }
}

impl DerefMut for ActiveDiscovery<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.inner
    }
}

impl Drop for ActiveDiscovery<'_> {
    fn drop(&mut self) {
        self.inner.close();
    }
}

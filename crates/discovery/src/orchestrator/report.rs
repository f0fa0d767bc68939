use serde::Serialize;
use statlas_core::{DatasetId, SourceId, SourceStatus};

/// Dataset id reported by more than one source in the same catalog
///
/// The source merged first keeps the bare id; the later one is stored under
/// `stored_as` (`"{source}:{id}"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdCollision {
    pub id: DatasetId,
    pub kept_by: SourceId,
    pub renamed_for: SourceId,
    pub stored_as: DatasetId,
}

/// Outcome of one `refresh_catalog` run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshReport {
    /// One entry per registered source, in registry order
    pub statuses: Vec<SourceStatus>,
    /// Entries upserted into the catalog
    pub added: usize,
    /// Entries dropped because their source stopped reporting them
    pub removed: usize,
    pub collisions: Vec<IdCollision>,
    /// Whether the catalog was saved; `None` without a store
    pub persisted: Option<bool>,
}

impl RefreshReport {
    pub fn status(&self, source: &str) -> Option<&SourceStatus> {
        let source = SourceId::new(source);
        self.statuses.iter().find(|s| s.source == source)
    }

    /// Sources whose listing could not be used this time
    pub fn failed_sources(&self) -> Vec<&SourceId> {
        self.statuses
            .iter()
            .filter(|s| !s.health.is_usable())
            .map(|s| &s.source)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.failed_sources().is_empty()
    }
}

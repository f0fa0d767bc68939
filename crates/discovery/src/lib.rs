//! statlas Discovery
//!
//! Ties the source connectors to the dataset catalog:
//!
//! - **Config**: JSON configuration with `STATLAS_*` environment overrides
//! - **Registry**: explicit, ordered set of source connectors
//! - **Orchestrator**: scoped sessions, concurrent catalog refresh with
//!   per-source timeout, cancellation and health reporting
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!   │ INE          │   │ AEMET        │   │ Eurostat     │
//!   │ connector    │   │ connector    │   │ connector    │
//!   └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!          │ convert_to_standard_metadata (concurrent)
//!          └──────────────────┼──────────────────┘
//!                             ▼
//!               ┌───────────────────────────┐
//!               │  DiscoveryOrchestrator    │  merge in registry order,
//!               │  (ActiveDiscovery scope)  │  namespace id collisions
//!               └─────────────┬─────────────┘
//!                             ▼
//!               ┌───────────────────────────┐
//!               │      DatasetCatalog       │──save/load──▶ CatalogStore
//!               └───────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod registry;

// Re-export main types
pub use config::{
    ConfigError, DiscoveryConfig, GlobalConfig, PersistenceConfig, SourceConfig, load_config,
    load_config_from_str, load_default_config,
};
pub use error::{DiscoveryError, DiscoveryResult};
pub use orchestrator::{
    ActiveDiscovery, DiscoveryOrchestrator, IdCollision, RefreshReport, RefreshSettings,
};
pub use registry::ConnectorRegistry;

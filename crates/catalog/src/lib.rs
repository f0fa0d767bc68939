//! statlas Catalog
//!
//! In-memory index of canonical dataset metadata plus the durable stores it
//! can sync to.
//!
//! ## Architecture
//!
//! ```text
//!   Discovery (sole writer)
//!         │ add / replace_source / search / get / list
//!    ┌────▼───────────┐
//!    │ DatasetCatalog │  HashMap<id, DatasetMetadata>
//!    └────┬───────────┘
//!         │ load / save / query_store (optional bridge)
//!    ┌────▼───────────┐
//!    │ CatalogStore   │  memory:// | file://*.json | sqlite://
//!    └────────────────┘
//! ```
//!
//! Store failures never propagate out of the bridge: `save` reports `false`,
//! `load` reports zero entries, and the in-memory catalog stays usable.

pub mod catalog;
pub mod record;
pub mod stores;

pub use catalog::DatasetCatalog;
pub use record::PersistedRecord;
pub use stores::{
    InMemoryCatalogStore, JsonFileCatalogStore, SqliteCatalogStore, open_store,
};

//! Catalog store implementations
//!
//! | connection string | store |
//! |---|---|
//! | `memory://` | [`InMemoryCatalogStore`] |
//! | `file://<path>.json` | [`JsonFileCatalogStore`] |
//! | `sqlite://<path>`, `sqlite::memory:` | [`SqliteCatalogStore`] |

mod json_file;
mod memory;
mod sqlite;

pub use json_file::JsonFileCatalogStore;
pub use memory::InMemoryCatalogStore;
pub use sqlite::SqliteCatalogStore;

use log::info;
use statlas_ports::{CatalogStore, StoreError, StoreResult};
use std::sync::Arc;

/// Open the store named by a connection string
pub fn open_store(connection: &str) -> StoreResult<Arc<dyn CatalogStore>> {
    let connection = connection.trim();

    let store: Arc<dyn CatalogStore> = if connection == "memory://" {
        Arc::new(InMemoryCatalogStore::new())
    } else if connection == "sqlite::memory:" || connection == "sqlite://:memory:" {
        Arc::new(SqliteCatalogStore::open_in_memory()?)
    } else if let Some(path) = connection.strip_prefix("sqlite://") {
        if path.is_empty() {
            return Err(StoreError::InvalidConnection(connection.to_string()));
        }
        Arc::new(SqliteCatalogStore::open(path)?)
    } else if let Some(path) = connection.strip_prefix("file://") {
        if path.is_empty() {
            return Err(StoreError::InvalidConnection(connection.to_string()));
        }
        Arc::new(JsonFileCatalogStore::new(path))
    } else {
        return Err(StoreError::InvalidConnection(connection.to_string()));
    };

    info!("[STORE] opened {} store ({})", store.name(), connection);
    Ok(store)
}

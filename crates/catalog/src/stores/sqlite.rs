use async_trait::async_trait;
use log::debug;
use parking_lot::Mutex;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, params, params_from_iter};
use statlas_core::{DatasetId, DatasetMetadata};
use statlas_ports::{CatalogStore, StoreError, StoreQuery, StoreResult};
use std::path::Path;
use std::sync::Arc;

use crate::record::{PersistedRecord, format_timestamp};

const SCHEMA: &str = "BEGIN;
CREATE TABLE IF NOT EXISTS dataset_catalog(
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    source TEXT NOT NULL,
    endpoint TEXT NOT NULL,
    schema TEXT NOT NULL,
    update_frequency TEXT NOT NULL,
    last_updated TEXT NOT NULL,
    description TEXT,
    tags TEXT NOT NULL,
    license TEXT,
    rate_limit INTEGER,
    raw_data TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_dataset_catalog_source ON dataset_catalog(source);
CREATE INDEX IF NOT EXISTS idx_dataset_catalog_last_updated ON dataset_catalog(last_updated);
COMMIT;";

const UPSERT: &str = "INSERT INTO dataset_catalog(
    id, name, source, endpoint, schema, update_frequency, last_updated,
    description, tags, license, rate_limit, raw_data
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
ON CONFLICT(id) DO UPDATE SET
    name = excluded.name,
    source = excluded.source,
    endpoint = excluded.endpoint,
    schema = excluded.schema,
    update_frequency = excluded.update_frequency,
    last_updated = excluded.last_updated,
    description = excluded.description,
    tags = excluded.tags,
    license = excluded.license,
    rate_limit = excluded.rate_limit,
    raw_data = excluded.raw_data";

fn backend(e: rusqlite::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// Catalog store backed by a SQLite table
///
/// rusqlite is blocking, so every call runs on tokio's blocking pool.
/// Queries push source, date and tag filters down to SQL; the name filter
/// is applied after decoding so it matches the in-memory (Unicode
/// case-insensitive) semantics.
#[derive(Clone)]
pub struct SqliteCatalogStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCatalogStore {
    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref()).map_err(backend)?;
        Self::init(conn)
    }

    /// Private in-memory database
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(backend)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA).map_err(backend)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn blocking<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            op(&mut *guard)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("blocking task failed: {}", e)))?
    }
}

fn select(conn: &Connection, sql: &str, args: Vec<SqlValue>) -> StoreResult<Vec<DatasetMetadata>> {
    let mut stmt = conn.prepare(sql).map_err(backend)?;
    let rows = stmt
        .query_map(params_from_iter(args), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .map_err(backend)?;

    let mut datasets = Vec::new();
    for row in rows {
        let (id, raw) = row.map_err(backend)?;
        let metadata: DatasetMetadata = serde_json::from_str(&raw)?;
        if metadata.id != id {
            return Err(StoreError::Serialization(format!(
                "row {} carries raw data for {}",
                id, metadata.id
            )));
        }
        datasets.push(metadata);
    }
    Ok(datasets)
}

/// `WHERE` clause and bind values for the pushed-down part of a query
fn where_clause(query: &StoreQuery) -> (String, Vec<SqlValue>) {
    let mut conditions = Vec::new();
    let mut args = Vec::new();

    if !query.sources.is_empty() {
        let marks = vec!["?"; query.sources.len()].join(", ");
        conditions.push(format!("source IN ({})", marks));
        args.extend(query.sources.iter().cloned().map(SqlValue::Text));
    }

    if let Some(after) = &query.updated_after {
        conditions.push("last_updated > ?".to_string());
        args.push(SqlValue::Text(format_timestamp(after)));
    }

    if !query.tags.is_empty() {
        let marks = vec!["?"; query.tags.len()].join(", ");
        conditions.push(format!(
            "EXISTS (SELECT 1 FROM json_each(dataset_catalog.tags) WHERE json_each.value IN ({}))",
            marks
        ));
        args.extend(query.tags.iter().cloned().map(SqlValue::Text));
    }

    if conditions.is_empty() {
        (String::new(), args)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), args)
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn save_all(&self, datasets: &[DatasetMetadata]) -> StoreResult<()> {
        let records = datasets
            .iter()
            .map(PersistedRecord::from_metadata)
            .collect::<StoreResult<Vec<_>>>()?;

        self.blocking(move |conn| {
            let tx = conn.transaction().map_err(backend)?;
            {
                let mut stmt = tx.prepare(UPSERT).map_err(backend)?;
                for r in &records {
                    stmt.execute(params![
                        r.id,
                        r.name,
                        r.source,
                        r.endpoint,
                        r.schema.to_string(),
                        r.update_frequency,
                        r.last_updated,
                        r.description,
                        r.tags.to_string(),
                        r.license,
                        r.rate_limit,
                        r.raw_data.to_string(),
                    ])
                    .map_err(backend)?;
                }
            }
            tx.commit().map_err(backend)?;
            debug!("[STORE] upserted {} rows", records.len());
            Ok(())
        })
        .await
    }

    async fn delete(&self, ids: &[DatasetId]) -> StoreResult<usize> {
        let ids = ids.to_vec();
        self.blocking(move |conn| {
            let tx = conn.transaction().map_err(backend)?;
            let mut removed = 0;
            {
                let mut stmt = tx
                    .prepare("DELETE FROM dataset_catalog WHERE id = ?1")
                    .map_err(backend)?;
                for id in &ids {
                    removed += stmt.execute(params![id]).map_err(backend)?;
                }
            }
            tx.commit().map_err(backend)?;
            debug!("[STORE] deleted {} rows", removed);
            Ok(removed)
        })
        .await
    }

    async fn load_all(&self) -> StoreResult<Vec<DatasetMetadata>> {
        self.blocking(|conn| {
            select(
                conn,
                "SELECT id, raw_data FROM dataset_catalog ORDER BY id",
                Vec::new(),
            )
        })
        .await
    }

    async fn query(&self, query: &StoreQuery) -> StoreResult<Vec<DatasetMetadata>> {
        let (clause, mut args) = where_clause(query);
        let name_filter = query.name_contains.as_ref().map(|n| n.to_lowercase());
        let limit = query.limit;

        let mut sql = format!("SELECT id, raw_data FROM dataset_catalog{} ORDER BY id", clause);
        if name_filter.is_none() {
            sql.push_str(" LIMIT ?");
            args.push(SqlValue::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
        }

        let rows = self.blocking(move |conn| select(conn, &sql, args)).await?;

        Ok(match name_filter {
            Some(fragment) => rows
                .into_iter()
                .filter(|d| d.name.to_lowercase().contains(&fragment))
                .take(limit)
                .collect(),
            None => rows,
        })
    }

    async fn clear(&self) -> StoreResult<()> {
        self.blocking(|conn| {
            conn.execute("DELETE FROM dataset_catalog", [])
                .map_err(backend)?;
            Ok(())
        })
        .await
    }
}

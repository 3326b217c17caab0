//! Persisted table stores
//!
//! A store holds named tables of text cells. The sync cycle needs only three
//! operations: read a whole table, replace it, append to it. Writes to one
//! store are issued one at a time by the cycle; a table that does not exist
//! yet reads as empty.

mod csv_dir;
mod sheets;
mod xlsx_book;

pub use csv_dir::CsvDirStore;
pub use sheets::{col_idx_to_letter, SheetsStore};
pub use xlsx_book::XlsxStore;

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::config::{ConfigError, StoreBackend, StoreConfig};
use crate::sync::error::StoreError;
use crate::sync::types::Table;

#[async_trait]
pub trait TableStore: Send + Sync {
    /// Whole table, header included; empty when the table does not exist
    async fn read_all(&self, table: &str) -> Result<Table, StoreError>;

    /// Replace the table's header and rows
    async fn replace_all(&self, table: &str, rows: &Table) -> Result<(), StoreError>;

    /// Append rows under the table's existing header, creating it if needed
    async fn append(&self, table: &str, rows: &Table) -> Result<(), StoreError>;
}

/// Rows of `rows` appended to `existing`, laid out under `existing`'s header
///
/// When `existing` has no header yet, `rows`' header is adopted.
pub fn append_rows(existing: Table, rows: &Table) -> Table {
    if existing.columns.is_empty() {
        return rows.clone();
    }
    let projected = rows.project(&existing.columns);
    let mut merged = existing;
    merged.rows.extend(projected.rows);
    merged
}

/// Run blocking file I/O on the blocking pool so lookups keep running
async fn run_blocking<T, F>(task: F) -> Result<T, String>
where
    F: FnOnce() -> Result<T, String> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| format!("Task failed: {}", e))?
}

/// Open the store selected by `[store]`
pub fn open_store(config: &StoreConfig) -> Result<Box<dyn TableStore>, ConfigError> {
    Ok(match config.backend {
        StoreBackend::Csv => Box::new(CsvDirStore::new(&config.location)),
        StoreBackend::Xlsx => Box::new(XlsxStore::new(&config.location)),
        StoreBackend::Sheets => {
            let token = std::env::var("TRACKLINE_SHEETS_TOKEN")
                .ok()
                .or_else(|| config.sheets_token.clone())
                .filter(|t| !t.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingCredential {
                    name: "store.sheets_token".to_string(),
                })?;
            Box::new(
                SheetsStore::new(&config.sheets_api_base, &config.location, token, config.chunk_size)
                    .map_err(|e| ConfigError::Invalid {
                        message: e.to_string(),
                    })?,
            )
        }
    })
}

/// In-memory store, used for dry runs against fixtures and in tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(table: &str, contents: Table) -> Self {
        Self {
            tables: Mutex::new(HashMap::from([(table.to_string(), contents)])),
        }
    }

    pub async fn snapshot(&self, table: &str) -> Option<Table> {
        self.tables.lock().await.get(table).cloned()
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn read_all(&self, table: &str) -> Result<Table, StoreError> {
        Ok(self.tables.lock().await.get(table).cloned().unwrap_or_default())
    }

    async fn replace_all(&self, table: &str, rows: &Table) -> Result<(), StoreError> {
        self.tables.lock().await.insert(table.to_string(), rows.clone());
        Ok(())
    }

    async fn append(&self, table: &str, rows: &Table) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let existing = tables.remove(table).unwrap_or_default();
        tables.insert(table.to_string(), append_rows(existing, rows));
        Ok(())
    }
}

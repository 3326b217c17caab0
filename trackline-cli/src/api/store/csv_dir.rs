//! CSV directory store: one `<table>.csv` per table

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{append_rows, run_blocking, TableStore};
use crate::sync::error::StoreError;
use crate::sync::types::Table;

pub struct CsvDirStore {
    dir: PathBuf,
}

impl CsvDirStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn table_path(&self, table: &str) -> PathBuf {
        let file: String = table
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        self.dir.join(format!("{}.csv", file))
    }

    fn read_table(path: &Path) -> Result<Table, String> {
        if !path.exists() {
            return Ok(Table::default());
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(|e| e.to_string())?;

        let columns: Vec<String> = reader
            .headers()
            .map_err(|e| e.to_string())?
            .iter()
            .map(str::to_string)
            .collect();

        let mut table = Table::new(columns);
        for record in reader.records() {
            let record = record.map_err(|e| e.to_string())?;
            table.push_row(record.iter().map(str::to_string).collect());
        }
        Ok(table)
    }

    /// Write through a sibling temp file, then rename over the target
    fn write_table(dir: &Path, path: &Path, rows: &Table) -> Result<(), String> {
        std::fs::create_dir_all(dir).map_err(|e| e.to_string())?;

        let tmp = path.with_extension("csv.tmp");
        let result = (|| {
            let mut writer = csv::Writer::from_path(&tmp).map_err(|e| e.to_string())?;
            writer.write_record(&rows.columns).map_err(|e| e.to_string())?;
            for row in &rows.rows {
                writer.write_record(row).map_err(|e| e.to_string())?;
            }
            writer.flush().map_err(|e| e.to_string())
        })();

        if let Err(message) = result {
            let _ = std::fs::remove_file(&tmp);
            return Err(message);
        }
        std::fs::rename(&tmp, path).map_err(|e| e.to_string())
    }
}

#[async_trait]
impl TableStore for CsvDirStore {
    async fn read_all(&self, table: &str) -> Result<Table, StoreError> {
        let path = self.table_path(table);
        let source = path.clone();
        let contents = run_blocking(move || Self::read_table(&source))
            .await
            .map_err(|message| StoreError::Read {
                table: table.to_string(),
                message,
            })?;
        log::debug!("Read {} rows from {}", contents.len(), path.display());
        Ok(contents)
    }

    async fn replace_all(&self, table: &str, rows: &Table) -> Result<(), StoreError> {
        let path = self.table_path(table);
        let (dir, target, contents) = (self.dir.clone(), path.clone(), rows.clone());
        run_blocking(move || Self::write_table(&dir, &target, &contents))
            .await
            .map_err(|message| StoreError::Write {
                table: table.to_string(),
                message,
            })?;
        log::debug!("Wrote {} rows to {}", rows.len(), path.display());
        Ok(())
    }

    async fn append(&self, table: &str, rows: &Table) -> Result<(), StoreError> {
        let existing = self.read_all(table).await?;
        let merged = append_rows(existing, rows);
        self.replace_all(table, &merged).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: &[&str], rows: &[&[&str]]) -> Table {
        let mut t = Table::new(columns.iter().map(|c| c.to_string()).collect());
        for row in rows {
            t.push_row(row.iter().map(|c| c.to_string()).collect());
        }
        t
    }

    #[tokio::test]
    async fn test_missing_table_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvDirStore::new(dir.path());
        assert_eq!(store.read_all("Test_new").await.unwrap(), Table::default());
    }

    #[tokio::test]
    async fn test_replace_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvDirStore::new(dir.path().join("nested"));
        let rows = table(
            &["Parent ID", "Delivery Date"],
            &[&["P-1", "2024-01-05 | Error: x, y"], &["P-2", ""]],
        );

        store.replace_all("Test_new", &rows).await.unwrap();
        assert_eq!(store.read_all("Test_new").await.unwrap(), rows);
        assert!(!dir.path().join("nested").join("Test_new.csv.tmp").exists());
    }

    #[tokio::test]
    async fn test_append_creates_then_extends() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvDirStore::new(dir.path());

        store.append("Test_DB", &table(&["id", "stage"], &[&["1", "CLOSED"]])).await.unwrap();
        store.append("Test_DB", &table(&["stage", "id"], &[&["TRACK 2", "2"]])).await.unwrap();

        let stored = store.read_all("Test_DB").await.unwrap();
        assert_eq!(stored.columns, vec!["id", "stage"]);
        assert_eq!(stored.rows, vec![vec!["1", "CLOSED"], vec!["2", "TRACK 2"]]);
    }
}

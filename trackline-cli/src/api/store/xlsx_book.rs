//! XLSX workbook store: one worksheet per table
//!
//! Every write rewrites the whole workbook through a temp file, so other
//! sheets are carried over unchanged.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use calamine::{open_workbook, Data, Reader, Xlsx};
use rust_xlsxwriter::Workbook;

use super::{append_rows, run_blocking, TableStore};
use crate::sync::error::StoreError;
use crate::sync::types::Table;

pub struct XlsxStore {
    path: PathBuf,
}

impl XlsxStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// All sheets in workbook order; empty when the file does not exist
    fn read_book(path: &Path) -> Result<Vec<(String, Table)>, String> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut workbook: Xlsx<_> = open_workbook(path)
            .map_err(|e| format!("failed to open {}: {}", path.display(), e))?;

        let mut sheets = Vec::new();
        for name in workbook.sheet_names() {
            let range = workbook
                .worksheet_range(&name)
                .map_err(|e| format!("failed to read sheet {}: {}", name, e))?;

            let mut rows = range.rows();
            let mut table = match rows.next() {
                Some(header) => Table::new(header.iter().map(cell_text).collect()),
                None => Table::default(),
            };
            for row in rows {
                table.push_row(row.iter().map(cell_text).collect());
            }
            sheets.push((name, table));
        }
        Ok(sheets)
    }

    fn write_book(path: &Path, sheets: &[(String, Table)]) -> Result<(), String> {
        let mut workbook = Workbook::new();
        for (name, table) in sheets {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(name).map_err(|e| e.to_string())?;

            for (col, column) in table.columns.iter().enumerate() {
                worksheet
                    .write_string(0, col as u16, column)
                    .map_err(|e| e.to_string())?;
            }
            for (row_idx, row) in table.rows.iter().enumerate() {
                for (col, cell) in row.iter().enumerate() {
                    if cell.is_empty() {
                        continue;
                    }
                    worksheet
                        .write_string(row_idx as u32 + 1, col as u16, cell)
                        .map_err(|e| e.to_string())?;
                }
            }
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        let tmp = temp_path(path);
        workbook.save(&tmp).map_err(|e| e.to_string())?;
        std::fs::rename(&tmp, path).map_err(|e| e.to_string())
    }

    /// Read the workbook, rewrite one sheet and save, off the async workers
    async fn modify<F>(&self, table: &str, update: F) -> Result<(), String>
    where
        F: FnOnce(Table) -> Table + Send + 'static,
    {
        let path = self.path.clone();
        let table = table.to_string();
        run_blocking(move || {
            let mut sheets = Self::read_book(&path)?;
            match sheets.iter_mut().find(|(name, _)| *name == table) {
                Some((_, contents)) => *contents = update(std::mem::take(contents)),
                None => sheets.push((table, update(Table::default()))),
            }
            Self::write_book(&path, &sheets)
        })
        .await
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp.xlsx");
    path.with_file_name(name)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => (*f as i64).to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

#[async_trait]
impl TableStore for XlsxStore {
    async fn read_all(&self, table: &str) -> Result<Table, StoreError> {
        let path = self.path.clone();
        let sheets = run_blocking(move || Self::read_book(&path))
            .await
            .map_err(|message| StoreError::Read {
                table: table.to_string(),
                message,
            })?;
        Ok(sheets
            .into_iter()
            .find(|(name, _)| name == table)
            .map(|(_, contents)| contents)
            .unwrap_or_default())
    }

    async fn replace_all(&self, table: &str, rows: &Table) -> Result<(), StoreError> {
        let replacement = rows.clone();
        self.modify(table, move |_| replacement)
            .await
            .map_err(|message| StoreError::Write {
                table: table.to_string(),
                message,
            })?;
        log::debug!("Wrote {} rows to sheet '{}' of {}", rows.len(), table, self.path.display());
        Ok(())
    }

    async fn append(&self, table: &str, rows: &Table) -> Result<(), StoreError> {
        let appended = rows.clone();
        self.modify(table, move |existing| append_rows(existing, &appended))
            .await
            .map_err(|message| StoreError::Write {
                table: table.to_string(),
                message,
            })
    }
}

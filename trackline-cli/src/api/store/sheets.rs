//! Spreadsheet store over the Sheets v4 values API
//!
//! Each table is a worksheet of one spreadsheet. Large writes are split into
//! blocks of whole rows so no single request exceeds the API's payload limits.
//! A replace or append that fails part way puts back the rows read before it
//! started.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::TableStore;
use crate::sync::error::StoreError;
use crate::sync::types::Table;

/// Values calls the store is built on, one request each
#[async_trait]
trait ValuesApi: Send + Sync {
    async fn get(&self, sheet: &str) -> Result<Table, String>;
    async fn clear(&self, sheet: &str) -> Result<(), String>;
    async fn update(&self, range: &str, values: &[Vec<String>]) -> Result<(), String>;
    async fn append(&self, sheet: &str, values: &[Vec<String>]) -> Result<(), String>;
}

/// Sheets v4 values endpoints over HTTP
struct HttpValues {
    http: reqwest::Client,
    api_base: String,
    spreadsheet_id: String,
    token: String,
}

pub struct SheetsStore {
    api: Box<dyn ValuesApi>,
    chunk_size: usize,
}

/// Spreadsheet column letter for a 1-based column index (1 -> A, 27 -> AA)
pub fn col_idx_to_letter(mut index: usize) -> String {
    let mut letters = Vec::new();
    while index > 0 {
        let rem = (index - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        index = (index - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Sheet name quoted for use in A1 notation
fn quote_sheet(sheet: &str) -> String {
    format!("'{}'", sheet.replace('\'', "''"))
}

/// A1 range covering `width` columns of rows `start..=end`
fn a1_range(sheet: &str, width: usize, start: usize, end: usize) -> String {
    format!(
        "{}!A{}:{}{}",
        quote_sheet(sheet),
        start,
        col_idx_to_letter(width.max(1)),
        end
    )
}

/// Header then rows, as `(range, values)` update blocks of at most `chunk_size` rows
///
/// The header is written alone on row 1; data rows start on row 2.
fn update_blocks(sheet: &str, table: &Table, chunk_size: usize) -> Vec<(String, Vec<Vec<String>>)> {
    let width = table.columns.len();
    let mut blocks = vec![(a1_range(sheet, width, 1, 1), vec![table.columns.clone()])];

    let mut start = 2;
    for chunk in table.row_chunks(chunk_size) {
        let end = start + chunk.len() - 1;
        blocks.push((a1_range(sheet, width, start, end), chunk.to_vec()));
        start = end + 1;
    }
    blocks
}

/// Values payload into a table: first row is the header
fn values_to_table(payload: &Value) -> Table {
    let Some(rows) = payload["values"].as_array() else {
        return Table::default();
    };

    let cells = |row: &Value| -> Vec<String> {
        row.as_array()
            .map(|cells| {
                cells
                    .iter()
                    .map(|cell| match cell {
                        Value::String(s) => s.clone(),
                        Value::Null => String::new(),
                        other => other.to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    };

    let mut iter = rows.iter();
    let mut table = match iter.next() {
        Some(header) => Table::new(cells(header)),
        None => return Table::default(),
    };
    for row in iter {
        table.push_row(cells(row));
    }
    table
}

impl SheetsStore {
    pub fn new(
        api_base: &str,
        spreadsheet_id: &str,
        token: String,
        chunk_size: usize,
    ) -> Result<Self, String> {
        if spreadsheet_id.trim().is_empty() {
            return Err("store.location must name a spreadsheet id".to_string());
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| format!("failed to build HTTP client: {}", e))?;

        let api = HttpValues {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            token,
        };
        Ok(Self::with_api(Box::new(api), chunk_size))
    }

    fn with_api(api: Box<dyn ValuesApi>, chunk_size: usize) -> Self {
        Self {
            api,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Clear the sheet and write `rows` in whole-row blocks
    async fn write_blocks(&self, table: &str, rows: &Table) -> Result<(), String> {
        self.api.clear(table).await?;
        if rows.columns.is_empty() {
            return Ok(());
        }
        for (range, values) in update_blocks(table, rows, self.chunk_size) {
            log::debug!("Updating {} ({} rows)", range, values.len());
            self.api.update(&range, &values).await?;
        }
        Ok(())
    }

    /// Replace the sheet's contents, putting `previous` back if any block fails
    ///
    /// The values API has no multi-request transaction, so a failed write is
    /// undone by rewriting the contents read before it started.
    async fn write(&self, table: &str, rows: &Table, previous: &Table) -> Result<(), String> {
        let Err(message) = self.write_blocks(table, rows).await else {
            return Ok(());
        };

        log::warn!(
            "Writing sheet '{}' failed, restoring its {} previous rows: {}",
            table,
            previous.len(),
            message
        );
        match self.write_blocks(table, previous).await {
            Ok(()) => Err(format!("{} (previous contents restored)", message)),
            Err(restore) => {
                log::error!("Restoring sheet '{}' failed: {}", table, restore);
                Err(format!(
                    "{}; restoring the previous contents also failed: {}",
                    message, restore
                ))
            }
        }
    }
}

impl HttpValues {
    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/spreadsheets/{}/values/{}",
            self.api_base,
            self.spreadsheet_id,
            urlencoding::encode(range)
        )
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, String> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let excerpt: String = body.chars().take(200).collect();
        Err(format!("HTTP {}: {}", status.as_u16(), excerpt.trim()))
    }
}

#[async_trait]
impl ValuesApi for HttpValues {
    async fn get(&self, sheet: &str) -> Result<Table, String> {
        let response = self
            .http
            .get(self.values_url(&quote_sheet(sheet)))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        // Unknown sheet names are rejected as a bad range
        if response.status() == reqwest::StatusCode::BAD_REQUEST {
            log::debug!("Sheet '{}' not found, treating as empty", sheet);
            return Ok(Table::default());
        }

        let payload: Value = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| format!("invalid values response: {}", e))?;
        Ok(values_to_table(&payload))
    }

    async fn clear(&self, sheet: &str) -> Result<(), String> {
        let url = format!("{}:clear", self.values_url(&quote_sheet(sheet)));
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(&json!({}))
            .send()
            .await
            .map_err(|e| e.to_string())?;
        Self::check(response).await.map(|_| ())
    }

    async fn update(&self, range: &str, values: &[Vec<String>]) -> Result<(), String> {
        let response = self
            .http
            .put(self.values_url(range))
            .query(&[("valueInputOption", "RAW")])
            .bearer_auth(&self.token)
            .json(&json!({
                "range": range,
                "majorDimension": "ROWS",
                "values": values,
            }))
            .send()
            .await
            .map_err(|e| e.to_string())?;
        Self::check(response).await.map(|_| ())
    }

    async fn append(&self, sheet: &str, values: &[Vec<String>]) -> Result<(), String> {
        let url = format!("{}:append", self.values_url(&quote_sheet(sheet)));
        let response = self
            .http
            .post(url)
            .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
            .bearer_auth(&self.token)
            .json(&json!({
                "majorDimension": "ROWS",
                "values": values,
            }))
            .send()
            .await
            .map_err(|e| e.to_string())?;
        Self::check(response).await.map(|_| ())
    }
}

#[async_trait]
impl TableStore for SheetsStore {
    async fn read_all(&self, table: &str) -> Result<Table, StoreError> {
        self.api.get(table).await.map_err(|message| StoreError::Read {
            table: table.to_string(),
            message,
        })
    }

    async fn replace_all(&self, table: &str, rows: &Table) -> Result<(), StoreError> {
        let previous = self.read_all(table).await?;
        self.write(table, rows, &previous)
            .await
            .map_err(|message| StoreError::Write {
                table: table.to_string(),
                message,
            })
    }

    async fn append(&self, table: &str, rows: &Table) -> Result<(), StoreError> {
        let existing = self.read_all(table).await?;
        let write_error = |message| StoreError::Write {
            table: table.to_string(),
            message,
        };
        if existing.columns.is_empty() {
            return self.write(table, rows, &existing).await.map_err(write_error);
        }

        let projected = rows.project(&existing.columns);
        for chunk in projected.row_chunks(self.chunk_size) {
            if let Err(message) = self.api.append(table, chunk).await {
                // Drop the chunks that did land
                let restored = self.write(table, &existing, &existing).await;
                return Err(write_error(match restored {
                    Ok(()) => format!("{} (previous contents restored)", message),
                    Err(restore) => format!(
                        "{}; restoring the previous contents also failed: {}",
                        message, restore
                    ),
                }));
            }
        }
        log::debug!("Appended {} rows to sheet '{}'", projected.len(), table);
        Ok(())
    }
}

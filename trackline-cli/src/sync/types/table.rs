//! Tabular rows as exchanged with feeds and stores

use std::collections::HashMap;

/// One raw row: column name -> cell text
pub type RawRow = HashMap<String, String>;

/// A header plus rows of cell text, in column order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row, padding or truncating it to the header width
    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.columns.len(), String::new());
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows as column-name keyed maps; missing trailing cells become empty
    pub fn raw_rows(&self) -> Vec<RawRow> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .enumerate()
                    .map(|(i, col)| (col.clone(), row.get(i).cloned().unwrap_or_default()))
                    .collect()
            })
            .collect()
    }

    /// Re-order this table's cells to match `columns`
    ///
    /// Columns absent from this table are filled with empty cells; columns not
    /// named in `columns` are dropped.
    pub fn project(&self, columns: &[String]) -> Table {
        let positions: Vec<Option<usize>> = columns
            .iter()
            .map(|col| self.columns.iter().position(|c| c == col))
            .collect();

        let mut projected = Table::new(columns.to_vec());
        for row in &self.rows {
            projected.push_row(
                positions
                    .iter()
                    .map(|pos| pos.and_then(|p| row.get(p).cloned()).unwrap_or_default())
                    .collect(),
            );
        }
        projected
    }

    /// Split rows into chunks of at most `size` whole rows
    pub fn row_chunks(&self, size: usize) -> std::slice::Chunks<'_, Vec<String>> {
        self.rows.chunks(size.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_push_row_pads_to_header() {
        let mut table = Table::new(cols(&["a", "b", "c"]));
        table.push_row(vec!["1".into()]);
        assert_eq!(table.rows[0], vec!["1", "", ""]);
    }

    #[test]
    fn test_raw_rows() {
        let mut table = Table::new(cols(&["Parent ID", "Invoice"]));
        table.rows.push(vec!["7".into()]);
        let raw = table.raw_rows();
        assert_eq!(raw[0].get("Parent ID").map(String::as_str), Some("7"));
        assert_eq!(raw[0].get("Invoice").map(String::as_str), Some(""));
    }

    #[test]
    fn test_project_reorders_and_fills() {
        let mut table = Table::new(cols(&["b", "a"]));
        table.push_row(vec!["B".into(), "A".into()]);
        let projected = table.project(&cols(&["a", "z", "b"]));
        assert_eq!(projected.rows[0], vec!["A", "", "B"]);
    }

    #[test]
    fn test_row_chunks_never_split_rows() {
        let mut table = Table::new(cols(&["a", "b"]));
        for i in 0..5 {
            table.push_row(vec![i.to_string(), "x".into()]);
        }
        let chunks: Vec<_> = table.row_chunks(2).collect();
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.iter().all(|row| row.len() == 2)));
        assert_eq!(chunks[2].len(), 1);
    }
}

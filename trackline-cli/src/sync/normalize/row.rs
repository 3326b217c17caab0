//! Working row used while a raw row is being normalized

use std::collections::HashMap;

use crate::sync::types::{FieldValue, RawRow};

/// Fold a column name for lookup: case-insensitive, whitespace-collapsed
pub fn fold_column(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Column-name keyed values with case/whitespace-insensitive lookup
#[derive(Debug, Clone, Default)]
pub struct WorkingRow {
    values: HashMap<String, FieldValue>,
}

impl WorkingRow {
    pub fn from_raw(raw: &RawRow) -> Self {
        let values = raw
            .iter()
            .map(|(column, cell)| (fold_column(column), FieldValue::from_cell(cell)))
            .collect();
        Self { values }
    }

    /// Value of a column, `Null` when the column is absent
    pub fn get(&self, column: &str) -> &FieldValue {
        static NULL: FieldValue = FieldValue::Null;
        self.values.get(&fold_column(column)).unwrap_or(&NULL)
    }

    /// Text of a column when present and non-blank
    pub fn text(&self, column: &str) -> Option<&str> {
        self.get(column).as_str().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(&fold_column(column))
    }

    pub fn set(&mut self, column: &str, value: FieldValue) {
        self.values.insert(fold_column(column), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_ignores_case_and_spacing() {
        let mut raw = RawRow::new();
        raw.insert("Tracking Courier Details.Courier  API List".into(), "FEDEX".into());
        raw.insert("parent id".into(), " 17 ".into());
        let row = WorkingRow::from_raw(&raw);

        assert_eq!(row.text("Tracking Courier Details.Courier API List"), Some("FEDEX"));
        assert_eq!(row.text("Parent ID"), Some("17"));
        assert!(row.get("Invoice").is_null());
    }

    #[test]
    fn test_set_overwrites_existing_spelling() {
        let mut raw = RawRow::new();
        raw.insert("PIC".into(), "No".into());
        let mut row = WorkingRow::from_raw(&raw);
        row.set("Pic", FieldValue::text("Yes"));
        assert_eq!(row.text("pic"), Some("Yes"));
    }
}

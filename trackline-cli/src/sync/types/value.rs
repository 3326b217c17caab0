//! Auxiliary field values carried alongside the typed record fields

/// Timestamp layout used whenever a timestamp is written back to a table
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single auxiliary value on a record (flags, costs, operator columns)
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Absent / empty cell
    Null,
    /// Free text
    Text(String),
    /// Numeric value (costs, day counts)
    Number(f64),
}

impl FieldValue {
    /// Build a value from a raw cell, treating blank text as absent
    pub fn from_cell(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            FieldValue::Null
        } else {
            FieldValue::Text(trimmed.to_string())
        }
    }

    /// Build a text value, treating blank text as absent
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.trim().is_empty() {
            FieldValue::Null
        } else {
            FieldValue::Text(value)
        }
    }

    /// Check if this value is absent
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Try to get as text
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as a number, parsing text when needed
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    /// Render the value as a table cell
    pub fn to_cell(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
        }
    }
}

impl Default for FieldValue {
    fn default() -> Self {
        FieldValue::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_cells_are_null() {
        assert!(FieldValue::from_cell("   ").is_null());
        assert_eq!(FieldValue::from_cell(" 12 "), FieldValue::Text("12".to_string()));
    }

    #[test]
    fn test_number_from_text() {
        assert_eq!(FieldValue::Text("150.5".into()).as_number(), Some(150.5));
        assert_eq!(FieldValue::Text("n/a".into()).as_number(), None);
        assert_eq!(FieldValue::Text("NaN".into()).as_number(), None);
        assert_eq!(FieldValue::Null.as_number(), None);
    }

    #[test]
    fn test_cell_rendering() {
        assert_eq!(FieldValue::Number(300.0).to_cell(), "300");
        assert_eq!(FieldValue::Number(12.25).to_cell(), "12.25");
        assert_eq!(FieldValue::Null.to_cell(), "");
    }
}

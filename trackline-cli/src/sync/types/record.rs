//! Canonical shipment record

use std::collections::HashMap;

use chrono::NaiveDateTime;

use super::FieldValue;

/// Delimiter used for multi-value tracking numbers at rest
pub const TRACKING_DELIMITER: char = ';';

/// Carrier that can be asked for a delivery estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Carrier {
    FedEx,
    Ups,
}

impl Carrier {
    /// Parse the carrier label used by the source feed (`FEDEX`, `UPS`)
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "FEDEX" => Some(Carrier::FedEx),
            "UPS" => Some(Carrier::Ups),
            _ => None,
        }
    }

    /// Label as written back to tables
    pub fn label(&self) -> &'static str {
        match self {
            Carrier::FedEx => "FEDEX",
            Carrier::Ups => "UPS",
        }
    }
}

impl std::fmt::Display for Carrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Ordered carrier tracking codes
///
/// Stored as a single `;`-joined string. Parsing trims every code and drops
/// empty segments, so `parse(to_delimited())` always yields the same codes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackingNumbers(Vec<String>);

impl TrackingNumbers {
    pub fn parse(raw: &str) -> Self {
        Self(
            raw.split(TRACKING_DELIMITER)
                .map(str::trim)
                .filter(|code| !code.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn codes(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_delimited(&self) -> String {
        self.0.join(&TRACKING_DELIMITER.to_string())
    }
}

/// One shipment/tracking entity
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Business "Parent ID"; reconciliation join key
    pub id: String,
    /// Grouping key; `None` when absent or blank
    pub invoice: Option<String>,
    /// `None` when the stored timestamp could not be parsed
    pub entered_at: Option<NaiveDateTime>,
    pub tracking_numbers: TrackingNumbers,
    pub carrier: Option<Carrier>,
    /// Display-stage estimate (`date [count] | ...`)
    pub delivery_estimate: Option<String>,
    /// Stage/category text checked by the archive markers
    pub status: String,
    /// Every other column, keyed by table column name
    pub fields: HashMap<String, FieldValue>,
}

impl Record {
    /// Create a record with only an id set
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            invoice: None,
            entered_at: None,
            tracking_numbers: TrackingNumbers::default(),
            carrier: None,
            delivery_estimate: None,
            status: String::new(),
            fields: HashMap::new(),
        }
    }

    /// Reconciliation key: the id with surrounding whitespace removed
    pub fn key(&self) -> &str {
        self.id.trim()
    }

    /// Invoice value when present and non-blank
    pub fn invoice_key(&self) -> Option<&str> {
        self.invoice
            .as_deref()
            .map(str::trim)
            .filter(|invoice| !invoice.is_empty())
    }

    /// Get an auxiliary field, `Null` when missing
    pub fn field(&self, name: &str) -> &FieldValue {
        static NULL: FieldValue = FieldValue::Null;
        self.fields.get(name).unwrap_or(&NULL)
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.insert(name.into(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracking_numbers_trim_and_drop_empty() {
        let numbers = TrackingNumbers::parse(" 7946; 8812 ;;9001 ");
        assert_eq!(numbers.codes(), &["7946", "8812", "9001"]);
        assert_eq!(numbers.to_delimited(), "7946;8812;9001");
    }

    #[test]
    fn test_tracking_numbers_arity_survives_round_trip() {
        let numbers = TrackingNumbers::parse("A; B ;C");
        let again = TrackingNumbers::parse(&numbers.to_delimited());
        assert_eq!(numbers.len(), again.len());
        assert_eq!(numbers, again);
    }

    #[test]
    fn test_empty_tracking_field() {
        assert!(TrackingNumbers::parse("").is_empty());
        assert!(TrackingNumbers::parse(" ; ").is_empty());
    }

    #[test]
    fn test_carrier_labels() {
        assert_eq!(Carrier::from_label("fedex"), Some(Carrier::FedEx));
        assert_eq!(Carrier::from_label(" UPS "), Some(Carrier::Ups));
        assert_eq!(Carrier::from_label("DHL"), None);
        assert_eq!(Carrier::Ups.to_string(), "UPS");
    }

    #[test]
    fn test_invoice_key_ignores_blank() {
        let mut record = Record::new(" 42 ");
        assert_eq!(record.key(), "42");
        assert_eq!(record.invoice_key(), None);
        record.invoice = Some("  ".to_string());
        assert_eq!(record.invoice_key(), None);
        record.invoice = Some(" INV-1 ".to_string());
        assert_eq!(record.invoice_key(), Some("INV-1"));
    }
}

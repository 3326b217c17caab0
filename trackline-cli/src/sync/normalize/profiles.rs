//! Versioned field-mapping tables for each source sheet
//!
//! A profile says which source columns feed the canonical record fields, which
//! rows are excluded at the source, which derivations run (in order), how the
//! persisted sheet is laid out, and which status markers route a record to
//! the archive.

use super::row::WorkingRow;
use super::rules::{DaysSince, DerivationRule, RowFilter};
use crate::sync::types::{Carrier, FieldValue};

/// Source timestamp layout used by the analytics export
pub const SOURCE_TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Mapping from one canonical field to its column (and accepted spellings)
#[derive(Debug, Clone)]
pub struct FieldMapping {
    /// Column name as written to the persisted sheet
    pub column: String,
    /// Alternate source spellings, matched case-insensitively
    pub aliases: Vec<String>,
    pub required: bool,
}

impl FieldMapping {
    pub fn required(column: &str) -> Self {
        Self {
            column: column.to_string(),
            aliases: Vec::new(),
            required: true,
        }
    }

    pub fn optional(column: &str) -> Self {
        Self {
            column: column.to_string(),
            aliases: Vec::new(),
            required: false,
        }
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|s| s.to_string()).collect();
        self
    }

    /// First non-blank text across the column and its aliases
    pub fn text<'a>(&self, row: &'a WorkingRow) -> Option<&'a str> {
        std::iter::once(&self.column)
            .chain(self.aliases.iter())
            .find_map(|column| row.text(column))
    }

    /// Value across the column and its aliases, `Null` when none is present
    pub fn value(&self, row: &WorkingRow) -> FieldValue {
        std::iter::once(&self.column)
            .chain(self.aliases.iter())
            .map(|column| row.get(column))
            .find(|value| !value.is_null())
            .cloned()
            .unwrap_or(FieldValue::Null)
    }
}

/// Canonical field -> column mapping
#[derive(Debug, Clone)]
pub struct ColumnMap {
    pub id: FieldMapping,
    pub invoice: FieldMapping,
    pub entered_at: FieldMapping,
    pub tracking_numbers: FieldMapping,
    pub delivery_estimate: FieldMapping,
    pub status: FieldMapping,
    /// `None` when the profile always uses its default carrier
    pub carrier: Option<FieldMapping>,
}

impl ColumnMap {
    /// Whether `column` is backed by a typed record field
    pub fn is_canonical(&self, column: &str) -> bool {
        [
            &self.id,
            &self.invoice,
            &self.entered_at,
            &self.tracking_numbers,
            &self.delivery_estimate,
            &self.status,
        ]
        .into_iter()
        .chain(self.carrier.as_ref())
        .any(|mapping| mapping.column == column)
    }
}

/// Complete normalization profile for one source sheet
#[derive(Debug, Clone)]
pub struct SourceProfile {
    pub name: String,
    pub version: u32,
    pub description: String,
    pub columns: ColumnMap,
    /// Accepted layouts for source timestamps, tried in order
    pub source_timestamp_formats: Vec<String>,
    pub exclusions: Vec<RowFilter>,
    pub rules: Vec<DerivationRule>,
    pub default_carrier: Option<Carrier>,
    /// Status substrings that move a record to the archive table
    pub archive_markers: Vec<String>,
    /// Day counter refreshed on every record each cycle
    pub aging: Option<DaysSince>,
    /// Column order of the persisted sheet
    pub layout: Vec<String>,
}

impl SourceProfile {
    /// Look up a built-in profile by name
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "logistic" => Some(logistic()),
            "logistic-tracking" => Some(logistic_tracking()),
            "krati" => Some(krati()),
            "poonam" => Some(poonam()),
            _ => None,
        }
    }

    /// All built-in profiles
    pub fn all_builtin() -> Vec<Self> {
        vec![logistic(), logistic_tracking(), krati(), poonam()]
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

const COURIER_COLUMN: &str = "Tracking Courier Details.Courier  API List";
const TRACKING_DESTINATION: &str = "Tracking Courier Details.Tracking Destination";
const VS_DESTINATION: &str = "Version Sheet.Destination Point";
const VS_STAGE: &str = "Version Sheet.Stage";
const PURCHASE_COST: &str = "Purchase Cost";
const SUPPLIER_KIND: &str = "Supplier (Grainger / Non-Grainger)";

fn urgent_pairs() -> [(&'static str, &'static str); 2] {
    [
        ("Urgent Shipment - Logistics", "Urgent"),
        ("Urgent Shipment - OP", "Urgent"),
    ]
}

fn logistic_columns() -> ColumnMap {
    ColumnMap {
        id: FieldMapping::required("Parent ID").with_aliases(&["Parent_ID", "ParentID"]),
        invoice: FieldMapping::optional("Invoice"),
        entered_at: FieldMapping::required("Date tracking Enter"),
        tracking_numbers: FieldMapping::optional("Tracking Number"),
        delivery_estimate: FieldMapping::optional("Delivery Date"),
        status: FieldMapping::optional("Stage_new"),
        carrier: Some(FieldMapping::optional(COURIER_COLUMN).with_aliases(&["API List"])),
    }
}

fn logistic_layout() -> Vec<String> {
    strings(&[
        "Parent ID",
        "SNo",
        "Destination Point",
        "Batch",
        "Invoice",
        "Version Sheet.Order Payment Received Status",
        "Stage_new",
        "Date tracking Enter",
        "Supplier Name",
        SUPPLIER_KIND,
        "Version Sheet.Placed the Order with Supplier",
        "Tracking Number",
        "Delivery Date",
        "Pic",
        "Item Pics",
        "QTY",
        "Weight_LBS",
        "Dimensions_Inches",
        "Remark by Robert",
        "Remark by Logistic team",
        "Date_of_Dims",
        "comp",
        "book",
        PURCHASE_COST,
        VS_DESTINATION,
        TRACKING_DESTINATION,
        COURIER_COLUMN,
    ])
}

fn dims_age() -> Option<DaysSince> {
    Some(DaysSince::new("Dimensions_Inches", "Date_of_Dims", "comp"))
}

fn logistic_exclusions() -> Vec<RowFilter> {
    vec![
        RowFilter::equals(VS_STAGE, &["ORDER CLOSED"]),
        RowFilter::contains(VS_STAGE, &["TRACK 2", "TRACK 3"]),
        RowFilter::equals(TRACKING_DESTINATION, &["Track 2", "Track 3"]),
    ]
}

/// Derivations shared by both logistic variants, with the EXW override
/// pointed at `exw_target`
fn logistic_rules(exw_target: &str) -> Vec<DerivationRule> {
    vec![
        DerivationRule::numeric(PURCHASE_COST),
        DerivationRule::cost_flag(PURCHASE_COST, "Pic", 250.0),
        DerivationRule::cost_flag(PURCHASE_COST, "Item Pics", 1000.0),
        DerivationRule::canonical_map("Version Sheet.Urgent Shipment", "Urgent", &urgent_pairs()),
        DerivationRule::composite("SNo", "SNo", "Urgent", "|"),
        DerivationRule::canonical_map("EUC Upload", "EUC Upload", &[("Yes", "EucUploaded"), ("No", "")]),
        DerivationRule::composite("Destination Point", VS_DESTINATION, "EUC Upload", "-"),
        DerivationRule::substring_override(VS_DESTINATION, "EXW", exw_target),
        DerivationRule::substring_override(SUPPLIER_KIND, "ebay", "Item Pics"),
        DerivationRule::composite("Stage_new", VS_STAGE, "Version Sheet.Payment Method", "--"),
    ]
}

/// Charlotte tracking sheet; EXW destinations force `Pic`
fn logistic() -> SourceProfile {
    SourceProfile {
        name: "logistic".to_string(),
        version: 2,
        description: "Charlotte tracking sheet (EXW forces Pic)".to_string(),
        columns: logistic_columns(),
        source_timestamp_formats: strings(&[SOURCE_TIMESTAMP_FORMAT]),
        exclusions: logistic_exclusions(),
        rules: logistic_rules("Pic"),
        default_carrier: None,
        archive_markers: strings(&["TRACK 2", "TRACK 3", "CLOSED"]),
        aging: dims_age(),
        layout: logistic_layout(),
    }
}

/// Charlotte tracking sheet, automation variant; EXW destinations force `Item Pics`
fn logistic_tracking() -> SourceProfile {
    SourceProfile {
        name: "logistic-tracking".to_string(),
        version: 2,
        description: "Charlotte automation sheet (EXW forces Item Pics)".to_string(),
        columns: logistic_columns(),
        source_timestamp_formats: strings(&[SOURCE_TIMESTAMP_FORMAT]),
        exclusions: logistic_exclusions(),
        rules: logistic_rules("Item Pics"),
        default_carrier: None,
        archive_markers: strings(&["TRACK 2", "TRACK 3", "CLOSED"]),
        aging: dims_age(),
        layout: logistic_layout(),
    }
}

fn supplier_columns(courier_column: &str) -> ColumnMap {
    ColumnMap {
        id: FieldMapping::required("Parent ID").with_aliases(&["Parent_ID", "ParentID"]),
        invoice: FieldMapping::optional("Invoice"),
        entered_at: FieldMapping::required("Date tracking Enter"),
        tracking_numbers: FieldMapping::optional("Tracking Number"),
        delivery_estimate: FieldMapping::optional("Delivery Date"),
        status: FieldMapping::optional("Stage"),
        carrier: Some(FieldMapping::optional(courier_column)),
    }
}

fn supplier_rules() -> Vec<DerivationRule> {
    vec![
        DerivationRule::assign_when("Stage", &["TRACK 2", "TRACK 3"], "Supplier Name", "CLT"),
        DerivationRule::canonical_map("Urgent", "Urgent", &urgent_pairs()),
    ]
}

/// Krati UK shipments sheet
fn krati() -> SourceProfile {
    SourceProfile {
        name: "krati".to_string(),
        version: 1,
        description: "Krati UK shipments sheet (FedEx only)".to_string(),
        columns: supplier_columns(COURIER_COLUMN),
        source_timestamp_formats: strings(&[SOURCE_TIMESTAMP_FORMAT, "%Y-%m-%d %H:%M:%S"]),
        exclusions: vec![RowFilter::equals("Stage", &["ORDER CLOSED"])],
        rules: supplier_rules(),
        default_carrier: Some(Carrier::FedEx),
        archive_markers: strings(&["ORDER CLOSED"]),
        aging: None,
        layout: strings(&[
            "Parent ID",
            "Date tracking Enter",
            "Urgent",
            "Batch Number",
            "Invoice",
            "Stage",
            "Supplier Name",
            "Tracking Number",
            "Delivery Date",
            "Item",
            "Raptor QTY",
            "Krati QTY",
            "Weight_Kg",
            "Dimensions_CMs",
            "Remark by Logistic team",
            "Remark by Krati",
            "Book",
            COURIER_COLUMN,
        ]),
    }
}

/// Poonam incoming shipments sheet
fn poonam() -> SourceProfile {
    SourceProfile {
        name: "poonam".to_string(),
        version: 1,
        description: "Poonam incoming shipments sheet (FedEx only)".to_string(),
        columns: supplier_columns("API List"),
        source_timestamp_formats: strings(&[SOURCE_TIMESTAMP_FORMAT]),
        exclusions: vec![RowFilter::equals("Stage", &["ORDER CLOSED"])],
        rules: supplier_rules(),
        default_carrier: Some(Carrier::FedEx),
        archive_markers: strings(&["ORDER CLOSED"]),
        aging: None,
        layout: strings(&[
            "Parent ID",
            "Urgent",
            "Batch Number",
            "Destination Point",
            "Stage",
            "Date tracking Enter",
            "Invoice",
            "Supplier Name",
            "Tracking Number",
            "Delivery Date",
            "QTY",
            "Item",
            "Poonam QTY",
            "Weight",
            "Dimensions",
            "Remark by Poonam",
            "Remark by Logistic team",
            "book",
            "box",
            "API List",
        ]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        for profile in SourceProfile::all_builtin() {
            let found = SourceProfile::builtin(&profile.name).expect("registered");
            assert_eq!(found.version, profile.version);
        }
        assert!(SourceProfile::builtin("unknown").is_none());
    }

    #[test]
    fn test_layouts_contain_canonical_columns() {
        for profile in SourceProfile::all_builtin() {
            let c = &profile.columns;
            for mapping in [&c.id, &c.invoice, &c.entered_at, &c.tracking_numbers, &c.delivery_estimate, &c.status] {
                assert!(
                    profile.layout.contains(&mapping.column),
                    "{} layout lacks {}",
                    profile.name,
                    mapping.column
                );
            }
        }
    }

    #[test]
    fn test_exw_override_targets_differ_per_sheet() {
        let target = |profile: &SourceProfile| {
            profile.rules.iter().find_map(|rule| match rule {
                DerivationRule::SubstringOverride { needle, target, .. } if needle == "EXW" => {
                    Some(target.clone())
                }
                _ => None,
            })
        };
        assert_eq!(target(&logistic()).as_deref(), Some("Pic"));
        assert_eq!(target(&logistic_tracking()).as_deref(), Some("Item Pics"));
    }

    #[test]
    fn test_day_counter_columns_are_laid_out() {
        for profile in SourceProfile::all_builtin() {
            let Some(aging) = &profile.aging else { continue };
            for column in [&aging.trigger, &aging.stamp, &aging.days] {
                assert!(profile.layout.contains(column), "{} layout lacks {}", profile.name, column);
            }
        }
        assert!(logistic().aging.is_some());
        assert!(krati().aging.is_none());
    }

    #[test]
    fn test_is_canonical() {
        let columns = logistic_columns();
        assert!(columns.is_canonical("Parent ID"));
        assert!(columns.is_canonical(COURIER_COLUMN));
        assert!(!columns.is_canonical("Pic"));
    }
}

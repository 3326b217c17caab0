//! Derivation rules applied to a row during normalization
//!
//! Rules run in profile order, so an override listed after a threshold flag
//! wins over it.

use std::collections::HashMap;

use chrono::NaiveDate;

use super::row::WorkingRow;
use crate::sync::enrich::parse_loose_date;
use crate::sync::types::{FieldValue, Record};

pub const YES: &str = "Yes";
pub const NO: &str = "No";

/// One deterministic derivation over a working row
#[derive(Debug, Clone)]
pub enum DerivationRule {
    /// Read `column` as a number; text that is not a number is left as is
    Numeric { column: String },
    /// `target` = "Yes" when the cost is missing or exceeds `threshold`, else "No"
    CostFlag {
        cost_column: String,
        target: String,
        threshold: f64,
    },
    /// Map known spellings to one canonical value; anything else becomes absent
    CanonicalMap {
        source: String,
        target: String,
        mapping: HashMap<String, String>,
    },
    /// Join two columns with `separator` only when both are present
    Composite {
        target: String,
        left: String,
        right: String,
        separator: String,
    },
    /// Force `target` to `value` when `column` contains `needle` (case-insensitive)
    SubstringOverride {
        column: String,
        needle: String,
        target: String,
        value: String,
    },
    /// Set `target` to `value` when `column` equals one of `equals_any` (case-insensitive)
    AssignWhen {
        column: String,
        equals_any: Vec<String>,
        target: String,
        value: String,
    },
}

impl DerivationRule {
    pub fn numeric(column: &str) -> Self {
        DerivationRule::Numeric {
            column: column.to_string(),
        }
    }

    pub fn cost_flag(cost_column: &str, target: &str, threshold: f64) -> Self {
        DerivationRule::CostFlag {
            cost_column: cost_column.to_string(),
            target: target.to_string(),
            threshold,
        }
    }

    pub fn canonical_map(source: &str, target: &str, pairs: &[(&str, &str)]) -> Self {
        DerivationRule::CanonicalMap {
            source: source.to_string(),
            target: target.to_string(),
            mapping: pairs
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
        }
    }

    pub fn composite(target: &str, left: &str, right: &str, separator: &str) -> Self {
        DerivationRule::Composite {
            target: target.to_string(),
            left: left.to_string(),
            right: right.to_string(),
            separator: separator.to_string(),
        }
    }

    pub fn substring_override(column: &str, needle: &str, target: &str) -> Self {
        DerivationRule::SubstringOverride {
            column: column.to_string(),
            needle: needle.to_string(),
            target: target.to_string(),
            value: YES.to_string(),
        }
    }

    pub fn assign_when(column: &str, equals_any: &[&str], target: &str, value: &str) -> Self {
        DerivationRule::AssignWhen {
            column: column.to_string(),
            equals_any: equals_any.iter().map(|s| s.to_string()).collect(),
            target: target.to_string(),
            value: value.to_string(),
        }
    }

    /// Apply this rule to the row in place
    pub fn apply(&self, row: &mut WorkingRow) {
        match self {
            DerivationRule::Numeric { column } => {
                if let Some(number) = row.get(column).as_number() {
                    row.set(column, FieldValue::Number(number));
                }
            }
            DerivationRule::CostFlag {
                cost_column,
                target,
                threshold,
            } => {
                let flag = match row.get(cost_column).as_number() {
                    Some(cost) if cost <= *threshold => NO,
                    _ => YES,
                };
                row.set(target, FieldValue::text(flag));
            }
            DerivationRule::CanonicalMap {
                source,
                target,
                mapping,
            } => {
                let mapped = row
                    .text(source)
                    .and_then(|value| mapping.get(value))
                    .map(|canonical| FieldValue::text(canonical.as_str()))
                    .unwrap_or(FieldValue::Null);
                row.set(target, mapped);
            }
            DerivationRule::Composite {
                target,
                left,
                right,
                separator,
            } => {
                let joined = match (row.text(left), row.text(right)) {
                    (Some(l), Some(r)) => FieldValue::text(format!("{}{}{}", l, separator, r)),
                    (Some(only), None) | (None, Some(only)) => FieldValue::text(only),
                    (None, None) => FieldValue::Null,
                };
                row.set(target, joined);
            }
            DerivationRule::SubstringOverride {
                column,
                needle,
                target,
                value,
            } => {
                let hit = row
                    .text(column)
                    .is_some_and(|text| text.to_lowercase().contains(&needle.to_lowercase()));
                if hit {
                    row.set(target, FieldValue::text(value.as_str()));
                }
            }
            DerivationRule::AssignWhen {
                column,
                equals_any,
                target,
                value,
            } => {
                let hit = row
                    .text(column)
                    .is_some_and(|text| equals_any.iter().any(|v| v.eq_ignore_ascii_case(text)));
                if hit {
                    row.set(target, FieldValue::text(value.as_str()));
                }
            }
        }
    }
}

/// Day counter kept on persisted records and refreshed every cycle
///
/// Once `trigger` is filled in, an empty `stamp` is set to the current date;
/// `days` then holds the whole days elapsed since `stamp`. `days` is cleared
/// when `stamp` is empty or not a date.
#[derive(Debug, Clone)]
pub struct DaysSince {
    pub trigger: String,
    pub stamp: String,
    pub days: String,
}

impl DaysSince {
    pub fn new(trigger: &str, stamp: &str, days: &str) -> Self {
        Self {
            trigger: trigger.to_string(),
            stamp: stamp.to_string(),
            days: days.to_string(),
        }
    }

    pub fn apply(&self, record: &mut Record, today: NaiveDate) {
        if record.field(&self.stamp).is_null() && !record.field(&self.trigger).is_null() {
            record.set_field(
                self.stamp.clone(),
                FieldValue::text(today.format("%Y-%m-%d").to_string()),
            );
        }

        let stamped = record.field(&self.stamp).as_str().and_then(parse_loose_date);
        let days = match stamped {
            Some(date) => FieldValue::Number((today - date).num_days() as f64),
            None => FieldValue::Null,
        };
        record.set_field(self.days.clone(), days);
    }
}

/// Row exclusion applied before any derivation
#[derive(Debug, Clone)]
pub enum RowFilter {
    /// Exclude when the column equals one of the values (case-insensitive)
    Equals { column: String, values: Vec<String> },
    /// Exclude when the column contains one of the needles (case-insensitive)
    Contains { column: String, needles: Vec<String> },
}

impl RowFilter {
    pub fn equals(column: &str, values: &[&str]) -> Self {
        RowFilter::Equals {
            column: column.to_string(),
            values: values.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn contains(column: &str, needles: &[&str]) -> Self {
        RowFilter::Contains {
            column: column.to_string(),
            needles: needles.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Reason string when the row is excluded
    pub fn excludes(&self, row: &WorkingRow) -> Option<String> {
        match self {
            RowFilter::Equals { column, values } => {
                let text = row.text(column)?;
                values
                    .iter()
                    .find(|v| v.eq_ignore_ascii_case(text))
                    .map(|v| format!("{} = {}", column, v))
            }
            RowFilter::Contains { column, needles } => {
                let text = row.text(column)?.to_lowercase();
                needles
                    .iter()
                    .find(|n| text.contains(&n.to_lowercase()))
                    .map(|n| format!("{} contains {}", column, n))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::types::RawRow;

    fn row(pairs: &[(&str, &str)]) -> WorkingRow {
        let raw: RawRow = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        WorkingRow::from_raw(&raw)
    }

    #[test]
    fn test_cost_flag_thresholds() {
        let pic = DerivationRule::cost_flag("Purchase Cost", "Pic", 250.0);
        let item_pics = DerivationRule::cost_flag("Purchase Cost", "Item Pics", 1000.0);

        for (cost, expected_pic, expected_item) in [
            ("300", YES, NO),
            ("150", NO, NO),
            ("250", NO, NO),
            ("1000.01", YES, YES),
            ("", YES, YES),
            ("n/a", YES, YES),
        ] {
            let mut r = row(&[("Purchase Cost", cost)]);
            pic.apply(&mut r);
            item_pics.apply(&mut r);
            assert_eq!(r.text("Pic"), Some(expected_pic), "cost {:?}", cost);
            assert_eq!(r.text("Item Pics"), Some(expected_item), "cost {:?}", cost);
        }
    }

    #[test]
    fn test_canonical_map_unmapped_is_absent() {
        let rule = DerivationRule::canonical_map(
            "Urgent",
            "Urgent",
            &[("Urgent Shipment - Logistics", "Urgent"), ("Urgent Shipment - OP", "Urgent")],
        );

        let mut r = row(&[("Urgent", "Urgent Shipment - OP")]);
        rule.apply(&mut r);
        assert_eq!(r.text("Urgent"), Some("Urgent"));

        let mut r = row(&[("Urgent", "Normal")]);
        rule.apply(&mut r);
        assert!(r.get("Urgent").is_null());
    }

    #[test]
    fn test_composite_has_no_trailing_separator() {
        let rule = DerivationRule::composite("Destination Point", "Dest", "EUC", "-");

        let mut r = row(&[("Dest", "EXW London"), ("EUC", "EucUploaded")]);
        rule.apply(&mut r);
        assert_eq!(r.text("Destination Point"), Some("EXW London-EucUploaded"));

        let mut r = row(&[("Dest", "Leeds"), ("EUC", "")]);
        rule.apply(&mut r);
        assert_eq!(r.text("Destination Point"), Some("Leeds"));

        let mut r = row(&[]);
        rule.apply(&mut r);
        assert!(r.get("Destination Point").is_null());
    }

    #[test]
    fn test_override_after_threshold_wins() {
        let rules = [
            DerivationRule::cost_flag("Purchase Cost", "Pic", 250.0),
            DerivationRule::substring_override("Destination", "EXW", "Pic"),
        ];
        let mut r = row(&[("Purchase Cost", "150"), ("Destination", "exw Birmingham")]);
        for rule in &rules {
            rule.apply(&mut r);
        }
        assert_eq!(r.text("Pic"), Some(YES));
    }

    #[test]
    fn test_assign_when() {
        let rule = DerivationRule::assign_when("Stage", &["TRACK 2", "TRACK 3"], "Supplier Name", "CLT");
        let mut r = row(&[("Stage", "track 3"), ("Supplier Name", "Acme")]);
        rule.apply(&mut r);
        assert_eq!(r.text("Supplier Name"), Some("CLT"));

        let mut r = row(&[("Stage", "TRACK 1"), ("Supplier Name", "Acme")]);
        rule.apply(&mut r);
        assert_eq!(r.text("Supplier Name"), Some("Acme"));
    }

    #[test]
    fn test_numeric_keeps_unparseable_text() {
        let rule = DerivationRule::numeric("Purchase Cost");

        let mut r = row(&[("Purchase Cost", " 300.50 ")]);
        rule.apply(&mut r);
        assert_eq!(r.get("Purchase Cost"), &FieldValue::Number(300.5));

        let mut r = row(&[("Purchase Cost", "TBC")]);
        rule.apply(&mut r);
        assert_eq!(r.text("Purchase Cost"), Some("TBC"));
    }

    #[test]
    fn test_days_since_stamps_then_counts() {
        let rule = DaysSince::new("Dimensions_Inches", "Date_of_Dims", "comp");
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();

        let mut fresh = Record::new("P-1");
        fresh.set_field("Dimensions_Inches", FieldValue::text("10x8x4"));
        rule.apply(&mut fresh, today);
        assert_eq!(fresh.field("Date_of_Dims").as_str(), Some("2024-03-10"));
        assert_eq!(fresh.field("comp"), &FieldValue::Number(0.0));

        let mut older = Record::new("P-2");
        older.set_field("Dimensions_Inches", FieldValue::text("10x8x4"));
        older.set_field("Date_of_Dims", FieldValue::text("2024-03-01 00:00:00"));
        rule.apply(&mut older, today);
        assert_eq!(older.field("Date_of_Dims").as_str(), Some("2024-03-01 00:00:00"));
        assert_eq!(older.field("comp").to_cell(), "9");

        let mut pending = Record::new("P-3");
        pending.set_field("comp", FieldValue::text("4"));
        rule.apply(&mut pending, today);
        assert!(pending.field("Date_of_Dims").is_null());
        assert!(pending.field("comp").is_null());
    }

    #[test]
    fn test_row_filters() {
        let closed = RowFilter::equals("Stage", &["ORDER CLOSED"]);
        let track = RowFilter::contains("Stage", &["TRACK 2", "TRACK 3"]);

        assert!(closed.excludes(&row(&[("Stage", "order closed")])).is_some());
        assert!(closed.excludes(&row(&[("Stage", "ORDER CLOSED LATE")])).is_none());
        assert!(track.excludes(&row(&[("Stage", "Moved to TRACK 2")])).is_some());
        assert!(track.excludes(&row(&[])).is_none());
    }
}

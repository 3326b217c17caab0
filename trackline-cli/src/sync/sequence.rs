//! Invoice-grouping sequencer
//!
//! Produces a total order over a record set: invoice groups ordered by their
//! earliest entry, each group's records contiguous and time-ordered, then
//! every record without a usable invoice or timestamp in its original order.

use std::collections::HashMap;

use super::types::Record;

/// Order records by invoice group
///
/// Output is a permutation of the input. Records are grouped when they carry
/// both a non-blank invoice and a parsed `entered_at`. Grouped records are
/// stable-sorted by time, so equal timestamps keep their input order; the
/// rest are appended unsorted.
pub fn sequence(records: Vec<Record>) -> Vec<Record> {
    let total = records.len();
    let (mut grouped, rest): (Vec<Record>, Vec<Record>) = records
        .into_iter()
        .partition(|record| record.invoice_key().is_some() && record.entered_at.is_some());

    grouped.sort_by_key(|record| record.entered_at);

    // One pass: bucket by invoice, remembering first-seen order after the sort
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<Record>> = HashMap::new();
    for record in grouped {
        let invoice = record.invoice_key().unwrap_or_default().to_string();
        groups
            .entry(invoice)
            .or_insert_with_key(|key| {
                order.push(key.clone());
                Vec::new()
            })
            .push(record);
    }

    let group_count = order.len();
    let mut sequenced = Vec::with_capacity(total);
    for invoice in order {
        if let Some(members) = groups.remove(&invoice) {
            sequenced.extend(members);
        }
    }
    let ungrouped = rest.len();
    sequenced.extend(rest);

    log::debug!(
        "Sequenced {} records: {} invoice groups, {} ungrouped",
        sequenced.len(),
        group_count,
        ungrouped
    );

    sequenced
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn record(id: &str, invoice: Option<&str>, entered_at: Option<NaiveDateTime>) -> Record {
        let mut r = Record::new(id);
        r.invoice = invoice.map(str::to_string);
        r.entered_at = entered_at;
        r
    }

    fn ids(records: &[Record]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_groups_follow_earliest_member() {
        let records = vec![
            record("b2", Some("INV-B"), Some(at(3, 9))),
            record("a1", Some("INV-A"), Some(at(2, 9))),
            record("n1", None, Some(at(1, 9))),
            record("b1", Some("INV-B"), Some(at(1, 12))),
            record("a2", Some("INV-A"), Some(at(4, 9))),
            record("n2", Some("  "), Some(at(1, 8))),
        ];

        let out = sequence(records);
        assert_eq!(ids(&out), vec!["b1", "b2", "a1", "a2", "n1", "n2"]);
    }

    #[test]
    fn test_equal_timestamps_keep_input_order() {
        let records = vec![
            record("x", Some("INV"), Some(at(1, 9))),
            record("y", Some("INV"), Some(at(1, 9))),
            record("z", Some("OTHER"), Some(at(1, 9))),
            record("w", Some("INV"), Some(at(1, 9))),
        ];
        let out = sequence(records.clone());
        assert_eq!(ids(&out), vec!["x", "y", "w", "z"]);
        assert_eq!(sequence(records.clone()), sequence(records));
    }

    #[test]
    fn test_missing_timestamp_is_ungrouped() {
        let records = vec![
            record("late", Some("INV"), None),
            record("early", Some("INV"), Some(at(1, 9))),
        ];
        assert_eq!(ids(&sequence(records)), vec!["early", "late"]);
    }

    #[test]
    fn test_output_is_permutation_with_contiguous_groups() {
        let invoices = ["A", "B", "C"];
        let records: Vec<Record> = (0..30u32)
            .map(|i| {
                let invoice = (i % 4 != 3).then(|| invoices[(i as usize * 7) % 3]);
                record(&format!("r{}", i), invoice, Some(at(1 + (i * 5) % 20, i % 24)))
            })
            .collect();

        let out = sequence(records.clone());
        assert_eq!(out.len(), records.len());
        let mut in_ids = ids(&records);
        let mut out_ids = ids(&out);
        in_ids.sort();
        out_ids.sort();
        assert_eq!(in_ids, out_ids);

        for invoice in invoices {
            let positions: Vec<usize> = out
                .iter()
                .enumerate()
                .filter(|(_, r)| r.invoice_key() == Some(invoice))
                .map(|(i, _)| i)
                .collect();
            assert!(positions.windows(2).all(|w| w[1] == w[0] + 1), "{} not contiguous", invoice);

            let first = &out[positions[0]];
            let min = positions.iter().filter_map(|&i| out[i].entered_at).min();
            assert_eq!(first.entered_at, min);
        }
    }

    #[test]
    fn test_empty() {
        assert!(sequence(Vec::new()).is_empty());
    }
}

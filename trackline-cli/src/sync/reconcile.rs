//! Reconciliation of a fresh record set against the persisted baseline

use std::collections::HashSet;

use super::types::Record;

/// Records of `current` whose id does not appear in `baseline`
///
/// Left anti-join on the trimmed, case-sensitive id. `current` keeps its
/// order; neither input is modified.
pub fn reconcile(current: &[Record], baseline: &[Record]) -> Vec<Record> {
    let known: HashSet<&str> = baseline.iter().map(Record::key).collect();

    let new_records: Vec<Record> = current
        .iter()
        .filter(|record| !known.contains(record.key()))
        .cloned()
        .collect();

    log::debug!(
        "Reconciled {} current against {} baseline records: {} new",
        current.len(),
        baseline.len(),
        new_records.len()
    );

    new_records
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(ids: &[&str]) -> Vec<Record> {
        ids.iter().map(|id| Record::new(*id)).collect()
    }

    fn ids(records: &[Record]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_reconcile_anti_join() {
        let current = records(&["A", "B", "C", "D"]);
        let baseline = records(&["B", "D", "Z"]);
        assert_eq!(ids(&reconcile(&current, &baseline)), vec!["A", "C"]);
    }

    #[test]
    fn test_reconcile_empty_sides() {
        let current = records(&["A", "B"]);
        assert_eq!(reconcile(&current, &[]), current);
        assert!(reconcile(&[], &current).is_empty());
    }

    #[test]
    fn test_reconcile_trims_but_keeps_case() {
        let current = records(&[" A1 ", "b2"]);
        let baseline = records(&["A1", "B2"]);
        assert_eq!(ids(&reconcile(&current, &baseline)), vec!["b2"]);
    }

    #[test]
    fn test_reconcile_does_not_touch_inputs() {
        let current = records(&["A", "B"]);
        let baseline = records(&["A"]);
        let before = (current.clone(), baseline.clone());
        let _ = reconcile(&current, &baseline);
        assert_eq!((current, baseline), before);
    }
}

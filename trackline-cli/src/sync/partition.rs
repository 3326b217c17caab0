//! Partition of a record set into active and archived subsets

use super::types::Record;

/// Case-insensitive substring match of a record's status against markers
#[derive(Debug, Clone)]
pub struct MarkerPredicate {
    markers: Vec<String>,
}

impl MarkerPredicate {
    pub fn new<S: AsRef<str>>(markers: &[S]) -> Self {
        Self {
            markers: markers
                .iter()
                .map(|m| m.as_ref().trim().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    pub fn markers(&self) -> &[String] {
        &self.markers
    }

    pub fn matches(&self, record: &Record) -> bool {
        let status = record.status.to_lowercase();
        self.markers.iter().any(|marker| status.contains(marker.as_str()))
    }
}

/// Split records into `(kept, archived)`, preserving relative order in both
pub fn split(records: Vec<Record>, predicate: &MarkerPredicate) -> (Vec<Record>, Vec<Record>) {
    let (archived, kept): (Vec<Record>, Vec<Record>) =
        records.into_iter().partition(|record| predicate.matches(record));

    log::debug!("Split records: {} kept, {} archived", kept.len(), archived.len());
    (kept, archived)
}

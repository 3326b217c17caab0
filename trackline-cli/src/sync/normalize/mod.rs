//! Record normalizer: raw source rows -> canonical records
//!
//! The same profile also drives the lenient decoder for rows read back from a
//! persisted table, and the encoder that lays records out in sheet order.

mod profiles;
mod row;
mod rules;

pub use profiles::{ColumnMap, FieldMapping, SourceProfile, SOURCE_TIMESTAMP_FORMAT};
pub use row::{fold_column, WorkingRow};
pub use rules::{DaysSince, DerivationRule, RowFilter, NO, YES};

use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime};

use super::error::SchemaError;
use super::types::{Carrier, FieldValue, RawRow, Record, Table, TrackingNumbers, TIMESTAMP_FORMAT};

/// Timestamp layouts accepted when reading persisted rows back
const STORED_TIMESTAMP_FORMATS: &[&str] = &[
    TIMESTAMP_FORMAT,
    "%Y/%m/%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M",
    "%Y-%m-%d",
    "%d/%m/%Y",
];

/// Outcome of normalizing one source row
#[derive(Debug, Clone)]
pub enum Normalized {
    Record(Record),
    /// Dropped by a profile filter; counted, not an error
    Excluded { reason: String },
}

/// Source row that failed normalization
#[derive(Debug, Clone)]
pub struct SkippedRow {
    /// Zero-based position in the fetched batch
    pub index: usize,
    /// Id of the row when one could be read
    pub id: Option<String>,
    pub error: SchemaError,
}

/// Result of normalizing a whole fetched batch
#[derive(Debug, Clone, Default)]
pub struct NormalizeOutcome {
    /// Canonical records in fetch order
    pub records: Vec<Record>,
    /// Rows dropped by profile filters
    pub excluded: usize,
    pub skipped: Vec<SkippedRow>,
}

/// Parse a timestamp against `formats`, also accepting date-only layouts
pub fn parse_timestamp<S: AsRef<str>>(value: &str, formats: &[S]) -> Option<NaiveDateTime> {
    let value = value.trim();
    formats.iter().find_map(|format| {
        let format = format.as_ref();
        NaiveDateTime::parse_from_str(value, format).ok().or_else(|| {
            NaiveDate::parse_from_str(value, format)
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
    })
}

/// Normalize one raw source row with the given profile
///
/// Filters run first, then derivations in profile order, then the canonical
/// fields are extracted. Required fields that are missing or blank, and
/// timestamps outside the profile's formats, fail with [`SchemaError`].
pub fn normalize_row(raw: &RawRow, profile: &SourceProfile) -> Result<Normalized, SchemaError> {
    let mut row = WorkingRow::from_raw(raw);

    if let Some(reason) = profile.exclusions.iter().find_map(|filter| filter.excludes(&row)) {
        return Ok(Normalized::Excluded { reason });
    }

    for rule in &profile.rules {
        rule.apply(&mut row);
    }

    let columns = &profile.columns;
    let id = columns
        .id
        .text(&row)
        .ok_or_else(|| SchemaError::MissingField {
            column: columns.id.column.clone(),
        })?;

    let entered_at = match columns.entered_at.text(&row) {
        Some(text) => Some(
            parse_timestamp(text, &profile.source_timestamp_formats).ok_or_else(|| {
                SchemaError::BadTimestamp {
                    column: columns.entered_at.column.clone(),
                    value: text.to_string(),
                }
            })?,
        ),
        None if columns.entered_at.required => {
            return Err(SchemaError::MissingField {
                column: columns.entered_at.column.clone(),
            });
        }
        None => None,
    };

    let mut record = Record::new(id);
    record.entered_at = entered_at;
    fill_record(&mut record, &row, profile);
    Ok(Normalized::Record(record))
}

/// Normalize a fetched batch, recording skipped rows instead of failing
///
/// A later row repeating an id already produced is skipped as a duplicate so
/// ids stay unique within the batch.
pub fn normalize_batch(rows: &[RawRow], profile: &SourceProfile) -> NormalizeOutcome {
    let mut outcome = NormalizeOutcome::default();
    let mut seen: HashSet<String> = HashSet::new();

    for (index, raw) in rows.iter().enumerate() {
        let result = normalize_row(raw, profile).and_then(|normalized| match normalized {
            Normalized::Record(record) if !seen.insert(record.key().to_string()) => {
                Err(SchemaError::DuplicateId {
                    id: record.key().to_string(),
                })
            }
            other => Ok(other),
        });

        match result {
            Ok(Normalized::Record(record)) => outcome.records.push(record),
            Ok(Normalized::Excluded { reason }) => {
                log::debug!("Row {} excluded: {}", index, reason);
                outcome.excluded += 1;
            }
            Err(error) => {
                let id = profile.columns.id.text(&WorkingRow::from_raw(raw)).map(str::to_string);
                log::warn!(
                    "Skipping row {} (id {}): {}",
                    index,
                    id.as_deref().unwrap_or("<none>"),
                    error
                );
                outcome.skipped.push(SkippedRow { index, id, error });
            }
        }
    }

    log::debug!(
        "Normalized {} rows with profile '{}' v{}: {} records, {} excluded, {} skipped",
        rows.len(),
        profile.name,
        profile.version,
        outcome.records.len(),
        outcome.excluded,
        outcome.skipped.len()
    );

    outcome
}

/// Decode a row read back from a persisted table
///
/// Never fails: derivations and filters are not re-run, and a timestamp that
/// cannot be parsed leaves `entered_at` absent while its text is kept so the
/// row is written back unchanged.
pub fn decode_stored(raw: &RawRow, profile: &SourceProfile) -> Record {
    let row = WorkingRow::from_raw(raw);
    let columns = &profile.columns;

    let mut record = Record::new(columns.id.text(&row).unwrap_or_default());
    record.entered_at = columns.entered_at.text(&row).and_then(|text| {
        let repaired = text.replace(" :", ":");
        parse_timestamp(&repaired, STORED_TIMESTAMP_FORMATS)
            .or_else(|| parse_timestamp(&repaired, &profile.source_timestamp_formats))
    });
    fill_record(&mut record, &row, profile);
    record
}

/// Decode persisted rows, returning the records and how many carried an
/// unparseable timestamp
pub fn decode_baseline(rows: &[RawRow], profile: &SourceProfile) -> (Vec<Record>, usize) {
    let records: Vec<Record> = rows.iter().map(|raw| decode_stored(raw, profile)).collect();
    let unparsed = records
        .iter()
        .filter(|record| {
            record.entered_at.is_none()
                && !record.field(&profile.columns.entered_at.column).is_null()
        })
        .count();

    if unparsed > 0 {
        log::warn!(
            "{} baseline rows have an unparseable '{}' and will not be grouped",
            unparsed,
            profile.columns.entered_at.column
        );
    }

    (records, unparsed)
}

/// Refresh the profile's day counter on every record
pub fn refresh_aging(records: &mut [Record], profile: &SourceProfile, today: NaiveDate) {
    let Some(aging) = &profile.aging else {
        return;
    };
    for record in records.iter_mut() {
        aging.apply(record, today);
    }
}

/// Populate every field but `id`/`entered_at` from the working row
fn fill_record(record: &mut Record, row: &WorkingRow, profile: &SourceProfile) {
    let columns = &profile.columns;

    record.invoice = columns.invoice.text(row).map(str::to_string);
    record.tracking_numbers = TrackingNumbers::parse(columns.tracking_numbers.text(row).unwrap_or_default());
    record.delivery_estimate = columns.delivery_estimate.text(row).map(str::to_string);
    record.status = columns.status.text(row).unwrap_or_default().to_string();
    record.carrier = columns
        .carrier
        .as_ref()
        .and_then(|mapping| mapping.text(row))
        .and_then(Carrier::from_label)
        .or(profile.default_carrier);

    // Raw text of every layout column, so columns without a typed value
    // round-trip untouched.
    for column in &profile.layout {
        let value = if columns.is_canonical(column) {
            canonical_mapping(columns, column)
                .map(|mapping| mapping.value(row))
                .unwrap_or_else(|| row.get(column).clone())
        } else {
            row.get(column).clone()
        };
        if !value.is_null() {
            record.set_field(column.clone(), value);
        }
    }
}

fn canonical_mapping<'a>(columns: &'a ColumnMap, column: &str) -> Option<&'a FieldMapping> {
    [
        &columns.id,
        &columns.invoice,
        &columns.entered_at,
        &columns.tracking_numbers,
        &columns.delivery_estimate,
        &columns.status,
    ]
    .into_iter()
    .chain(columns.carrier.as_ref())
    .find(|mapping| mapping.column == column)
}

/// Render one record as cells in the profile's layout order
///
/// Typed values win; a canonical column without a typed value falls back to
/// the text carried in `fields`.
pub fn encode_record(record: &Record, profile: &SourceProfile) -> Vec<String> {
    let columns = &profile.columns;
    profile
        .layout
        .iter()
        .map(|column| {
            let typed = if *column == columns.id.column {
                Some(record.id.clone())
            } else if *column == columns.invoice.column {
                record.invoice.clone()
            } else if *column == columns.entered_at.column {
                record.entered_at.map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())
            } else if *column == columns.tracking_numbers.column {
                Some(record.tracking_numbers.to_delimited()).filter(|s| !s.is_empty())
            } else if *column == columns.delivery_estimate.column {
                record.delivery_estimate.clone()
            } else if *column == columns.status.column {
                Some(record.status.clone()).filter(|s| !s.is_empty())
            } else if columns.carrier.as_ref().is_some_and(|m| m.column == *column) {
                record.carrier.map(|carrier| carrier.label().to_string())
            } else {
                None
            };
            typed.unwrap_or_else(|| record.field(column).to_cell())
        })
        .collect()
}

/// Lay records out as a table in the profile's column order
pub fn encode_table(records: &[Record], profile: &SourceProfile) -> Table {
    let mut table = Table::new(profile.layout.clone());
    for record in records {
        table.push_row(encode_record(record, profile));
    }
    table
}

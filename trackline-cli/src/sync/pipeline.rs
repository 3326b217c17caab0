//! One sync cycle
//!
//! fetch -> normalize -> reconcile against the persisted active table ->
//! enrich new records -> sequence baseline + new -> refresh day counters ->
//! split -> write.
//!
//! A feed or store failure before the writes aborts the cycle with nothing
//! written. The archive is snapshotted before the append; if the active
//! replace then fails, the snapshot is written back so a failed cycle leaves
//! both tables as they were.

use std::fmt;

use chrono::NaiveDate;

use super::enrich::{EnrichmentStats, Enricher};
use super::error::{StoreError, SyncError};
use super::normalize::{
    decode_baseline, encode_table, normalize_batch, refresh_aging, SkippedRow, SourceProfile,
};
use super::partition::{split, MarkerPredicate};
use super::reconcile::reconcile;
use super::sequence::sequence;
use super::types::{Record, Table};
use crate::api::store::TableStore;
use crate::api::zoho::SourceFeed;

/// Where a cycle reads from and writes to
#[derive(Debug, Clone)]
pub struct CycleTables {
    /// Query identifier passed to the feed
    pub view: String,
    pub active: String,
    pub archive: String,
}

/// Diagnostics summary of one cycle
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub fetched: usize,
    /// Rows dropped by profile filters
    pub excluded: usize,
    pub skipped: Vec<SkippedRow>,
    pub baseline: usize,
    /// Baseline rows whose timestamp could not be parsed
    pub baseline_unparsed: usize,
    pub new_records: usize,
    pub lookups: usize,
    pub lookup_errors: usize,
    pub no_data: usize,
    /// Records with tracking codes but no known carrier
    pub unrouted: usize,
    pub kept: usize,
    pub archived: usize,
    /// Whether both writes were issued (false on dry runs)
    pub committed: bool,
}

impl CycleReport {
    fn record_enrichment(&mut self, stats: EnrichmentStats) {
        self.lookups = stats.lookups;
        self.lookup_errors = stats.errors;
        self.no_data = stats.no_data;
        self.unrouted = stats.skipped_records;
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Fetched rows:        {}", self.fetched)?;
        writeln!(f, "Filtered rows:       {}", self.excluded)?;
        writeln!(f, "Skipped rows:        {}", self.skipped.len())?;
        for row in &self.skipped {
            writeln!(
                f,
                "  row {} ({}): {}",
                row.index,
                row.id.as_deref().unwrap_or("no id"),
                row.error
            )?;
        }
        writeln!(
            f,
            "Baseline rows:       {} ({} with unparseable timestamp)",
            self.baseline, self.baseline_unparsed
        )?;
        writeln!(f, "New records:         {}", self.new_records)?;
        writeln!(
            f,
            "Lookups:             {} ({} errors, {} no data)",
            self.lookups, self.lookup_errors, self.no_data
        )?;
        if self.unrouted > 0 {
            writeln!(f, "Without carrier:     {}", self.unrouted)?;
        }
        writeln!(f, "Kept / archived:     {} / {}", self.kept, self.archived)?;
        write!(
            f,
            "Committed:           {}",
            if self.committed { "yes" } else { "no (dry run)" }
        )
    }
}

/// Runs sync cycles against one feed, store and profile
pub struct SyncCycle<'a> {
    feed: &'a dyn SourceFeed,
    store: &'a dyn TableStore,
    profile: &'a SourceProfile,
    tables: CycleTables,
    predicate: MarkerPredicate,
    dry_run: bool,
    today: NaiveDate,
}

impl<'a> SyncCycle<'a> {
    pub fn new(
        feed: &'a dyn SourceFeed,
        store: &'a dyn TableStore,
        profile: &'a SourceProfile,
        tables: CycleTables,
    ) -> Self {
        Self {
            feed,
            store,
            profile,
            tables,
            predicate: MarkerPredicate::new(&profile.archive_markers),
            dry_run: false,
            today: chrono::Local::now().date_naive(),
        }
    }

    pub fn tables(&self) -> &CycleTables {
        &self.tables
    }

    /// Date the day counters are measured against
    pub fn as_of(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Replace the profile's archive markers
    pub fn with_markers<S: AsRef<str>>(mut self, markers: &[S]) -> Self {
        self.predicate = MarkerPredicate::new(markers);
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Fetch, normalize and reconcile; returns the baseline and the new records
    async fn collect(&self, report: &mut CycleReport) -> Result<(Vec<Record>, Vec<Record>), SyncError> {
        let rows = self.feed.fetch(&self.tables.view).await.map_err(|e| {
            log::error!("Fetching '{}' failed: {}", self.tables.view, e);
            SyncError::from(e)
        })?;
        report.fetched = rows.len();

        let outcome = normalize_batch(&rows, self.profile);
        report.excluded = outcome.excluded;
        report.skipped = outcome.skipped;
        log::info!(
            "Fetched {} rows from '{}': {} records, {} filtered, {} skipped",
            report.fetched,
            self.tables.view,
            outcome.records.len(),
            report.excluded,
            report.skipped.len()
        );

        let stored = self.store.read_all(&self.tables.active).await.map_err(|e| {
            log::error!("Reading baseline failed: {}", e);
            SyncError::from(e)
        })?;
        let (baseline, unparsed) = decode_baseline(&stored.raw_rows(), self.profile);
        report.baseline = baseline.len();
        report.baseline_unparsed = unparsed;

        let new_records = reconcile(&outcome.records, &baseline);
        report.new_records = new_records.len();
        log::info!(
            "Baseline '{}' has {} records; {} new",
            self.tables.active,
            report.baseline,
            report.new_records
        );

        Ok((baseline, new_records))
    }

    /// Records the next cycle would add, without lookups or writes
    pub async fn collect_new(&self) -> Result<(CycleReport, Vec<Record>), SyncError> {
        let mut report = CycleReport::default();
        let (_, new_records) = self.collect(&mut report).await?;
        Ok((report, new_records))
    }

    /// Run one full cycle, looking up estimates for new records with `enricher`
    pub async fn run(&self, enricher: &Enricher) -> Result<CycleReport, SyncError> {
        let mut report = CycleReport::default();
        let (baseline, mut new_records) = self.collect(&mut report).await?;

        let stats = enricher.enrich_all(&mut new_records).await;
        report.record_enrichment(stats);
        log::info!(
            "Enriched {} new records: {} lookups, {} errors, {} no data",
            report.new_records,
            report.lookups,
            report.lookup_errors,
            report.no_data
        );

        let mut combined = baseline;
        combined.extend(new_records);
        let mut ordered = sequence(combined);
        refresh_aging(&mut ordered, self.profile, self.today);

        let (kept, archived) = split(ordered, &self.predicate);
        report.kept = kept.len();
        report.archived = archived.len();
        log::info!(
            "{} records kept in '{}', {} moving to '{}'",
            report.kept,
            self.tables.active,
            report.archived,
            self.tables.archive
        );

        if self.dry_run {
            log::info!("Dry run: skipping writes");
            return Ok(report);
        }

        self.commit(&kept, &archived).await?;
        report.committed = true;
        Ok(report)
    }

    /// Append to the archive, then replace the active table
    ///
    /// Either both writes land or the archive is put back as it was.
    async fn commit(&self, kept: &[Record], archived: &[Record]) -> Result<(), SyncError> {
        let active_rows = encode_table(kept, self.profile);
        if archived.is_empty() {
            return Ok(self.replace_active(&active_rows).await?);
        }

        let snapshot = self.store.read_all(&self.tables.archive).await.map_err(|e| {
            log::error!("Reading archive before the append failed: {}", e);
            SyncError::from(e)
        })?;

        let archive_rows = encode_table(archived, self.profile);
        self.store
            .append(&self.tables.archive, &archive_rows)
            .await
            .map_err(|e| {
                log::error!("Appending to archive failed: {}", e);
                SyncError::from(e)
            })?;

        let Err(cause) = self.replace_active(&active_rows).await else {
            return Ok(());
        };

        log::warn!(
            "Restoring '{}' to its {} rows from before the append",
            self.tables.archive,
            snapshot.len()
        );
        match self.store.replace_all(&self.tables.archive, &snapshot).await {
            Ok(()) => Err(SyncError::Store(cause)),
            Err(rollback) => {
                log::error!("Restoring archive failed: {}", rollback);
                Err(SyncError::Rollback { cause, rollback })
            }
        }
    }

    async fn replace_active(&self, rows: &Table) -> Result<(), StoreError> {
        self.store
            .replace_all(&self.tables.active, rows)
            .await
            .inspect_err(|e| log::error!("Replacing active table failed: {}", e))
    }
}

/// Result of one cycle in a multi-sheet run
#[derive(Debug)]
pub struct RunOutcome {
    pub label: String,
    pub result: Result<CycleReport, SyncError>,
}

/// Run cycles one after another with a shared enricher
///
/// A failed cycle is logged and recorded; the cycles after it still run.
pub async fn run_in_sequence(cycles: &[(String, SyncCycle<'_>)], enricher: &Enricher) -> Vec<RunOutcome> {
    let mut outcomes = Vec::with_capacity(cycles.len());
    for (label, cycle) in cycles {
        log::info!("Starting cycle '{}' ({} -> {})", label, cycle.tables().view, cycle.tables().active);
        let result = cycle.run(enricher).await;
        if let Err(e) = &result {
            log::error!("Cycle '{}' failed: {}", label, e);
        }
        outcomes.push(RunOutcome {
            label: label.clone(),
            result,
        });
    }
    outcomes
}

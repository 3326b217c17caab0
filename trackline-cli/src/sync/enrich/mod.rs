//! Delivery-estimate enrichment
//!
//! Every tracking code of every record becomes one lookup job. Jobs run
//! concurrently under the shared [`ConcurrencyLimiter`] and their results are
//! collected by job index, so each record's estimate lists its codes in
//! their original order whatever the completion order was.

pub mod dates;

pub use dates::{convert_dates, display_estimate, parse_estimate_date, parse_loose_date};

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;

use crate::api::resilience::{ConcurrencyLimiter, ConcurrencyStats};
use crate::sync::error::LookupError;
use crate::sync::types::{Carrier, EstimateResult, Record};

/// Delimiter between estimate tokens at the raw stage
pub const RAW_DELIMITER: &str = ";";

/// Per-carrier delivery estimate lookup
///
/// Implementations return `Ok(NoData)` when the carrier answered without a
/// usable estimate; any `Err` is rendered into an `Error(..)` token.
#[async_trait]
pub trait CarrierLookup: Send + Sync {
    async fn lookup(&self, carrier: Carrier, code: &str) -> Result<EstimateResult, LookupError>;
}

/// Counters for one enrichment run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentStats {
    pub lookups: usize,
    pub errors: usize,
    pub no_data: usize,
    /// Records with codes but no recognised carrier
    pub skipped_records: usize,
}

/// Join per-code results into the raw-stage estimate string
pub fn raw_estimate(results: &[EstimateResult]) -> String {
    results
        .iter()
        .map(EstimateResult::to_token)
        .collect::<Vec<_>>()
        .join(RAW_DELIMITER)
}

struct LookupJob {
    record: usize,
    carrier: Carrier,
    code: String,
}

/// Runs carrier lookups for records under a concurrency limit
#[derive(Clone)]
pub struct Enricher {
    lookup: Arc<dyn CarrierLookup>,
    limiter: ConcurrencyLimiter,
}

impl Enricher {
    pub fn new(lookup: Arc<dyn CarrierLookup>, limiter: ConcurrencyLimiter) -> Self {
        Self { lookup, limiter }
    }

    pub fn limiter_stats(&self) -> ConcurrencyStats {
        self.limiter.stats()
    }

    /// Enrich a single record
    pub async fn enrich(&self, record: Record) -> Record {
        let mut records = [record];
        self.enrich_all(&mut records).await;
        let [record] = records;
        record
    }

    /// Enrich records in place
    ///
    /// Only `delivery_estimate` is touched, and only on records that have at
    /// least one tracking code and a carrier. A failed lookup never affects
    /// its siblings.
    pub async fn enrich_all(&self, records: &mut [Record]) -> EnrichmentStats {
        let mut stats = EnrichmentStats::default();
        let mut jobs: Vec<LookupJob> = Vec::new();

        for (index, record) in records.iter().enumerate() {
            if record.tracking_numbers.is_empty() {
                continue;
            }
            let Some(carrier) = record.carrier else {
                log::debug!("Record {} has tracking codes but no known carrier", record.id);
                stats.skipped_records += 1;
                continue;
            };
            jobs.extend(record.tracking_numbers.codes().iter().map(|code| LookupJob {
                record: index,
                carrier,
                code: code.clone(),
            }));
        }

        log::info!(
            "Looking up {} tracking codes across {} records ({} concurrent)",
            jobs.len(),
            records.len(),
            self.limiter.max_concurrent_lookups()
        );

        let futures = jobs.iter().map(|job| self.run_job(job));
        let results: Vec<EstimateResult> = join_all(futures).await;

        // Results line up with `jobs`, and jobs of one record are contiguous
        let mut per_record: Vec<Vec<EstimateResult>> = vec![Vec::new(); records.len()];
        for (job, result) in jobs.iter().zip(results) {
            stats.lookups += 1;
            match &result {
                EstimateResult::Error(message) => {
                    log::warn!(
                        "Lookup failed for {} code {} on record {}: {}",
                        job.carrier,
                        job.code,
                        records[job.record].id,
                        message
                    );
                    stats.errors += 1;
                }
                EstimateResult::NoData => stats.no_data += 1,
                _ => {}
            }
            per_record[job.record].push(result);
        }

        for (record, results) in records.iter_mut().zip(per_record) {
            if results.is_empty() {
                continue;
            }
            let raw = raw_estimate(&results);
            log::debug!("Record {} raw estimate: {}", record.id, raw);
            record.delivery_estimate = Some(display_estimate(&raw));
        }

        stats
    }

    async fn run_job(&self, job: &LookupJob) -> EstimateResult {
        let outcome = match self.limiter.acquire().await {
            Ok(_permit) => self.lookup.lookup(job.carrier, &job.code).await,
            Err(e) => Err(e),
        };
        outcome.unwrap_or_else(|e| EstimateResult::Error(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::resilience::ConcurrencyConfig;
    use crate::sync::types::TrackingNumbers;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Answers from a table, finishing later codes first
    struct TableLookup {
        answers: HashMap<String, (u64, Result<EstimateResult, LookupError>)>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl TableLookup {
        fn new(answers: Vec<(&str, u64, Result<EstimateResult, LookupError>)>) -> Self {
            Self {
                answers: answers
                    .into_iter()
                    .map(|(code, delay, result)| (code.to_string(), (delay, result)))
                    .collect(),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CarrierLookup for TableLookup {
        async fn lookup(&self, _carrier: Carrier, code: &str) -> Result<EstimateResult, LookupError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let (delay, result) = self
                .answers
                .get(code)
                .cloned()
                .unwrap_or((0, Ok(EstimateResult::NoData)));
            tokio::time::sleep(Duration::from_millis(delay)).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    fn record(id: &str, codes: &str, carrier: Option<Carrier>) -> Record {
        let mut r = Record::new(id);
        r.tracking_numbers = TrackingNumbers::parse(codes);
        r.carrier = carrier;
        r
    }

    fn enricher(lookup: Arc<TableLookup>, limit: usize) -> Enricher {
        Enricher::new(lookup, ConcurrencyLimiter::new(ConcurrencyConfig::limited(limit)))
    }

    #[tokio::test]
    async fn test_results_reassembled_in_code_order() {
        let lookup = Arc::new(TableLookup::new(vec![
            ("A", 30, Ok(EstimateResult::Date(date(2024, 1, 5)))),
            ("B", 20, Err(LookupError::Request { message: "x".into() })),
            ("C", 0, Ok(EstimateResult::DateWithCount(date(2024, 2, 1), 2))),
        ]));

        let enriched = enricher(lookup, 10)
            .enrich(record("P-1", "A;B;C", Some(Carrier::FedEx)))
            .await;

        assert_eq!(
            enriched.delivery_estimate.as_deref(),
            Some("2024-01-05 | Error: x | 2024-02-01 [2]")
        );
    }

    #[test]
    fn test_raw_stage_uses_semicolons() {
        let results = [
            EstimateResult::Date(date(2024, 1, 5)),
            EstimateResult::Error("x".into()),
            EstimateResult::DateWithCount(date(2024, 2, 1), 2),
        ];
        assert_eq!(raw_estimate(&results), "2024-01-05;Error: x;2024-02-01 [2]");
    }

    #[tokio::test]
    async fn test_enrich_all_counts_and_skips() {
        let lookup = Arc::new(TableLookup::new(vec![
            ("1", 0, Ok(EstimateResult::Date(date(2024, 5, 1)))),
            ("2", 0, Ok(EstimateResult::NoData)),
            ("3", 0, Err(LookupError::Auth { message: "denied".into() })),
        ]));

        let mut untouched = record("none", "9", None);
        untouched.delivery_estimate = Some("kept".into());
        let mut out = vec![
            record("a", "1;2", Some(Carrier::Ups)),
            record("b", "", Some(Carrier::FedEx)),
            untouched,
            record("c", "3", Some(Carrier::FedEx)),
        ];

        let stats = enricher(lookup, 4).enrich_all(&mut out).await;

        assert_eq!(
            stats,
            EnrichmentStats {
                lookups: 3,
                errors: 1,
                no_data: 1,
                skipped_records: 1,
            }
        );
        let ids: Vec<_> = out.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "none", "c"]);
        assert_eq!(out[0].delivery_estimate.as_deref(), Some("2024-05-01 | No data"));
        assert_eq!(out[1].delivery_estimate, None);
        assert_eq!(out[2].delivery_estimate.as_deref(), Some("kept"));
        assert_eq!(
            out[3].delivery_estimate.as_deref(),
            Some("Error: token request failed: denied")
        );
    }

    #[tokio::test]
    async fn test_in_flight_lookups_bounded() {
        let answers: Vec<(String, u64)> = (0..12).map(|i| (format!("c{}", i), 5)).collect();
        let lookup = Arc::new(TableLookup::new(
            answers
                .iter()
                .map(|(code, delay)| (code.as_str(), *delay, Ok(EstimateResult::NoData)))
                .collect(),
        ));
        let codes: Vec<String> = answers.iter().map(|(code, _)| code.clone()).collect();
        let mut records = vec![
            record("a", &codes[..6].join(";"), Some(Carrier::FedEx)),
            record("b", &codes[6..].join(";"), Some(Carrier::Ups)),
        ];

        let stats = enricher(lookup.clone(), 3).enrich_all(&mut records).await;

        assert_eq!(stats.lookups, 12);
        assert!(lookup.max_in_flight.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_closed_pool_yields_error_tokens() {
        let lookup = Arc::new(TableLookup::new(vec![]));
        let limiter = ConcurrencyLimiter::new(ConcurrencyConfig::limited(2));
        limiter.close();

        let mut out = vec![record("a", "1;2", Some(Carrier::FedEx))];
        let stats = Enricher::new(lookup, limiter).enrich_all(&mut out).await;

        assert_eq!(stats.errors, 2);
        assert_eq!(
            out[0].delivery_estimate.as_deref(),
            Some("Error: lookup pool closed | Error: lookup pool closed")
        );
    }
}

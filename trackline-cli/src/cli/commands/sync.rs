//! `trackline sync`

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use colored::*;

use super::Session;
use crate::api::store::open_store;
use crate::cli::SyncArgs;
use crate::sync::{run_in_sequence, SyncCycle};

pub async fn handle_sync_command(args: SyncArgs, config_path: Option<&Path>) -> Result<()> {
    let session = Session::load(config_path)?;
    let targets = if args.all {
        session.all_targets()?
    } else {
        vec![session.target(args.profile.as_deref())?]
    };
    let feeds = targets
        .iter()
        .map(|target| session.feed(target))
        .collect::<Result<Vec<_>>>()?;
    let store = open_store(&session.config.store).context("Failed to open the table store")?;
    let enricher = session.enricher()?;

    if args.dry_run {
        println!("{}", "Dry run: nothing will be written".yellow());
    }

    let cycles: Vec<_> = targets
        .iter()
        .zip(&feeds)
        .map(|(target, feed)| {
            println!(
                "Syncing '{}' with profile {} into {}",
                target.run.view.cyan(),
                target.label().bright_green(),
                target.run.active_table.cyan()
            );
            let cycle = SyncCycle::new(feed.as_ref(), store.as_ref(), &target.profile, target.tables())
                .with_markers(target.archive_markers())
                .dry_run(args.dry_run);
            (target.label(), cycle)
        })
        .collect();

    let started = Instant::now();
    let outcomes = run_in_sequence(&cycles, &enricher).await;

    let permits = enricher.limiter_stats();
    log::debug!(
        "Lookup permits: {} acquired, {:.0}% waited for a free slot",
        permits.lookups_acquired,
        permits.wait_rate() * 100.0
    );

    let mut failed = 0;
    for outcome in &outcomes {
        println!();
        println!("{}", outcome.label.bold());
        match &outcome.result {
            Ok(report) => {
                println!("{}", report);
                if !report.skipped.is_empty() || report.lookup_errors > 0 {
                    println!(
                        "{} {} skipped rows and {} lookup errors",
                        "!".yellow().bold(),
                        report.skipped.len(),
                        report.lookup_errors
                    );
                }
            }
            Err(e) => {
                failed += 1;
                println!("{} {}", "✗".red().bold(), e);
                if e.persisted_unchanged() {
                    println!("  {}", "Persisted tables were left unchanged".dimmed());
                } else {
                    println!("  {}", "The archive table may hold rows from this cycle".red());
                }
            }
        }
    }

    let elapsed = started.elapsed().as_secs_f64();
    println!();
    if failed > 0 {
        anyhow::bail!("{} of {} sync cycles failed ({:.1}s)", failed, outcomes.len(), elapsed);
    }
    println!("{} Completed in {:.1}s", "✓".green().bold(), elapsed);
    Ok(())
}

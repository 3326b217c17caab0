//! `trackline diff`

use std::path::Path;

use anyhow::{Context, Result};
use colored::*;

use super::Session;
use crate::api::store::open_store;
use crate::cli::DiffArgs;
use crate::sync::types::TIMESTAMP_FORMAT;
use crate::sync::SyncCycle;

pub async fn handle_diff_command(args: DiffArgs, config_path: Option<&Path>) -> Result<()> {
    let session = Session::load(config_path)?;
    let target = session.target(args.profile.as_deref())?;
    let feed = session.feed(&target)?;
    let store = open_store(&session.config.store).context("Failed to open the table store")?;

    let (report, new_records) =
        SyncCycle::new(feed.as_ref(), store.as_ref(), &target.profile, target.tables())
            .collect_new()
            .await
            .context("Could not compute the difference")?;

    println!(
        "{} fetched, {} filtered, {} skipped, {} already in '{}'",
        report.fetched,
        report.excluded,
        report.skipped.len(),
        report.baseline,
        target.run.active_table
    );

    if new_records.is_empty() {
        println!("{}", "No new records".dimmed());
        return Ok(());
    }

    println!("{} new records:", new_records.len().to_string().bright_green().bold());
    for record in &new_records {
        let entered = record
            .entered_at
            .map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())
            .unwrap_or_default();
        println!(
            "  {:<14} {:<16} {:<19} {}",
            record.id.bold(),
            record.invoice.as_deref().unwrap_or("-"),
            entered,
            record.tracking_numbers.to_delimited().dimmed()
        );
    }
    Ok(())
}

//! `trackline profiles`

use anyhow::Result;
use colored::*;

use crate::cli::ProfilesArgs;
use crate::sync::normalize::SourceProfile;

pub fn handle_profiles_command(args: ProfilesArgs) -> Result<()> {
    let Some(name) = args.name else {
        for profile in SourceProfile::all_builtin() {
            println!(
                "{:<18} v{}  {}",
                profile.name.bright_green(),
                profile.version,
                profile.description
            );
        }
        return Ok(());
    };

    let Some(profile) = SourceProfile::builtin(&name) else {
        anyhow::bail!("Unknown profile '{}'", name);
    };

    println!("{} v{}", profile.name.bright_green().bold(), profile.version);
    println!("{}", profile.description.dimmed());
    println!();
    println!("Id column:        {}", profile.columns.id.column);
    println!("Timestamp column: {}", profile.columns.entered_at.column);
    println!("Status column:    {}", profile.columns.status.column);
    println!("Archive markers:  {}", profile.archive_markers.join(", "));
    println!("Filters:          {}", profile.exclusions.len());
    println!("Derivation rules: {}", profile.rules.len());
    if let Some(aging) = &profile.aging {
        println!(
            "Day counter:      {} = days since {} (stamped when {} is filled)",
            aging.days, aging.stamp, aging.trigger
        );
    }
    println!();
    println!("Layout:");
    for (idx, column) in profile.layout.iter().enumerate() {
        println!("  {:>2}. {}", idx + 1, column);
    }
    Ok(())
}

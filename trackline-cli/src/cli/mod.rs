//! Command-line interface definitions

pub mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "trackline")]
#[command(about = "Sync shipment tracking records from the analytics export into operational sheets")]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to <config dir>/trackline/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one sync cycle
    Sync(SyncArgs),
    /// List records the next cycle would add
    Diff(DiffArgs),
    /// Normalize delivery-date values
    ConvertDates(ConvertDatesArgs),
    /// List built-in source profiles
    Profiles(ProfilesArgs),
}

#[derive(Args)]
pub struct SyncArgs {
    /// Do every read, lookup and transform but skip both writes
    #[arg(long)]
    pub dry_run: bool,

    /// Source profile (overrides source.profile)
    #[arg(long, conflicts_with = "all")]
    pub profile: Option<String>,

    /// Run every [[runs]] entry of the config, one after another
    #[arg(long)]
    pub all: bool,
}

#[derive(Args)]
pub struct DiffArgs {
    /// Source profile (overrides source.profile)
    #[arg(long)]
    pub profile: Option<String>,
}

#[derive(Args)]
pub struct ConvertDatesArgs {
    /// Values such as "2024-01-05T10:00:00 [2] | 20240201"
    #[arg(required = true)]
    pub values: Vec<String>,
}

#[derive(Args)]
pub struct ProfilesArgs {
    /// Show the column layout of one profile
    pub name: Option<String>,
}

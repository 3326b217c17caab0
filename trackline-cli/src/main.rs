mod api;
mod cli;
mod config;
mod sync;

use anyhow::Result;
use clap::Parser;

use cli::commands::{convert_dates, diff, profiles, sync as sync_cmd};
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(format!("warn,trackline={}", level)),
    )
    .init();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Sync(args) => sync_cmd::handle_sync_command(args, config_path).await,
        Commands::Diff(args) => diff::handle_diff_command(args, config_path).await,
        Commands::ConvertDates(args) => convert_dates::handle_convert_dates_command(args),
        Commands::Profiles(args) => profiles::handle_profiles_command(args),
    }
}

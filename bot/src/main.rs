use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod state;

use crate::commands::{
    handle_daemon, handle_history, handle_run_once, handle_show, handle_test_venue,
    handle_validate_config, handle_version,
};
use crate::state::AppState;

#[derive(Parser)]
#[command(
    name = "ahr999",
    about = "Daily AHR999-driven dollar-cost averaging across spot venues"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print today's index, its inputs and the suggested action.
    Show {
        /// Trading day to evaluate (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Print the snapshot and decision as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Check price and balance access on one configured venue.
    TestVenue {
        /// Venue name (binance, okx, bitget).
        venue: String,
    },
    /// Load and validate the configuration, including credentials.
    ValidateConfig,
    /// Run the pipeline once for a day and exit.
    RunOnce {
        /// Record decisions without placing orders.
        #[arg(long, default_value_t = false)]
        dry_run: bool,

        /// Trading day to run for (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Run every day at the configured time until interrupted.
    Daemon {
        /// Record decisions without placing orders.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Show the most recent execution records.
    History {
        /// Number of records to show.
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Only records for this day (YYYY-MM-DD).
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Print build information.
    Version,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("AHR_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Version => handle_version(),
        Commands::ValidateConfig => handle_validate_config(),
        Commands::Show { date, json } => handle_show(&AppState::new()?, date, json).await,
        Commands::TestVenue { venue } => handle_test_venue(&AppState::new()?, &venue).await,
        Commands::RunOnce { dry_run, date } => {
            handle_run_once(&AppState::new()?, dry_run, date).await
        }
        Commands::Daemon { dry_run } => handle_daemon(&AppState::new()?, dry_run).await,
        Commands::History { limit, date } => handle_history(&AppState::new()?, limit, date),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_once_flags() {
        let cli = Cli::try_parse_from(["ahr999", "run-once", "--dry-run", "--date", "2024-06-01"]).unwrap();
        match cli.command {
            Commands::RunOnce { dry_run, date } => {
                assert!(dry_run);
                assert_eq!(date, NaiveDate::from_ymd_opt(2024, 6, 1));
            }
            _ => panic!("expected run-once"),
        }
    }

    #[test]
    fn test_test_venue_requires_name() {
        assert!(Cli::try_parse_from(["ahr999", "test-venue"]).is_err());
    }
}

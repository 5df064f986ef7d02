//! Lemmy community migration
//!
//! Single-binary tool that:
//! 1. Logs in to the main account (or reads a backup file)
//! 2. Lists the communities it follows
//! 3. Logs in to every other configured account
//! 4. Subscribes each of them to whatever they are missing

mod config;
mod error;
mod run;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::run::{RunOptions, RunSummary};

/// Copy community subscriptions from one Lemmy account to others.
#[derive(Debug, Parser)]
#[command(name = "lemmy-migrate", version, about)]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the main account's subscriptions to this backup file
    #[arg(short, long, value_name = "PATH")]
    export: Option<PathBuf>,

    /// Read subscriptions from this backup file: the source set, or with
    /// --update-main the main account's baseline
    #[arg(short, long, value_name = "PATH")]
    import: Option<PathBuf>,

    /// Resolve communities but do not subscribe to anything
    #[arg(short, long)]
    dry_run: bool,

    /// Push the other accounts' subscriptions into the main account
    #[arg(short, long)]
    update_main: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn run_options(&self) -> RunOptions {
        RunOptions {
            export: self.export.clone(),
            import: self.import.clone(),
            dry_run: self.dry_run,
            update_main: self.update_main,
        }
    }
}

fn init_tracing(json: bool) {
    // LOG_LEVEL wins over RUST_LOG; default is info
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_target(false)))
        .init();
}

fn log_summary(summary: &RunSummary) {
    for skipped in &summary.skipped {
        warn!(account = %skipped.account, reason = %skipped.reason, "account skipped");
    }

    for report in &summary.reports {
        for failure in &report.failures {
            warn!(
                account = %report.destination,
                community = %failure.community,
                error = %failure.error,
                "community not subscribed"
            );
        }
    }

    info!(
        source_communities = summary.source_communities,
        accounts_synced = summary.reports.len(),
        accounts_skipped = summary.skipped.len(),
        subscribed = summary.total_succeeded(),
        failed = summary.total_failed(),
        "migration finished"
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    info!("starting lemmy-migrate");

    let config_path = Config::resolve_path(cli.config.as_deref());
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        main = %config.main,
        accounts = config.accounts.len(),
        rate_limit_ms = config.client.rate_limit_ms,
        "configuration loaded"
    );

    let summary = run::run(&config, &cli.run_options())
        .await
        .context("migration aborted")?;

    log_summary(&summary);
    Ok(())
}

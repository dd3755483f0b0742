//! Command-line entry point for the collector jobs.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use finca_api::PortalClient;
use finca_archive::ResponseArchive;
use finca_collector::ScanRunner;
use finca_core::{AppConfig, JobKind};
use finca_db::Database;

/// Scheduled collector for property listings.
#[derive(Debug, Parser)]
#[command(name = "finca-collector", version, about)]
struct Args {
    /// Job to run: `daily-new-listings` or `weekly-full-scan`.
    job: String,

    /// Cap the number of pages fetched this run.
    #[arg(long)]
    max_pages: Option<u32>,

    /// SQLite database file, overriding the configured path.
    #[arg(long)]
    database: Option<PathBuf>,

    /// Raw-response archive directory, overriding the configured path.
    #[arg(long)]
    archive_root: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let kind = JobKind::parse(&args.job).with_context(|| {
        format!(
            "unknown job {:?} (expected daily-new-listings or weekly-full-scan)",
            args.job
        )
    })?;

    let mut config = AppConfig::load_with_env().context("failed to load configuration")?;
    if args.max_pages.is_some() {
        config.job.max_pages = args.max_pages;
    }
    if let Some(path) = args.database {
        config.database.path = path;
    }
    if let Some(root) = args.archive_root {
        config.archive.root = root;
    }

    let db = Database::new(&config.database.path.to_string_lossy())
        .await
        .context("failed to open database")?;
    db.run_migrations()
        .await
        .context("failed to apply migrations")?;

    let client = PortalClient::new(&config.api).context("failed to build portal client")?;
    let archive = ResponseArchive::new(config.archive.root.clone());

    let mut runner = ScanRunner::new(db, client, archive, config);
    let summary = runner.run(kind).await?;

    tracing::info!(
        "{}: {} new, {} price changes, {} republished, {} active, {} skipped",
        summary.job_id,
        summary.actions.new,
        summary.actions.price_change,
        summary.actions.republished,
        summary.actions.active,
        summary.actions.skipped
    );
    Ok(())
}

//! Store maintenance and run-ledger handlers.

use std::path::{Path, PathBuf};

use churnlens_core::AppConfig;
use clap::Subcommand;

use crate::wiring::{connect, open_store};

/// Sub-commands available under `db`.
#[derive(Debug, Subcommand)]
pub enum DbCommands {
    /// Create the store if needed and apply pending migrations
    Migrate {
        /// SQLite store (defaults to `CHURNLENS_STORE_PATH`)
        #[arg(long)]
        store_path: Option<PathBuf>,
    },
    /// Show recent pipeline runs
    Runs {
        /// SQLite store (defaults to `CHURNLENS_STORE_PATH`)
        #[arg(long)]
        store_path: Option<PathBuf>,
        /// Maximum number of runs to show
        #[arg(long, default_value = "20")]
        limit: u32,
    },
}

pub(crate) async fn run(config: &AppConfig, command: DbCommands) -> anyhow::Result<()> {
    match command {
        DbCommands::Migrate { store_path } => run_db_migrate(config, store_path.as_deref()).await,
        DbCommands::Runs { store_path, limit } => {
            run_db_runs(config, store_path.as_deref(), limit).await
        }
    }
}

async fn run_db_migrate(config: &AppConfig, store_path: Option<&Path>) -> anyhow::Result<()> {
    let pool = connect(config, store_path).await?;
    churnlens_db::ping(&pool).await?;
    let applied = churnlens_db::run_migrations(&pool).await?;
    println!("applied {applied} migration(s)");
    Ok(())
}

async fn run_db_runs(
    config: &AppConfig,
    store_path: Option<&Path>,
    limit: u32,
) -> anyhow::Result<()> {
    let pool = open_store(config, store_path).await?;
    let runs = churnlens_db::list_pipeline_runs(&pool, i64::from(limit)).await?;

    if runs.is_empty() {
        println!("no pipeline runs recorded");
        return Ok(());
    }

    println!(
        "{:<6}{:<10}{:<11}{:<18}{:>9}  {:<18}ERROR",
        "ID", "MONTH", "STATUS", "STARTED", "RECORDS", "FAILED STAGE"
    );
    for run in &runs {
        let started = run.started_at.map_or_else(
            || "\u{2014}".to_string(),
            |t| t.format("%Y-%m-%d %H:%M").to_string(),
        );
        println!(
            "{:<6}{:<10}{:<11}{:<18}{:>9}  {:<18}{}",
            run.id,
            run.month_key,
            run.status,
            started,
            run.records_processed,
            run.failed_stage.as_deref().unwrap_or("\u{2014}"),
            run.error_message.as_deref().unwrap_or(""),
        );
    }
    Ok(())
}

mod db;
mod harvest;
mod pipeline;
mod schedule;
mod summary;
mod wiring;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::db::DbCommands;
use crate::harvest::{HarvestArgs, HarvestMode};
use crate::summary::SummaryCommands;

#[derive(Debug, Parser)]
#[command(name = "churnlens")]
#[command(about = "App-review churn-risk pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Harvest reviews from the source and write them as JSON lines
    Harvest {
        /// Application id on the review source (defaults to `CHURNLENS_APP_ID`)
        #[arg(long)]
        app: Option<String>,
        /// Stop after a number of reviews, or collect a date range
        #[arg(long, value_enum, default_value = "count")]
        mode: HarvestMode,
        /// Number of newest reviews to collect in `count` mode
        #[arg(long, default_value = "200")]
        count: usize,
        /// First day to collect in `date` mode (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Last day to collect in `date` mode, inclusive (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Reviews requested per page
        #[arg(long)]
        page_size: Option<usize>,
        /// Delay between page requests in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,
        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Run one ingestion and summary cycle for a month
    Pipeline {
        /// SQLite store (defaults to `CHURNLENS_STORE_PATH`)
        #[arg(long)]
        store_path: Option<PathBuf>,
        /// Application id on the review source (defaults to `CHURNLENS_APP_ID`)
        #[arg(long)]
        app: Option<String>,
        /// Month to process as YYYY-MM (defaults to the current month)
        #[arg(long)]
        month: Option<String>,
    },
    /// Inspect stored monthly summaries
    Summary {
        #[command(subcommand)]
        command: SummaryCommands,
    },
    /// Store maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Run the pipeline for the current month on a cron schedule until Ctrl-C
    Schedule {
        /// SQLite store (defaults to `CHURNLENS_STORE_PATH`)
        #[arg(long)]
        store_path: Option<PathBuf>,
        /// Application id on the review source (defaults to `CHURNLENS_APP_ID`)
        #[arg(long)]
        app: Option<String>,
        /// Six-field cron expression (sec min hour day month weekday)
        #[arg(long, default_value = schedule::DEFAULT_CRON)]
        cron: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = churnlens_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Harvest {
            app,
            mode,
            count,
            start,
            end,
            page_size,
            delay_ms,
            out,
        }) => {
            let args = HarvestArgs {
                app,
                mode,
                count,
                start,
                end,
                page_size,
                delay_ms,
                out,
            };
            harvest::run_harvest(&config, args).await?;
        }
        Some(Commands::Pipeline {
            store_path,
            app,
            month,
        }) => {
            pipeline::run_pipeline(&config, store_path.as_deref(), app, month.as_deref()).await?;
        }
        Some(Commands::Summary { command }) => summary::run(&config, command).await?,
        Some(Commands::Db { command }) => db::run(&config, command).await?,
        Some(Commands::Schedule {
            store_path,
            app,
            cron,
        }) => {
            schedule::run_schedule(&config, store_path.as_deref(), app, &cron).await?;
        }
        None => Cli::command().print_help()?,
    }

    Ok(())
}

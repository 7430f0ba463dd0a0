//! `schedule`: recurring pipeline cycles.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use churnlens_core::{AppConfig, MonthWindow};
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;

use crate::wiring::{build_orchestrator, open_store, resolve_app_id};

/// Mondays at 03:00 UTC.
pub(crate) const DEFAULT_CRON: &str = "0 0 3 * * MON";

/// Registers a cycle for the current month on `cron` and runs until Ctrl-C.
///
/// A failed cycle is logged and the schedule keeps running; the run ledger
/// records the failing stage.
///
/// # Errors
///
/// Returns an error if the store cannot be opened, the orchestrator cannot be
/// built, the cron expression is invalid, or the scheduler fails to start.
pub(crate) async fn run_schedule(
    config: &AppConfig,
    store_path: Option<&Path>,
    app: Option<String>,
    cron: &str,
) -> anyhow::Result<()> {
    let app_id = resolve_app_id(app, config)?;
    let pool = open_store(config, store_path).await?;
    let orchestrator = Arc::new(build_orchestrator(pool, config)?);
    let cancel = CancellationToken::new();

    let mut scheduler = JobScheduler::new().await?;
    let job_cancel = cancel.clone();
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let orchestrator = Arc::clone(&orchestrator);
        let app_id = app_id.clone();
        let cancel = job_cancel.clone();

        Box::pin(async move {
            let window = MonthWindow::containing(Utc::now().date_naive());
            tracing::info!(%window, app_id = %app_id, "scheduler: starting pipeline cycle");
            match orchestrator
                .run_cycle(&app_id, window, "schedule", &cancel)
                .await
            {
                Ok(report) => tracing::info!(
                    run_id = report.run_id,
                    persisted = report.persisted,
                    risk_score = report.card.risk_score,
                    "scheduler: pipeline cycle complete"
                ),
                Err(e) => tracing::error!(
                    stage = %e.stage(),
                    error = %e,
                    "scheduler: pipeline cycle failed"
                ),
            }
        })
    })?;
    scheduler.add(job).await?;
    scheduler.start().await?;
    tracing::info!(cron, "scheduler running; press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    tracing::info!("received shutdown signal, stopping scheduler");
    cancel.cancel();
    scheduler.shutdown().await?;
    Ok(())
}

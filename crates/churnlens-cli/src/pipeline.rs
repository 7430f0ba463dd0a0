//! `pipeline`: one cycle for one month.

use std::path::Path;

use churnlens_core::AppConfig;
use churnlens_pipeline::CycleReport;
use tokio_util::sync::CancellationToken;

use crate::summary::print_card;
use crate::wiring::{build_orchestrator, cancel_on_ctrl_c, open_store, resolve_app_id, resolve_window};

/// Runs one cycle and prints its per-stage counts and the resulting card.
///
/// # Errors
///
/// Returns an error if the store cannot be opened, a collaborator URL is
/// missing, or any stage of the cycle fails.
pub(crate) async fn run_pipeline(
    config: &AppConfig,
    store_path: Option<&Path>,
    app: Option<String>,
    month: Option<&str>,
) -> anyhow::Result<()> {
    let app_id = resolve_app_id(app, config)?;
    let window = resolve_window(month)?;
    let pool = open_store(config, store_path).await?;
    let orchestrator = build_orchestrator(pool, config)?;

    let cancel = CancellationToken::new();
    let interrupt = cancel_on_ctrl_c(cancel.clone());
    let result = orchestrator.run_cycle(&app_id, window, "cli", &cancel).await;
    interrupt.abort();

    let report = result?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &CycleReport) {
    let path: Vec<&str> = report.states.iter().map(|s| s.as_str()).collect();
    println!("run          {}", report.run_id);
    println!("month        {}", report.month);
    println!("states       {}", path.join(" -> "));
    println!("live         {}", report.live);
    println!("stored       {}", report.stored_before);
    println!("new          {}", report.new_reviews);
    println!("persisted    {}", report.persisted);
    println!();
    print_card(&report.card);
}

//! Builds stores, sources and collaborators from [`AppConfig`].

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use churnlens_core::{AppConfig, MonthWindow};
use churnlens_db::{PoolConfig, SqlitePool};
use churnlens_enrich::{
    CollaboratorClient, EnrichConfig, EnrichmentStage, HttpClassifier, HttpKeywordExtractor,
};
use churnlens_harvester::{HarvestConfig, HttpReviewSource, ReviewHarvester};
use churnlens_pipeline::PipelineOrchestrator;
use churnlens_risk::{HttpNarrator, MonthlyRiskSummarizer, RiskConfig};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Opens the store at `store_path` (or the configured path) without
/// touching its schema.
pub(crate) async fn connect(
    config: &AppConfig,
    store_path: Option<&Path>,
) -> anyhow::Result<SqlitePool> {
    let path = store_path.unwrap_or(&config.store_path);
    let pool = churnlens_db::connect_store(path, PoolConfig::from_app_config(config)).await?;
    Ok(pool)
}

/// Opens the store and brings its schema up to date.
pub(crate) async fn open_store(
    config: &AppConfig,
    store_path: Option<&Path>,
) -> anyhow::Result<SqlitePool> {
    let pool = connect(config, store_path).await?;
    let applied = churnlens_db::run_migrations(&pool).await?;
    if applied > 0 {
        tracing::info!(applied, "store migrations applied");
    }
    Ok(pool)
}

pub(crate) fn resolve_app_id(app: Option<String>, config: &AppConfig) -> anyhow::Result<String> {
    app.or_else(|| config.app_id.clone())
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("no app id given; pass --app or set CHURNLENS_APP_ID"))
}

/// `YYYY-MM` to a window; the current UTC month when absent.
pub(crate) fn resolve_window(month: Option<&str>) -> anyhow::Result<MonthWindow> {
    match month {
        Some(key) => Ok(MonthWindow::from_key(key)?),
        None => Ok(MonthWindow::containing(Utc::now().date_naive())),
    }
}

pub(crate) fn build_source(config: &AppConfig) -> anyhow::Result<HttpReviewSource> {
    Ok(HttpReviewSource::new(
        &config.source_base_url,
        config.source_request_timeout_secs,
        &config.source_user_agent,
    )?)
}

fn collaborator(
    config: &AppConfig,
    url: Option<&str>,
    var: &str,
) -> anyhow::Result<CollaboratorClient> {
    let url = url.ok_or_else(|| anyhow::anyhow!("{var} is not set"))?;
    Ok(CollaboratorClient::new(
        url,
        config.collaborator_api_key.clone(),
        config.collaborator_timeout_secs,
        config.collaborator_max_retries,
    )?)
}

pub(crate) fn build_orchestrator(
    pool: SqlitePool,
    config: &AppConfig,
) -> anyhow::Result<PipelineOrchestrator<HttpReviewSource>> {
    let harvester = ReviewHarvester::new(build_source(config)?, HarvestConfig::from_app_config(config));

    let classifier = HttpClassifier::new(collaborator(
        config,
        config.classifier_url.as_deref(),
        "CHURNLENS_CLASSIFIER_URL",
    )?);
    let extractor = HttpKeywordExtractor::new(collaborator(
        config,
        config.keyword_url.as_deref(),
        "CHURNLENS_KEYWORD_URL",
    )?);
    let narrator = HttpNarrator::new(collaborator(
        config,
        config.narrator_url.as_deref(),
        "CHURNLENS_NARRATOR_URL",
    )?);

    let enrichment = EnrichmentStage::new(
        Arc::new(classifier),
        Arc::new(extractor),
        EnrichConfig::from_app_config(config),
    );
    let summarizer = MonthlyRiskSummarizer::new(Arc::new(narrator), RiskConfig::from_app_config(config));

    Ok(PipelineOrchestrator::new(
        pool,
        harvester,
        enrichment,
        summarizer,
        Duration::from_secs(config.stage_timeout_secs),
    ))
}

/// Cancels `cancel` on the first Ctrl-C. Abort the handle once the guarded
/// work is finished.
pub(crate) fn cancel_on_ctrl_c(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; cancelling");
            cancel.cancel();
        }
    })
}

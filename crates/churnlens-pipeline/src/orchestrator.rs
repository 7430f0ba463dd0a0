//! The monthly cycle state machine.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use churnlens_core::{MonthWindow, SummaryCard};
use churnlens_db::SqlitePool;
use churnlens_enrich::EnrichmentStage;
use churnlens_harvester::{ReviewHarvester, ReviewSource};
use churnlens_risk::MonthlyRiskSummarizer;
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;
use crate::state::{CycleReport, CycleState};

/// Drives one review source through freshness check, harvest, enrichment,
/// persistence and summary for a month.
pub struct PipelineOrchestrator<S> {
    pool: SqlitePool,
    harvester: ReviewHarvester<S>,
    enrichment: EnrichmentStage,
    summarizer: MonthlyRiskSummarizer,
    stage_timeout: Duration,
}

impl<S: ReviewSource> PipelineOrchestrator<S> {
    pub fn new(
        pool: SqlitePool,
        harvester: ReviewHarvester<S>,
        enrichment: EnrichmentStage,
        summarizer: MonthlyRiskSummarizer,
        stage_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            harvester,
            enrichment,
            summarizer,
            stage_timeout,
        }
    }

    /// Runs one cycle for `window`, recording it in the run ledger.
    ///
    /// # Errors
    ///
    /// Returns the first stage failure. The ledger row is marked failed with
    /// that stage on a best-effort basis; nothing from a failed harvest or
    /// enrichment is ever written to the store.
    pub async fn run_cycle(
        &self,
        app_id: &str,
        window: MonthWindow,
        trigger_source: &str,
        cancel: &CancellationToken,
    ) -> Result<CycleReport, PipelineError> {
        let month = window.key();
        let run = churnlens_db::create_pipeline_run(
            &self.pool,
            app_id,
            month.as_str(),
            trigger_source,
        )
        .await
        .map_err(PipelineError::store(CycleState::CheckFreshness))?;

        if let Err(e) = churnlens_db::start_pipeline_run(&self.pool, run.id).await {
            let err = PipelineError::store(CycleState::CheckFreshness)(e);
            self.fail_run_best_effort(run.id, &err).await;
            return Err(err);
        }

        tracing::info!(run_id = run.id, app_id, month = %month, trigger_source, "cycle started");

        let report = match self.cycle(run.id, app_id, window, cancel).await {
            Ok(report) => report,
            Err(err) => {
                tracing::error!(
                    run_id = run.id,
                    state = %CycleState::Failed,
                    stage = %err.stage(),
                    error = %err,
                    "cycle failed"
                );
                self.fail_run_best_effort(run.id, &err).await;
                return Err(err);
            }
        };

        let records = i64::try_from(report.persisted).unwrap_or(i64::MAX);
        if let Err(e) = churnlens_db::complete_pipeline_run(&self.pool, run.id, records).await {
            let err = PipelineError::store(CycleState::Done)(e);
            self.fail_run_best_effort(run.id, &err).await;
            return Err(err);
        }

        tracing::info!(
            run_id = run.id,
            month = %report.month,
            live = report.live,
            stored_before = report.stored_before,
            new_reviews = report.new_reviews,
            persisted = report.persisted,
            risk_score = report.card.risk_score,
            "cycle complete"
        );
        Ok(report)
    }

    async fn cycle(
        &self,
        run_id: i64,
        app_id: &str,
        window: MonthWindow,
        cancel: &CancellationToken,
    ) -> Result<CycleReport, PipelineError> {
        let mut states = vec![CycleState::CheckFreshness];

        let harvested = self
            .bounded(
                CycleState::CheckFreshness,
                self.harvester
                    .collect_by_date(app_id, window.start(), window.end(), cancel),
            )
            .await?
            .map_err(|e| PipelineError::harvest(CycleState::CheckFreshness, e))?;
        let live = harvested.len();
        let stored_before = churnlens_db::count_between(&self.pool, &window)
            .await
            .map_err(PipelineError::store(CycleState::CheckFreshness))?;
        let stored_ids: HashSet<String> = churnlens_db::stored_ids_between(&self.pool, &window)
            .await
            .map_err(PipelineError::store(CycleState::CheckFreshness))?;
        let unseen: Vec<_> = harvested
            .into_iter()
            .filter(|r| !stored_ids.contains(&r.id))
            .collect();
        let new_reviews = unseen.len();

        // A deleted review can mask a new one when only counts are compared.
        if unseen.is_empty() && live == stored_before {
            tracing::info!(run_id, live, stored_before, "store is fresh");
            states.extend([CycleState::Fresh, CycleState::SummarizeOnly]);
            let card = self
                .summarize(CycleState::SummarizeOnly, window, cancel)
                .await?;
            states.push(CycleState::Done);
            return Ok(CycleReport {
                run_id,
                month: window.key(),
                states,
                live,
                stored_before,
                new_reviews: 0,
                persisted: 0,
                card,
            });
        }

        tracing::info!(run_id, live, stored_before, new_reviews, "store is stale");
        states.extend([CycleState::Stale, CycleState::Harvest]);

        states.push(CycleState::Enrich);
        let enriched = if unseen.is_empty() {
            tracing::info!(run_id, "no new reviews; skipping enrichment");
            Vec::new()
        } else {
            self.bounded(CycleState::Enrich, self.enrichment.enrich(unseen, cancel))
                .await?
                .map_err(PipelineError::enrich)?
        };

        states.push(CycleState::Persist);
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled {
                stage: CycleState::Persist,
            });
        }
        let persisted = churnlens_db::append_batch(&self.pool, &enriched)
            .await
            .map_err(PipelineError::store(CycleState::Persist))?;
        tracing::info!(run_id, persisted, "reviews persisted");

        states.push(CycleState::Summarize);
        let card = self
            .summarize(CycleState::Summarize, window, cancel)
            .await?;
        states.push(CycleState::Done);

        Ok(CycleReport {
            run_id,
            month: window.key(),
            states,
            live,
            stored_before,
            new_reviews,
            persisted,
            card,
        })
    }

    /// Builds the card from stored reviews of `window` and the month before
    /// it, then upserts it.
    async fn summarize(
        &self,
        stage: CycleState,
        window: MonthWindow,
        cancel: &CancellationToken,
    ) -> Result<SummaryCard, PipelineError> {
        let current = churnlens_db::fetch_between(&self.pool, &window)
            .await
            .map_err(PipelineError::store(stage))?;
        let previous = churnlens_db::fetch_between(&self.pool, &window.previous())
            .await
            .map_err(PipelineError::store(stage))?;

        let card = tokio::select! {
            () = cancel.cancelled() => return Err(PipelineError::Cancelled { stage }),
            card = self.bounded(stage, self.summarizer.summarize(&window, &current, &previous)) => card?,
        };

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled { stage });
        }
        churnlens_db::write_summary(&self.pool, &card)
            .await
            .map_err(PipelineError::store(stage))?;
        Ok(card)
    }

    async fn bounded<F: Future>(&self, stage: CycleState, fut: F) -> Result<F::Output, PipelineError> {
        tokio::time::timeout(self.stage_timeout, fut)
            .await
            .map_err(|_| PipelineError::Timeout {
                stage,
                secs: self.stage_timeout.as_secs(),
            })
    }

    async fn fail_run_best_effort(&self, run_id: i64, err: &PipelineError) {
        if let Err(mark_err) = churnlens_db::fail_pipeline_run(
            &self.pool,
            run_id,
            err.stage().as_str(),
            &err.to_string(),
        )
        .await
        {
            tracing::error!(
                run_id,
                error = %mark_err,
                "failed to mark pipeline run as failed"
            );
        }
    }
}

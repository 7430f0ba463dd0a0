//! End-to-end cycle tests over an in-memory store with scripted
//! collaborators.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use churnlens_core::{ChurnIntent, MonthWindow, NarrativeVariant, RawReview};
use churnlens_db::SqlitePool;
use churnlens_enrich::{Classifier, EnrichConfig, EnrichError, EnrichmentStage, KeywordExtractor};
use churnlens_harvester::{
    ContinuationToken, HarvestConfig, HarvestError, ReviewHarvester, ReviewPage, ReviewSource,
};
use churnlens_pipeline::{CycleState, PipelineError, PipelineOrchestrator};
use churnlens_risk::{MonthlyRiskSummarizer, Narrator, NarratorError, RiskConfig};
use tokio_util::sync::CancellationToken;

/// Serves its whole feed newest-first as a single page.
#[derive(Clone, Default)]
struct Feed {
    reviews: Arc<Mutex<Vec<RawReview>>>,
    down: Arc<AtomicBool>,
}

impl Feed {
    fn push(&self, review: RawReview) {
        self.reviews.lock().unwrap().push(review);
    }
}

#[async_trait]
impl ReviewSource for Feed {
    async fn page(
        &self,
        _app_id: &str,
        _page_size: usize,
        _cursor: Option<&ContinuationToken>,
    ) -> Result<ReviewPage, HarvestError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(HarvestError::Source("feed offline".to_owned()));
        }
        let mut items = self.reviews.lock().unwrap().clone();
        items.sort_by(|a, b| b.at.cmp(&a.at));
        Ok(ReviewPage { items, next: None })
    }
}

/// "quit" → confirmed, "slow" → complaint, anything else → none.
struct RuleClassifier;

#[async_trait]
impl Classifier for RuleClassifier {
    async fn classify(&self, texts: &[String]) -> Result<Vec<i64>, EnrichError> {
        Ok(texts
            .iter()
            .map(|t| {
                if t.contains("quit") {
                    2
                } else if t.contains("slow") {
                    1
                } else {
                    0
                }
            })
            .collect())
    }
}

struct HangingClassifier;

#[async_trait]
impl Classifier for HangingClassifier {
    async fn classify(&self, _texts: &[String]) -> Result<Vec<i64>, EnrichError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Vec::new())
    }
}

/// The last word of each text is its only keyword.
struct LastWordExtractor;

#[async_trait]
impl KeywordExtractor for LastWordExtractor {
    async fn extract(&self, texts: &[String]) -> Result<Vec<Vec<String>>, EnrichError> {
        Ok(texts
            .iter()
            .map(|t| t.split_whitespace().last().map(str::to_owned).into_iter().collect())
            .collect())
    }
}

struct BrokenExtractor;

#[async_trait]
impl KeywordExtractor for BrokenExtractor {
    async fn extract(&self, _texts: &[String]) -> Result<Vec<Vec<String>>, EnrichError> {
        Err(EnrichError::Collaborator("keyword service crashed".to_owned()))
    }
}

struct CannedNarrator;

#[async_trait]
impl Narrator for CannedNarrator {
    async fn narrate(&self, _prompt: &str) -> Result<String, NarratorError> {
        Ok("first issue, second issue".to_owned())
    }
}

struct HangingNarrator;

#[async_trait]
impl Narrator for HangingNarrator {
    async fn narrate(&self, _prompt: &str) -> Result<String, NarratorError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(String::new())
    }
}

fn review(id: &str, text: &str, y: i32, m: u32, d: u32) -> RawReview {
    RawReview {
        id: id.to_owned(),
        author: "reviewer".to_owned(),
        text: text.to_owned(),
        rating: 2,
        thumbs_up: 1,
        at: NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap(),
    }
}

/// 3 confirmed, 2 complaint and 5 satisfied January reviews, plus one
/// review on each side of the month.
fn january_feed() -> Feed {
    let feed = Feed::default();
    for i in 0..3 {
        feed.push(review(&format!("c{i}"), "I quit because of the refund", 2026, 1, 3 + i));
    }
    for i in 0..2 {
        feed.push(review(&format!("p{i}"), "too slow at checkout", 2026, 1, 10 + i));
    }
    for i in 0..5 {
        feed.push(review(&format!("n{i}"), "great fast delivery", 2026, 1, 15 + i));
    }
    feed.push(review("dec", "I quit because of the refund", 2025, 12, 31));
    feed.push(review("feb", "too slow at checkout", 2026, 2, 1));
    feed
}

fn january() -> MonthWindow {
    MonthWindow::from_key("2026-01").unwrap()
}

async fn store() -> SqlitePool {
    let pool = churnlens_db::connect_memory().await.unwrap();
    churnlens_db::run_migrations(&pool).await.unwrap();
    pool
}

fn orchestrator_with(
    pool: &SqlitePool,
    feed: &Feed,
    classifier: Arc<dyn Classifier>,
    extractor: Arc<dyn KeywordExtractor>,
    stage_timeout: Duration,
) -> PipelineOrchestrator<Feed> {
    orchestrator_narrated(
        pool,
        feed,
        classifier,
        extractor,
        Arc::new(CannedNarrator),
        stage_timeout,
    )
}

fn orchestrator_narrated(
    pool: &SqlitePool,
    feed: &Feed,
    classifier: Arc<dyn Classifier>,
    extractor: Arc<dyn KeywordExtractor>,
    narrator: Arc<dyn Narrator>,
    stage_timeout: Duration,
) -> PipelineOrchestrator<Feed> {
    let harvester = ReviewHarvester::new(
        feed.clone(),
        HarvestConfig {
            page_size: 100,
            inter_request_delay_ms: 0,
            max_pages: 10,
        },
    );
    PipelineOrchestrator::new(
        pool.clone(),
        harvester,
        EnrichmentStage::new(classifier, extractor, EnrichConfig::default()),
        MonthlyRiskSummarizer::new(narrator, RiskConfig::default()),
        stage_timeout,
    )
}

fn orchestrator(pool: &SqlitePool, feed: &Feed) -> PipelineOrchestrator<Feed> {
    orchestrator_with(
        pool,
        feed,
        Arc::new(RuleClassifier),
        Arc::new(LastWordExtractor),
        Duration::from_secs(30),
    )
}

#[tokio::test]
async fn stale_cycle_persists_and_summarizes_the_month() {
    let pool = store().await;
    let feed = january_feed();

    let report = orchestrator(&pool, &feed)
        .run_cycle("com.example.app", january(), "test", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        report.states,
        vec![
            CycleState::CheckFreshness,
            CycleState::Stale,
            CycleState::Harvest,
            CycleState::Enrich,
            CycleState::Persist,
            CycleState::Summarize,
            CycleState::Done,
        ]
    );
    assert_eq!(report.live, 10);
    assert_eq!(report.stored_before, 0);
    assert_eq!(report.persisted, 10);

    let card = &report.card;
    assert!((card.risk_score - 40.0).abs() < 1e-9);
    assert_eq!(card.current.confirmed.count, 3);
    assert_eq!(card.current.complaint.count, 2);
    assert_eq!(card.variant, NarrativeVariant::Independent);

    let stored = churnlens_db::fetch_between(&pool, &january()).await.unwrap();
    let labels: HashMap<&str, ChurnIntent> =
        stored.iter().map(|r| (r.id.as_str(), r.intent)).collect();
    for section in card.sections() {
        for id in &section.reason_id {
            assert_eq!(labels.get(id.as_str()), Some(&section.class), "{id}");
        }
    }

    let saved = churnlens_db::get_summary(&pool, &card.month)
        .await
        .unwrap()
        .unwrap();
    assert!(saved.same_figures(card));

    let run = churnlens_db::get_pipeline_run(&pool, report.run_id)
        .await
        .unwrap();
    assert_eq!(run.status, "succeeded");
    assert_eq!(run.records_processed, 10);
}

#[tokio::test]
async fn stored_rows_stay_inside_their_month() {
    let pool = store().await;
    let feed = january_feed();

    orchestrator(&pool, &feed)
        .run_cycle("app", january(), "test", &CancellationToken::new())
        .await
        .unwrap();

    let window = january();
    for review in churnlens_db::fetch_between(&pool, &window).await.unwrap() {
        assert!(window.contains(review.at), "{} at {}", review.id, review.at);
    }
    assert_eq!(
        churnlens_db::count_between(&pool, &window.previous()).await.unwrap(),
        0
    );
    assert_eq!(
        churnlens_db::count_between(&pool, &window.next()).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn second_cycle_without_new_reviews_is_fresh_and_idempotent() {
    let pool = store().await;
    let feed = january_feed();
    let orchestrator = orchestrator(&pool, &feed);
    let cancel = CancellationToken::new();

    let first = orchestrator
        .run_cycle("app", january(), "test", &cancel)
        .await
        .unwrap();
    let second = orchestrator
        .run_cycle("app", january(), "test", &cancel)
        .await
        .unwrap();

    assert!(second.was_fresh());
    assert_eq!(
        second.states,
        vec![
            CycleState::CheckFreshness,
            CycleState::Fresh,
            CycleState::SummarizeOnly,
            CycleState::Done,
        ]
    );
    assert_eq!(second.persisted, 0);
    assert_eq!(churnlens_db::count_between(&pool, &january()).await.unwrap(), 10);
    assert!(second.card.same_figures(&first.card));
    assert_eq!(churnlens_db::list_summaries(&pool, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn only_unseen_reviews_are_enriched_and_appended() {
    let pool = store().await;
    let feed = january_feed();
    let orchestrator = orchestrator(&pool, &feed);
    let cancel = CancellationToken::new();

    orchestrator
        .run_cycle("app", january(), "test", &cancel)
        .await
        .unwrap();
    feed.push(review("late", "I quit because of the refund", 2026, 1, 30));
    let report = orchestrator
        .run_cycle("app", january(), "test", &cancel)
        .await
        .unwrap();

    assert!(!report.was_fresh());
    assert_eq!(report.stored_before, 10);
    assert_eq!(report.new_reviews, 1);
    assert_eq!(report.persisted, 1);
    assert_eq!(report.card.current.confirmed.count, 4);
    assert_eq!(churnlens_db::count_between(&pool, &january()).await.unwrap(), 11);
}

#[tokio::test]
async fn replaced_review_with_equal_count_is_still_ingested() {
    let pool = store().await;
    let feed = january_feed();
    let orchestrator = orchestrator(&pool, &feed);
    let cancel = CancellationToken::new();

    orchestrator
        .run_cycle("app", january(), "test", &cancel)
        .await
        .unwrap();
    feed.reviews.lock().unwrap().retain(|r| r.id != "n0");
    feed.push(review("late", "I quit because of the refund", 2026, 1, 30));
    let report = orchestrator
        .run_cycle("app", january(), "test", &cancel)
        .await
        .unwrap();

    assert_eq!(report.live, 10);
    assert_eq!(report.stored_before, 10);
    assert!(!report.was_fresh());
    assert_eq!(report.new_reviews, 1);
    assert_eq!(report.persisted, 1);
    assert_eq!(report.card.current.confirmed.count, 4);
    let ids = churnlens_db::stored_ids_between(&pool, &january()).await.unwrap();
    assert!(ids.contains("late"));
    assert!(ids.contains("n0"), "stored rows are never deleted");
}

#[tokio::test]
async fn card_compares_against_the_stored_previous_month() {
    let pool = store().await;
    let feed = january_feed();
    let orchestrator = orchestrator(&pool, &feed);
    let cancel = CancellationToken::new();

    orchestrator
        .run_cycle("app", january().previous(), "test", &cancel)
        .await
        .unwrap();
    let report = orchestrator
        .run_cycle("app", january(), "test", &cancel)
        .await
        .unwrap();

    assert_eq!(report.card.previous.total, 1);
    assert_eq!(report.card.deltas.total, 9);
    assert!((report.card.deltas.confirmed - -70.0).abs() < 1e-9);
}

#[tokio::test]
async fn source_failure_commits_nothing_and_marks_the_run() {
    let pool = store().await;
    let feed = january_feed();
    feed.down.store(true, Ordering::SeqCst);

    let err = orchestrator(&pool, &feed)
        .run_cycle("app", january(), "test", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::SourceUnavailable { .. }));
    assert_eq!(err.stage(), CycleState::CheckFreshness);
    assert_eq!(churnlens_db::count_between(&pool, &january()).await.unwrap(), 0);
    assert!(churnlens_db::get_summary(&pool, &january().key())
        .await
        .unwrap()
        .is_none());

    let runs = churnlens_db::list_pipeline_runs(&pool, 5).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, "failed");
    assert_eq!(runs[0].failed_stage.as_deref(), Some("check_freshness"));
}

#[tokio::test]
async fn enrichment_failure_commits_nothing() {
    let pool = store().await;
    let feed = january_feed();

    let err = orchestrator_with(
        &pool,
        &feed,
        Arc::new(RuleClassifier),
        Arc::new(BrokenExtractor),
        Duration::from_secs(30),
    )
    .run_cycle("app", january(), "test", &CancellationToken::new())
    .await
    .unwrap_err();

    assert!(matches!(err, PipelineError::EnrichmentFailure(_)));
    assert_eq!(churnlens_db::count_between(&pool, &january()).await.unwrap(), 0);
    let runs = churnlens_db::list_pipeline_runs(&pool, 5).await.unwrap();
    assert_eq!(runs[0].failed_stage.as_deref(), Some("enrich"));
}

#[tokio::test]
async fn slow_enrichment_times_out_without_commit() {
    let pool = store().await;
    let feed = january_feed();

    let err = orchestrator_with(
        &pool,
        &feed,
        Arc::new(HangingClassifier),
        Arc::new(LastWordExtractor),
        Duration::from_millis(50),
    )
    .run_cycle("app", january(), "test", &CancellationToken::new())
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Timeout {
            stage: CycleState::Enrich,
            ..
        }
    ));
    assert_eq!(churnlens_db::count_between(&pool, &january()).await.unwrap(), 0);
}

#[tokio::test]
async fn cancelled_cycle_commits_nothing() {
    let pool = store().await;
    let feed = january_feed();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = orchestrator(&pool, &feed)
        .run_cycle("app", january(), "test", &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Cancelled { .. }));
    assert_eq!(churnlens_db::count_between(&pool, &january()).await.unwrap(), 0);
    assert!(churnlens_db::get_summary(&pool, &january().key())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn cancellation_during_enrichment_commits_nothing() {
    let pool = store().await;
    let feed = january_feed();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        trigger.cancel();
    });

    let err = orchestrator_with(
        &pool,
        &feed,
        Arc::new(HangingClassifier),
        Arc::new(LastWordExtractor),
        Duration::from_secs(30),
    )
    .run_cycle("app", january(), "test", &cancel)
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Cancelled {
            stage: CycleState::Enrich
        }
    ));
    assert_eq!(churnlens_db::count_between(&pool, &january()).await.unwrap(), 0);
}

#[tokio::test]
async fn hung_narrator_times_out_without_writing_a_card() {
    let pool = store().await;
    let feed = january_feed();

    let err = orchestrator_narrated(
        &pool,
        &feed,
        Arc::new(RuleClassifier),
        Arc::new(LastWordExtractor),
        Arc::new(HangingNarrator),
        Duration::from_millis(50),
    )
    .run_cycle("app", january(), "test", &CancellationToken::new())
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Timeout {
            stage: CycleState::Summarize,
            ..
        }
    ));
    assert!(churnlens_db::get_summary(&pool, &january().key())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn cancellation_during_summary_stops_the_narrator() {
    let pool = store().await;
    let feed = january_feed();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let err = orchestrator_narrated(
        &pool,
        &feed,
        Arc::new(RuleClassifier),
        Arc::new(LastWordExtractor),
        Arc::new(HangingNarrator),
        Duration::from_secs(30),
    )
    .run_cycle("app", january(), "test", &cancel)
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Cancelled {
            stage: CycleState::Summarize
        }
    ));
    assert!(churnlens_db::get_summary(&pool, &january().key())
        .await
        .unwrap()
        .is_none());
}

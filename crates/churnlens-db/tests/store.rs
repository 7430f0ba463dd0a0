//! Integration tests for the SQLite store.
//!
//! Every test migrates a fresh in-memory database, except the file-backed
//! one which uses a temporary directory.

use chrono::{NaiveDate, TimeZone, Utc};
use churnlens_core::{
    ChurnIntent, ClassBreakdown, ClassDeltas, ClassStats, KeywordShare, MonthWindow,
    NarrativeSection, NarrativeVariant, RawReview, Review, SummaryCard, TopKeywords,
};
use churnlens_db::{
    append_batch, complete_pipeline_run, connect_memory, connect_store, count_between,
    create_pipeline_run, fail_pipeline_run, fetch_between, get_pipeline_run, get_summary,
    list_pipeline_runs, list_summaries, run_migrations, start_pipeline_run, stored_ids_between,
    write_summary, DbError, PoolConfig, SqlitePool,
};

async fn store() -> SqlitePool {
    let pool = connect_memory().await.expect("in-memory store");
    run_migrations(&pool).await.expect("migrations");
    pool
}

fn review(id: &str, y: i32, m: u32, d: u32, hms: (u32, u32, u32), intent: ChurnIntent) -> Review {
    RawReview {
        id: id.to_string(),
        author: "Jin".to_string(),
        text: format!("text of {id}"),
        rating: 2,
        thumbs_up: 4,
        at: NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(hms.0, hms.1, hms.2)
            .unwrap(),
    }
    .enrich(intent, vec!["delivery".to_string(), "refund".to_string()])
}

fn january() -> MonthWindow {
    MonthWindow::from_key("2026-01").unwrap()
}

fn card(window: &MonthWindow, risk_score: f64) -> SummaryCard {
    let stats = ClassStats {
        count: 1,
        ratio: 50.0,
    };
    SummaryCard {
        month: window.key(),
        risk_score,
        current: ClassBreakdown {
            total: 2,
            none: stats,
            complaint: ClassStats::default(),
            confirmed: stats,
        },
        previous: ClassBreakdown::default(),
        deltas: ClassDeltas {
            total: 2,
            none: 50.0,
            complaint: 0.0,
            confirmed: 50.0,
        },
        top_keywords: TopKeywords {
            confirmed: vec![KeywordShare {
                keyword: "refund".to_string(),
                count: 1,
                share: 100.0,
            }],
            ..TopKeywords::default()
        },
        variant: NarrativeVariant::NoComplaintStage,
        confirmed: Some(NarrativeSection {
            class: ChurnIntent::Confirmed,
            keyword: Some("refund".to_string()),
            text: "churned users left due to slow refund".to_string(),
            reason_id: vec!["r2".to_string()],
        }),
        complaint: None,
        positive: None,
        generated_at: Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap(),
    }
}

#[tokio::test]
async fn append_batch_round_trips_reviews() {
    let pool = store().await;
    let original = review("r1", 2026, 1, 14, (8, 12, 55), ChurnIntent::Complaint);

    let inserted = append_batch(&pool, std::slice::from_ref(&original))
        .await
        .unwrap();
    let stored = fetch_between(&pool, &january()).await.unwrap();

    assert_eq!(inserted, 1);
    assert_eq!(stored, vec![original]);
}

#[tokio::test]
async fn append_batch_never_duplicates_or_mutates() {
    let pool = store().await;
    let first = review("r1", 2026, 1, 3, (9, 0, 0), ChurnIntent::None);
    append_batch(&pool, &[first.clone()]).await.unwrap();

    let mut relabelled = first.clone();
    relabelled.intent = ChurnIntent::Confirmed;
    let second = review("r2", 2026, 1, 4, (9, 0, 0), ChurnIntent::None);
    let inserted = append_batch(&pool, &[relabelled, second]).await.unwrap();

    assert_eq!(inserted, 1);
    assert_eq!(count_between(&pool, &january()).await.unwrap(), 2);
    let stored = fetch_between(&pool, &january()).await.unwrap();
    let r1 = stored.iter().find(|r| r.id == "r1").unwrap();
    assert_eq!(r1.intent, ChurnIntent::None);
}

#[tokio::test]
async fn failed_batch_commits_nothing() {
    let pool = store().await;
    let good = review("good", 2026, 1, 5, (0, 0, 0), ChurnIntent::None);
    let mut bad = review("bad", 2026, 1, 6, (0, 0, 0), ChurnIntent::None);
    // Violates the score CHECK constraint.
    bad.rating = 9;

    let result = append_batch(&pool, &[good, bad]).await;

    assert!(matches!(result, Err(DbError::Sqlx(_))));
    assert_eq!(count_between(&pool, &january()).await.unwrap(), 0);
}

#[tokio::test]
async fn window_queries_are_date_inclusive() {
    let pool = store().await;
    let batch = [
        review("dec-last", 2025, 12, 31, (23, 59, 59), ChurnIntent::None),
        review("jan-first", 2026, 1, 1, (0, 0, 0), ChurnIntent::None),
        review("jan-last", 2026, 1, 31, (23, 59, 59), ChurnIntent::Complaint),
        review("feb-first", 2026, 2, 1, (0, 0, 0), ChurnIntent::Confirmed),
    ];
    append_batch(&pool, &batch).await.unwrap();

    let window = january();
    let ids = stored_ids_between(&pool, &window).await.unwrap();

    assert_eq!(count_between(&pool, &window).await.unwrap(), 2);
    assert!(ids.contains("jan-first"));
    assert!(ids.contains("jan-last"));
    assert_eq!(count_between(&pool, &window.previous()).await.unwrap(), 1);
    assert_eq!(count_between(&pool, &window.next()).await.unwrap(), 1);
}

#[tokio::test]
async fn stored_rows_fall_inside_their_window() {
    let pool = store().await;
    let batch: Vec<Review> = (1..=28)
        .map(|d| review(&format!("r{d}"), 2026, 2, d, (12, 0, 0), ChurnIntent::None))
        .collect();
    append_batch(&pool, &batch).await.unwrap();

    let window = MonthWindow::from_key("2026-02").unwrap();
    let stored = fetch_between(&pool, &window).await.unwrap();

    assert_eq!(stored.len(), 28);
    assert!(stored.iter().all(|r| window.contains(r.at)));
    assert!(stored.windows(2).all(|w| w[0].at >= w[1].at), "newest first");
}

#[tokio::test]
async fn write_summary_replaces_previous_card() {
    let pool = store().await;
    let window = january();

    write_summary(&pool, &card(&window, 10.0)).await.unwrap();
    write_summary(&pool, &card(&window, 42.5)).await.unwrap();

    let stored = get_summary(&pool, &window.key()).await.unwrap().unwrap();
    assert_eq!(stored, card(&window, 42.5));
    assert_eq!(list_summaries(&pool, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn get_summary_for_unknown_month_is_none() {
    let pool = store().await;
    let missing = get_summary(&pool, &january().key()).await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn list_summaries_is_newest_month_first() {
    let pool = store().await;
    let jan = january();
    write_summary(&pool, &card(&jan.previous(), 1.0)).await.unwrap();
    write_summary(&pool, &card(&jan, 2.0)).await.unwrap();

    let cards = list_summaries(&pool, 10).await.unwrap();
    let months: Vec<&str> = cards.iter().map(|c| c.month.as_str()).collect();

    assert_eq!(months, vec!["2026-01", "2025-12"]);
}

#[tokio::test]
async fn pipeline_run_lifecycle() {
    let pool = store().await;

    let run = create_pipeline_run(&pool, "com.example.eats", "2026-01", "cli")
        .await
        .unwrap();
    assert_eq!(run.status, "queued");

    start_pipeline_run(&pool, run.id).await.unwrap();
    complete_pipeline_run(&pool, run.id, 12).await.unwrap();

    let done = get_pipeline_run(&pool, run.id).await.unwrap();
    assert_eq!(done.status, "succeeded");
    assert_eq!(done.records_processed, 12);
    assert!(done.started_at.is_some());
    assert!(done.completed_at.is_some());
    assert_eq!(done.public_id, run.public_id);
}

#[tokio::test]
async fn failed_run_records_stage() {
    let pool = store().await;
    let run = create_pipeline_run(&pool, "app", "2026-01", "scheduler")
        .await
        .unwrap();
    start_pipeline_run(&pool, run.id).await.unwrap();

    fail_pipeline_run(&pool, run.id, "enrich", "classifier returned 2 labels for 3 texts")
        .await
        .unwrap();

    let failed = get_pipeline_run(&pool, run.id).await.unwrap();
    assert_eq!(failed.status, "failed");
    assert_eq!(failed.failed_stage.as_deref(), Some("enrich"));
}

#[tokio::test]
async fn run_transitions_are_guarded() {
    let pool = store().await;
    let run = create_pipeline_run(&pool, "app", "2026-01", "cli").await.unwrap();

    let early_complete = complete_pipeline_run(&pool, run.id, 0).await;
    assert!(matches!(
        early_complete,
        Err(DbError::InvalidRunTransition {
            expected_status: "running",
            ..
        })
    ));

    start_pipeline_run(&pool, run.id).await.unwrap();
    let restart = start_pipeline_run(&pool, run.id).await;
    assert!(matches!(
        restart,
        Err(DbError::InvalidRunTransition {
            expected_status: "queued",
            ..
        })
    ));
}

#[tokio::test]
async fn list_pipeline_runs_is_newest_first() {
    let pool = store().await;
    let first = create_pipeline_run(&pool, "app", "2025-12", "cli").await.unwrap();
    let second = create_pipeline_run(&pool, "app", "2026-01", "cli").await.unwrap();

    let runs = list_pipeline_runs(&pool, 10).await.unwrap();
    let ids: Vec<i64> = runs.iter().map(|r| r.id).collect();

    assert_eq!(ids, vec![second.id, first.id]);
}

#[tokio::test]
async fn get_missing_run_is_not_found() {
    let pool = store().await;
    assert!(matches!(
        get_pipeline_run(&pool, 999).await,
        Err(DbError::NotFound)
    ));
}

#[tokio::test]
async fn file_store_persists_across_connections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("churnlens.db");

    {
        let pool = connect_store(&path, PoolConfig::default()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        append_batch(
            &pool,
            &[review("r1", 2026, 1, 10, (10, 0, 0), ChurnIntent::None)],
        )
        .await
        .unwrap();
        pool.close().await;
    }

    let pool = connect_store(&path, PoolConfig::default()).await.unwrap();
    assert_eq!(run_migrations(&pool).await.unwrap(), 0);
    assert_eq!(count_between(&pool, &january()).await.unwrap(), 1);
}

//! Database operations for the `pipeline_runs` ledger.
//!
//! The ledger records the outcome of each cycle invocation. Freshness is
//! never derived from it; that comes from the `data` table alone.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `pipeline_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PipelineRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub app_id: String,
    pub month_key: String,
    pub trigger_source: String,
    pub status: String,
    /// Stage that failed, for `failed` runs.
    pub failed_stage: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub records_processed: i64,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

const RUN_COLUMNS: &str = "id, public_id, app_id, month_key, trigger_source, status, \
     failed_stage, started_at, completed_at, records_processed, error_message, created_at";

/// Creates a new run in `queued` status and returns the full row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_pipeline_run(
    pool: &SqlitePool,
    app_id: &str,
    month_key: &str,
    trigger_source: &str,
) -> Result<PipelineRunRow, DbError> {
    let row = sqlx::query_as::<_, PipelineRunRow>(&format!(
        "INSERT INTO pipeline_runs \
             (public_id, app_id, month_key, trigger_source, status, created_at) \
         VALUES (?1, ?2, ?3, ?4, 'queued', ?5) \
         RETURNING {RUN_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(app_id)
    .bind(month_key)
    .bind(trigger_source)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Marks a `queued` run as `running` and stamps `started_at`.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `queued`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn start_pipeline_run(pool: &SqlitePool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE pipeline_runs \
         SET status = 'running', started_at = ?1 \
         WHERE id = ?2 AND status = 'queued'",
    )
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "queued",
        });
    }

    Ok(())
}

/// Marks a `running` run as `succeeded` with the number of records it wrote.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `running`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn complete_pipeline_run(
    pool: &SqlitePool,
    id: i64,
    records_processed: i64,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE pipeline_runs \
         SET status = 'succeeded', completed_at = ?1, records_processed = ?2 \
         WHERE id = ?3 AND status = 'running'",
    )
    .bind(Utc::now())
    .bind(records_processed)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Marks a `running` run as `failed`, recording the stage and message.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `running`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn fail_pipeline_run(
    pool: &SqlitePool,
    id: i64,
    failed_stage: &str,
    error_message: &str,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE pipeline_runs \
         SET status = 'failed', completed_at = ?1, failed_stage = ?2, error_message = ?3 \
         WHERE id = ?4 AND status = 'running'",
    )
    .bind(Utc::now())
    .bind(failed_stage)
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Fetches a single run by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_pipeline_run(pool: &SqlitePool, id: i64) -> Result<PipelineRunRow, DbError> {
    sqlx::query_as::<_, PipelineRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM pipeline_runs WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Returns the most recent `limit` runs, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_pipeline_runs(
    pool: &SqlitePool,
    limit: i64,
) -> Result<Vec<PipelineRunRow>, DbError> {
    let rows = sqlx::query_as::<_, PipelineRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM pipeline_runs ORDER BY id DESC LIMIT ?1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

//! Database operations for the `data` table of enriched reviews.

use std::collections::HashSet;

use chrono::{NaiveDateTime, NaiveTime};
use churnlens_core::{ChurnIntent, MonthWindow, Review};
use sqlx::SqlitePool;

use crate::DbError;

/// Storage format of `data.at`. Lexical order matches chronological order.
pub const STORED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A row from the `data` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReviewRow {
    pub review_id: String,
    pub user_name: String,
    pub content: String,
    pub score: i64,
    pub thumbs_up_count: i64,
    pub at: String,
    pub churn_intent_label: i64,
    /// JSON array of strings.
    pub keywords: String,
}

impl TryFrom<ReviewRow> for Review {
    type Error = DbError;

    fn try_from(row: ReviewRow) -> Result<Self, Self::Error> {
        let at = NaiveDateTime::parse_from_str(&row.at, STORED_AT_FORMAT).map_err(|e| {
            DbError::Decode {
                column: "at",
                reason: format!("{:?}: {e}", row.at),
            }
        })?;
        let intent =
            ChurnIntent::from_label(row.churn_intent_label).map_err(|e| DbError::Decode {
                column: "churn_intent_label",
                reason: e.to_string(),
            })?;
        let rating = u8::try_from(row.score).map_err(|e| DbError::Decode {
            column: "score",
            reason: e.to_string(),
        })?;
        let thumbs_up = u32::try_from(row.thumbs_up_count).map_err(|e| DbError::Decode {
            column: "thumbsUpCount",
            reason: e.to_string(),
        })?;
        let keywords: Vec<String> = serde_json::from_str(&row.keywords)?;

        Ok(Review {
            id: row.review_id,
            author: row.user_name,
            text: row.content,
            rating,
            thumbs_up,
            at,
            intent,
            keywords,
        })
    }
}

/// `[start 00:00:00, day-after-end 00:00:00)`, which is the window
/// date-inclusive on both ends.
fn bounds(window: &MonthWindow) -> (String, String) {
    let from = window.start().and_time(NaiveTime::MIN);
    let until = window.next().start().and_time(NaiveTime::MIN);
    (
        from.format(STORED_AT_FORMAT).to_string(),
        until.format(STORED_AT_FORMAT).to_string(),
    )
}

/// Number of stored reviews dated inside `window`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_between(pool: &SqlitePool, window: &MonthWindow) -> Result<usize, DbError> {
    let (from, until) = bounds(window);
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM data WHERE at >= ?1 AND at < ?2")
        .bind(from)
        .bind(until)
        .fetch_one(pool)
        .await?;
    Ok(usize::try_from(count).unwrap_or(0))
}

/// All stored reviews dated inside `window`, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or [`DbError::Decode`] /
/// [`DbError::Json`] if a stored row is malformed.
pub async fn fetch_between(pool: &SqlitePool, window: &MonthWindow) -> Result<Vec<Review>, DbError> {
    let (from, until) = bounds(window);
    let rows = sqlx::query_as::<_, ReviewRow>(
        "SELECT \"reviewId\" AS review_id, \"userName\" AS user_name, content, score, \
                \"thumbsUpCount\" AS thumbs_up_count, at, churn_intent_label, keywords \
         FROM data \
         WHERE at >= ?1 AND at < ?2 \
         ORDER BY at DESC, \"reviewId\"",
    )
    .bind(from)
    .bind(until)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Review::try_from).collect()
}

/// Ids of the stored reviews dated inside `window`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn stored_ids_between(
    pool: &SqlitePool,
    window: &MonthWindow,
) -> Result<HashSet<String>, DbError> {
    let (from, until) = bounds(window);
    let ids = sqlx::query_scalar::<_, String>(
        "SELECT \"reviewId\" FROM data WHERE at >= ?1 AND at < ?2",
    )
    .bind(from)
    .bind(until)
    .fetch_all(pool)
    .await?;
    Ok(ids.into_iter().collect())
}

/// Appends an enriched batch in a single transaction.
///
/// Ids already present are left untouched (`ON CONFLICT DO NOTHING`), so a
/// stored review is never mutated. Any failure rolls the whole batch back.
/// Returns the number of newly inserted rows.
///
/// # Errors
///
/// Returns [`DbError::Json`] if keywords cannot be encoded, or
/// [`DbError::Sqlx`] if any insert or the commit fails.
pub async fn append_batch(pool: &SqlitePool, reviews: &[Review]) -> Result<u64, DbError> {
    if reviews.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    let mut inserted = 0u64;

    for review in reviews {
        let keywords = serde_json::to_string(&review.keywords)?;
        let result = sqlx::query(
            "INSERT INTO data \
                 (\"reviewId\", \"userName\", content, score, \"thumbsUpCount\", at, \
                  churn_intent_label, keywords) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
             ON CONFLICT (\"reviewId\") DO NOTHING",
        )
        .bind(&review.id)
        .bind(&review.author)
        .bind(&review.text)
        .bind(i64::from(review.rating))
        .bind(i64::from(review.thumbs_up))
        .bind(review.at.format(STORED_AT_FORMAT).to_string())
        .bind(i64::from(review.intent.as_label()))
        .bind(keywords)
        .execute(&mut *tx)
        .await?;
        inserted += result.rows_affected();
    }

    tx.commit().await?;

    let skipped = reviews.len() as u64 - inserted;
    if skipped > 0 {
        tracing::debug!(inserted, skipped, "batch contained already-stored ids");
    }
    Ok(inserted)
}

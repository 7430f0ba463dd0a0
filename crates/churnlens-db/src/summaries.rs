//! Database operations for the `summary` table.

use chrono::{DateTime, Utc};
use churnlens_core::{
    ClassBreakdown, ClassDeltas, MonthKey, MonthWindow, NarrativeSection, NarrativeVariant,
    SummaryCard, TopKeywords,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::DbError;

/// A row from the `summary` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SummaryRow {
    pub month_key: String,
    pub risk_score: f64,
    pub summary_confirmed: Option<String>,
    pub summary_complaint: Option<String>,
    pub summary_positive: Option<String>,
    pub variant: i64,
    pub stats: String,
    pub reason_id: String,
    pub generated_at: DateTime<Utc>,
}

/// Shape of the `stats` JSON column.
#[derive(Debug, Serialize, Deserialize)]
struct StoredStats {
    current: ClassBreakdown,
    previous: ClassBreakdown,
    deltas: ClassDeltas,
    top_keywords: TopKeywords,
}

fn section_json(section: Option<&NarrativeSection>) -> Result<Option<String>, DbError> {
    section.map(serde_json::to_string).transpose().map_err(DbError::from)
}

fn section_from_json(raw: Option<&str>) -> Result<Option<NarrativeSection>, DbError> {
    raw.map(serde_json::from_str).transpose().map_err(DbError::from)
}

impl TryFrom<SummaryRow> for SummaryCard {
    type Error = DbError;

    fn try_from(row: SummaryRow) -> Result<Self, Self::Error> {
        let month = MonthWindow::from_key(&row.month_key)
            .map_err(|e| DbError::Decode {
                column: "month_key",
                reason: e.to_string(),
            })?
            .key();
        let variant = NarrativeVariant::from_index(row.variant).ok_or_else(|| DbError::Decode {
            column: "variant",
            reason: format!("unknown variant {}", row.variant),
        })?;
        let stats: StoredStats = serde_json::from_str(&row.stats)?;

        Ok(SummaryCard {
            month,
            risk_score: row.risk_score,
            current: stats.current,
            previous: stats.previous,
            deltas: stats.deltas,
            top_keywords: stats.top_keywords,
            variant,
            confirmed: section_from_json(row.summary_confirmed.as_deref())?,
            complaint: section_from_json(row.summary_complaint.as_deref())?,
            positive: section_from_json(row.summary_positive.as_deref())?,
            generated_at: row.generated_at,
        })
    }
}

const SELECT_SUMMARY: &str = "SELECT month_key, risk_score, summary_confirmed, summary_complaint, \
            summary_positive, variant, stats, reason_id, generated_at \
     FROM summary";

/// Upserts the card for its month, replacing any previous card.
///
/// # Errors
///
/// Returns [`DbError::Json`] if a section cannot be encoded, or
/// [`DbError::Sqlx`] if the upsert fails.
pub async fn write_summary(pool: &SqlitePool, card: &SummaryCard) -> Result<(), DbError> {
    let stats = serde_json::to_string(&StoredStats {
        current: card.current,
        previous: card.previous,
        deltas: card.deltas,
        top_keywords: card.top_keywords.clone(),
    })?;
    let reason_id = serde_json::to_string(&card.reason_id())?;

    sqlx::query(
        "INSERT INTO summary \
             (month_key, risk_score, summary_confirmed, summary_complaint, summary_positive, \
              variant, stats, reason_id, generated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
         ON CONFLICT (month_key) DO UPDATE SET \
             risk_score        = excluded.risk_score, \
             summary_confirmed = excluded.summary_confirmed, \
             summary_complaint = excluded.summary_complaint, \
             summary_positive  = excluded.summary_positive, \
             variant           = excluded.variant, \
             stats             = excluded.stats, \
             reason_id         = excluded.reason_id, \
             generated_at      = excluded.generated_at",
    )
    .bind(card.month.as_str())
    .bind(card.risk_score)
    .bind(section_json(card.confirmed.as_ref())?)
    .bind(section_json(card.complaint.as_ref())?)
    .bind(section_json(card.positive.as_ref())?)
    .bind(i64::from(card.variant.index()))
    .bind(stats)
    .bind(reason_id)
    .bind(card.generated_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// The card stored for `month`, if any.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or a decode error if the
/// stored row is malformed.
pub async fn get_summary(
    pool: &SqlitePool,
    month: &MonthKey,
) -> Result<Option<SummaryCard>, DbError> {
    let row = sqlx::query_as::<_, SummaryRow>(&format!("{SELECT_SUMMARY} WHERE month_key = ?1"))
        .bind(month.as_str())
        .fetch_optional(pool)
        .await?;

    row.map(SummaryCard::try_from).transpose()
}

/// The most recent `limit` cards, newest month first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or a decode error if a
/// stored row is malformed.
pub async fn list_summaries(pool: &SqlitePool, limit: i64) -> Result<Vec<SummaryCard>, DbError> {
    let rows = sqlx::query_as::<_, SummaryRow>(&format!(
        "{SELECT_SUMMARY} ORDER BY month_key DESC LIMIT ?1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(SummaryCard::try_from).collect()
}

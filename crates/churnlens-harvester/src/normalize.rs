//! Normalization from source wire records to [`RawReview`].

use chrono::{DateTime, NaiveDateTime};
use churnlens_core::RawReview;

use crate::types::SourceReview;

/// Display name used when the source omits the author.
pub const ANONYMOUS_AUTHOR: &str = "Anonymous reviewer";

/// Normalizes one source record.
///
/// Returns `None` (the record is dropped) when the id or text is blank, the
/// rating is missing, or the timestamp cannot be parsed. A missing author
/// falls back to [`ANONYMOUS_AUTHOR`]; ratings are clamped to `1..=5` and
/// negative thumbs-up counts to zero.
#[must_use]
pub fn normalize_review(source: SourceReview) -> Option<RawReview> {
    let id = source.review_id.trim().to_string();
    if id.is_empty() {
        return None;
    }

    let text = source
        .content
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())?;

    let Some(at) = parse_timestamp(&source.at) else {
        tracing::warn!(review_id = %id, at = %source.at, "dropping review with unparseable timestamp");
        return None;
    };

    let rating = u8::try_from(source.score?.clamp(1, 5)).ok()?;
    let thumbs_up = u32::try_from(source.thumbs_up_count.unwrap_or(0).max(0)).unwrap_or(u32::MAX);

    let author = source
        .user_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| ANONYMOUS_AUTHOR.to_string());

    Some(RawReview {
        id,
        author,
        text,
        rating,
        thumbs_up,
        at,
    })
}

/// Accepts RFC 3339 (converted to UTC), `YYYY-MM-DDTHH:MM:SS[.f]` and
/// `YYYY-MM-DD HH:MM:SS[.f]`.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

//! Class counts, ratios, deltas, risk score and keyword ranking.

use std::collections::HashMap;

use churnlens_core::{ChurnIntent, ClassBreakdown, ClassDeltas, ClassStats, KeywordShare, Review};

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[allow(clippy::cast_precision_loss)]
fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Per-class counts and ratios (percent of the month, one decimal).
#[must_use]
pub fn class_breakdown(reviews: &[Review]) -> ClassBreakdown {
    let total = reviews.len();
    let stats = |intent: ChurnIntent| {
        let count = reviews.iter().filter(|r| r.intent == intent).count();
        ClassStats {
            count,
            ratio: round_to(percent(count, total), 1),
        }
    };
    ClassBreakdown {
        total,
        none: stats(ChurnIntent::None),
        complaint: stats(ChurnIntent::Complaint),
        confirmed: stats(ChurnIntent::Confirmed),
    }
}

/// Current minus previous: review volume in rows, ratios in percentage points.
#[must_use]
pub fn class_deltas(current: &ClassBreakdown, previous: &ClassBreakdown) -> ClassDeltas {
    let total = i64::try_from(current.total).unwrap_or(i64::MAX)
        - i64::try_from(previous.total).unwrap_or(i64::MAX);
    ClassDeltas {
        total,
        none: round_to(current.none.ratio - previous.none.ratio, 1),
        complaint: round_to(current.complaint.ratio - previous.complaint.ratio, 1),
        confirmed: round_to(current.confirmed.ratio - previous.confirmed.ratio, 1),
    }
}

/// `100 × (w_confirmed × confirmed_fraction + w_complaint × complaint_fraction)`,
/// two decimals. An empty month scores zero.
///
/// Computed from raw counts, not from the rounded ratios.
#[must_use]
pub fn risk_score(breakdown: &ClassBreakdown, weight_confirmed: f64, weight_complaint: f64) -> f64 {
    if breakdown.total == 0 {
        return 0.0;
    }
    let confirmed = percent(breakdown.confirmed.count, breakdown.total);
    let complaint = percent(breakdown.complaint.count, breakdown.total);
    round_to(weight_confirmed * confirmed + weight_complaint * complaint, 2)
}

/// The `n` most frequent keywords of `intent`'s reviews, stopwords excluded.
///
/// Shares are percent of the class's non-stopword keyword occurrences (two
/// decimals). Ties break alphabetically.
#[must_use]
pub fn top_keywords(
    reviews: &[Review],
    intent: ChurnIntent,
    n: usize,
    stopwords: &[String],
) -> Vec<KeywordShare> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut total = 0usize;
    for keyword in reviews
        .iter()
        .filter(|r| r.intent == intent)
        .flat_map(|r| r.keywords.iter())
        .filter(|k| !k.is_empty() && !stopwords.contains(k))
    {
        *counts.entry(keyword.as_str()).or_default() += 1;
        total += 1;
    }

    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(n)
        .map(|(keyword, count)| KeywordShare {
            keyword: keyword.to_owned(),
            count,
            share: round_to(percent(count, total), 2),
        })
        .collect()
}

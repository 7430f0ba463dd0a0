use std::fmt;

use churnlens_core::{MonthKey, SummaryCard};
use serde::Serialize;

/// States a cycle passes through.
///
/// ```text
/// CHECK_FRESHNESS ─┬─ FRESH ─ SUMMARIZE_ONLY ─────────────────────────── DONE
///                  └─ STALE ─ HARVEST ─ ENRICH ─ PERSIST ─ SUMMARIZE ─── DONE
/// ```
///
/// Any stage failure ends the cycle in `FAILED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CycleState {
    CheckFreshness,
    Fresh,
    Stale,
    Harvest,
    Enrich,
    Persist,
    Summarize,
    SummarizeOnly,
    Done,
    Failed,
}

impl CycleState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CheckFreshness => "check_freshness",
            Self::Fresh => "fresh",
            Self::Stale => "stale",
            Self::Harvest => "harvest",
            Self::Enrich => "enrich",
            Self::Persist => "persist",
            Self::Summarize => "summarize",
            Self::SummarizeOnly => "summarize_only",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one successful cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    /// Ledger row id of this invocation.
    pub run_id: i64,
    pub month: MonthKey,
    pub states: Vec<CycleState>,
    /// Reviews the source currently holds for the month.
    pub live: usize,
    /// Reviews the store held for the month before this cycle.
    pub stored_before: usize,
    /// Harvested reviews whose ids were not yet stored.
    pub new_reviews: usize,
    pub persisted: u64,
    pub card: SummaryCard,
}

impl CycleReport {
    #[must_use]
    pub fn was_fresh(&self) -> bool {
        self.states.contains(&CycleState::Fresh)
    }
}

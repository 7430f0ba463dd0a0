//! Monthly summary card shown on the dashboard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::month::MonthKey;
use crate::review::ChurnIntent;

/// Count and share (percent of the month's reviews) of one class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassStats {
    pub count: usize,
    pub ratio: f64,
}

/// Per-class figures for one month.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassBreakdown {
    pub total: usize,
    pub none: ClassStats,
    pub complaint: ClassStats,
    pub confirmed: ClassStats,
}

impl ClassBreakdown {
    #[must_use]
    pub fn get(&self, intent: ChurnIntent) -> ClassStats {
        match intent {
            ChurnIntent::None => self.none,
            ChurnIntent::Complaint => self.complaint,
            ChurnIntent::Confirmed => self.confirmed,
        }
    }
}

/// Month-over-month change: review volume in rows, class ratios in
/// percentage points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassDeltas {
    pub total: i64,
    pub none: f64,
    pub complaint: f64,
    pub confirmed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordShare {
    pub keyword: String,
    pub count: usize,
    /// Percent of the class's (non-stopword) keyword occurrences.
    pub share: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopKeywords {
    pub none: Vec<KeywordShare>,
    pub complaint: Vec<KeywordShare>,
    pub confirmed: Vec<KeywordShare>,
}

/// Which narrative shape was produced, decided by which churn classes are
/// empty and whether their top keywords overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeVariant {
    /// No complaint or confirmed reviews: satisfaction summary.
    PositiveOnly,
    /// Complaints only: complaint-driven churn risk.
    ComplaintDriven,
    /// Confirmed churn only: no complaint-stage reviews to compare against.
    NoComplaintStage,
    /// Both classes share the confirmed top keyword.
    Reinforced,
    /// Both classes present with unrelated top keywords.
    Independent,
}

impl NarrativeVariant {
    #[must_use]
    pub fn index(self) -> u8 {
        match self {
            NarrativeVariant::PositiveOnly => 0,
            NarrativeVariant::ComplaintDriven => 1,
            NarrativeVariant::NoComplaintStage => 2,
            NarrativeVariant::Reinforced => 3,
            NarrativeVariant::Independent => 4,
        }
    }

    #[must_use]
    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(NarrativeVariant::PositiveOnly),
            1 => Some(NarrativeVariant::ComplaintDriven),
            2 => Some(NarrativeVariant::NoComplaintStage),
            3 => Some(NarrativeVariant::Reinforced),
            4 => Some(NarrativeVariant::Independent),
            _ => None,
        }
    }
}

/// Narrative for one class plus the review ids it was written from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeSection {
    pub class: ChurnIntent,
    pub keyword: Option<String>,
    pub text: String,
    pub reason_id: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryCard {
    pub month: MonthKey,
    pub risk_score: f64,
    pub current: ClassBreakdown,
    pub previous: ClassBreakdown,
    pub deltas: ClassDeltas,
    pub top_keywords: TopKeywords,
    pub variant: NarrativeVariant,
    pub confirmed: Option<NarrativeSection>,
    pub complaint: Option<NarrativeSection>,
    pub positive: Option<NarrativeSection>,
    pub generated_at: DateTime<Utc>,
}

impl SummaryCard {
    /// Sections present on this card, confirmed first.
    pub fn sections(&self) -> impl Iterator<Item = &NarrativeSection> {
        [&self.confirmed, &self.complaint, &self.positive]
            .into_iter()
            .flatten()
    }

    /// All evidence ids across sections, first occurrence order, no repeats.
    #[must_use]
    pub fn reason_id(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.sections()
            .flat_map(|s| s.reason_id.iter())
            .filter(|id| seen.insert(*id))
            .cloned()
            .collect()
    }

    /// Narrative paragraphs joined in section order.
    #[must_use]
    pub fn narrative(&self) -> String {
        self.sections()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Equal in every figure and evidence link; narrative text and
    /// generation time may differ.
    #[must_use]
    pub fn same_figures(&self, other: &SummaryCard) -> bool {
        let keywords = |c: &SummaryCard| {
            c.sections()
                .map(|s| (s.class, s.keyword.clone(), s.reason_id.clone()))
                .collect::<Vec<_>>()
        };
        self.month == other.month
            && self.risk_score == other.risk_score
            && self.current == other.current
            && self.previous == other.previous
            && self.deltas == other.deltas
            && self.top_keywords == other.top_keywords
            && self.variant == other.variant
            && keywords(self) == keywords(other)
    }
}

//! Monthly risk summary: figures, variant selection and narrative sections.

use std::sync::Arc;

use chrono::Utc;
use churnlens_core::{
    AppConfig, ChurnIntent, MonthWindow, NarrativeSection, NarrativeVariant, Review, SummaryCard,
    TopKeywords,
};

use crate::narrator::{build_prompt, sanitize, Narrator};
use crate::stats::{class_breakdown, class_deltas, risk_score, top_keywords};

#[derive(Debug, Clone)]
pub struct RiskConfig {
    pub weight_confirmed: f64,
    pub weight_complaint: f64,
    /// Keywords kept per class on the card.
    pub top_n: usize,
    /// Keywords never ranked or used as a section keyword.
    pub stopwords: Vec<String>,
    /// Evidence reviews sent to the narrator (and linked) per section.
    pub max_evidence: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            weight_confirmed: 1.0,
            weight_complaint: 0.5,
            top_n: 5,
            stopwords: vec!["app-delete".to_owned(), "app-uninstall".to_owned()],
            max_evidence: 30,
        }
    }
}

impl RiskConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            weight_confirmed: config.risk_weight_confirmed,
            weight_complaint: config.risk_weight_complaint,
            top_n: config.top_keywords,
            stopwords: config.keyword_stopwords.clone(),
            max_evidence: config.narrative_max_evidence,
        }
    }
}

/// Picks the narrative shape for a month.
///
/// | confirmed empty | complaint empty | overlap | variant            |
/// |-----------------|-----------------|---------|--------------------|
/// | yes             | yes             | –       | `PositiveOnly`     |
/// | yes             | no              | –       | `ComplaintDriven`  |
/// | no              | yes             | –       | `NoComplaintStage` |
/// | no              | no              | yes     | `Reinforced`       |
/// | no              | no              | no      | `Independent`      |
#[must_use]
pub fn select_variant(confirmed_empty: bool, complaint_empty: bool, overlap: bool) -> NarrativeVariant {
    match (confirmed_empty, complaint_empty) {
        (true, true) => NarrativeVariant::PositiveOnly,
        (true, false) => NarrativeVariant::ComplaintDriven,
        (false, true) => NarrativeVariant::NoComplaintStage,
        (false, false) if overlap => NarrativeVariant::Reinforced,
        (false, false) => NarrativeVariant::Independent,
    }
}

#[derive(Debug, Clone, Copy)]
enum Tone {
    Satisfied,
    Churned,
    AtRisk,
    Likewise,
    Meanwhile,
}

fn render(tone: Tone, keyword: Option<&str>, phrases: Option<&str>) -> String {
    let subject = match (phrases, keyword) {
        (Some(p), Some(k)) => format!("[{p}] around '{k}'"),
        (None, Some(k)) => format!("'{k}'"),
        (Some(p), None) => format!("[{p}]"),
        (None, None) => "a range of issues".to_owned(),
    };
    match tone {
        Tone::Satisfied => format!("Most reviewers are satisfied, especially with {subject}."),
        Tone::Churned => format!("Churned users left over {subject}."),
        Tone::AtRisk => format!(
            "No churn is confirmed yet, but non-churn users complain about {subject}, \
             which puts them at risk of leaving."
        ),
        Tone::Likewise => format!(
            "Likewise, non-churn users also complain about {subject}, so the same churn risk exists."
        ),
        Tone::Meanwhile => format!("Meanwhile, non-churn users complain about {subject}."),
    }
}

const EMPTY_MONTH_TEXT: &str = "No reviews were collected for this month.";
const NO_COMPLAINT_STAGE_TEXT: &str = "No complaint-stage churn signals were found this month.";

/// Builds [`SummaryCard`]s from stored reviews.
///
/// Narrator failures never fail a summary: the affected section falls back
/// to a template without phrases and a warning is logged.
pub struct MonthlyRiskSummarizer {
    narrator: Arc<dyn Narrator>,
    config: RiskConfig,
}

impl MonthlyRiskSummarizer {
    pub fn new(narrator: Arc<dyn Narrator>, config: RiskConfig) -> Self {
        Self { narrator, config }
    }

    /// Summarizes `window` from its reviews (`current`) and the previous
    /// month's (`previous`). Both slices are expected to hold only reviews
    /// dated inside their month.
    pub async fn summarize(
        &self,
        window: &MonthWindow,
        current: &[Review],
        previous: &[Review],
    ) -> SummaryCard {
        let current_stats = class_breakdown(current);
        let previous_stats = class_breakdown(previous);
        let deltas = class_deltas(&current_stats, &previous_stats);
        let score = risk_score(
            &current_stats,
            self.config.weight_confirmed,
            self.config.weight_complaint,
        );

        let rank = |intent: ChurnIntent| {
            top_keywords(current, intent, self.config.top_n, &self.config.stopwords)
        };
        let top = TopKeywords {
            none: rank(ChurnIntent::None),
            complaint: rank(ChurnIntent::Complaint),
            confirmed: rank(ChurnIntent::Confirmed),
        };

        let class = |intent: ChurnIntent| {
            current
                .iter()
                .filter(|r| r.intent == intent)
                .collect::<Vec<_>>()
        };
        let positive_reviews = class(ChurnIntent::None);
        let complaint_reviews = class(ChurnIntent::Complaint);
        let confirmed_reviews = class(ChurnIntent::Confirmed);

        let confirmed_keyword = self.lead_keyword(current, ChurnIntent::Confirmed);
        let overlap = confirmed_keyword.as_deref().is_some_and(|kw| {
            complaint_reviews
                .iter()
                .any(|r| r.keywords.iter().any(|k| k == kw))
        });
        let variant = select_variant(
            confirmed_reviews.is_empty(),
            complaint_reviews.is_empty(),
            overlap,
        );

        let mut confirmed = None;
        let mut complaint = None;
        let mut positive = None;

        match variant {
            NarrativeVariant::PositiveOnly => {
                positive = Some(if positive_reviews.is_empty() {
                    NarrativeSection {
                        class: ChurnIntent::None,
                        keyword: None,
                        text: EMPTY_MONTH_TEXT.to_owned(),
                        reason_id: Vec::new(),
                    }
                } else {
                    let keyword = self.lead_keyword(current, ChurnIntent::None);
                    self.section(ChurnIntent::None, Tone::Satisfied, keyword, &positive_reviews)
                        .await
                });
            }
            NarrativeVariant::ComplaintDriven => {
                let keyword = self.lead_keyword(current, ChurnIntent::Complaint);
                complaint = Some(
                    self.section(ChurnIntent::Complaint, Tone::AtRisk, keyword, &complaint_reviews)
                        .await,
                );
            }
            NarrativeVariant::NoComplaintStage => {
                confirmed = Some(
                    self.section(
                        ChurnIntent::Confirmed,
                        Tone::Churned,
                        confirmed_keyword,
                        &confirmed_reviews,
                    )
                    .await,
                );
                complaint = Some(NarrativeSection {
                    class: ChurnIntent::Complaint,
                    keyword: None,
                    text: NO_COMPLAINT_STAGE_TEXT.to_owned(),
                    reason_id: Vec::new(),
                });
            }
            NarrativeVariant::Reinforced => {
                confirmed = Some(
                    self.section(
                        ChurnIntent::Confirmed,
                        Tone::Churned,
                        confirmed_keyword.clone(),
                        &confirmed_reviews,
                    )
                    .await,
                );
                complaint = Some(
                    self.section(
                        ChurnIntent::Complaint,
                        Tone::Likewise,
                        confirmed_keyword,
                        &complaint_reviews,
                    )
                    .await,
                );
            }
            NarrativeVariant::Independent => {
                confirmed = Some(
                    self.section(
                        ChurnIntent::Confirmed,
                        Tone::Churned,
                        confirmed_keyword,
                        &confirmed_reviews,
                    )
                    .await,
                );
                let keyword = self.lead_keyword(current, ChurnIntent::Complaint);
                complaint = Some(
                    self.section(ChurnIntent::Complaint, Tone::Meanwhile, keyword, &complaint_reviews)
                        .await,
                );
            }
        }

        tracing::info!(
            month = %window.key(),
            risk_score = score,
            variant = variant.index(),
            reviews = current_stats.total,
            "summary computed"
        );

        SummaryCard {
            month: window.key(),
            risk_score: score,
            current: current_stats,
            previous: previous_stats,
            deltas,
            top_keywords: top,
            variant,
            confirmed,
            complaint,
            positive,
            generated_at: Utc::now(),
        }
    }

    fn lead_keyword(&self, reviews: &[Review], intent: ChurnIntent) -> Option<String> {
        top_keywords(reviews, intent, 1, &self.config.stopwords)
            .into_iter()
            .next()
            .map(|k| k.keyword)
    }

    /// Evidence is the class's reviews carrying `keyword` (all of the class
    /// when there is none), most thumbs-up first, capped at `max_evidence`.
    fn evidence<'a>(&self, class_reviews: &[&'a Review], keyword: Option<&str>) -> Vec<&'a Review> {
        let mut picked: Vec<&Review> = match keyword {
            Some(kw) => class_reviews
                .iter()
                .copied()
                .filter(|r| r.keywords.iter().any(|k| k == kw))
                .collect(),
            None => class_reviews.to_vec(),
        };
        picked.sort_by(|a, b| {
            b.thumbs_up
                .cmp(&a.thumbs_up)
                .then_with(|| b.at.cmp(&a.at))
                .then_with(|| a.id.cmp(&b.id))
        });
        picked.truncate(self.config.max_evidence.max(1));
        picked
    }

    async fn section(
        &self,
        class: ChurnIntent,
        tone: Tone,
        keyword: Option<String>,
        class_reviews: &[&Review],
    ) -> NarrativeSection {
        let evidence = self.evidence(class_reviews, keyword.as_deref());
        let texts: Vec<&str> = evidence.iter().map(|r| r.text.as_str()).collect();
        let phrases = self.phrases(class, keyword.as_deref(), &texts).await;

        NarrativeSection {
            class,
            text: render(tone, keyword.as_deref(), phrases.as_deref()),
            keyword,
            reason_id: evidence.iter().map(|r| r.id.clone()).collect(),
        }
    }

    async fn phrases(&self, class: ChurnIntent, keyword: Option<&str>, texts: &[&str]) -> Option<String> {
        if texts.is_empty() {
            return None;
        }
        let prompt = build_prompt(class, keyword, texts);
        match self.narrator.narrate(&prompt).await {
            Ok(raw) => {
                let cleaned = sanitize(&raw);
                if cleaned.is_empty() {
                    tracing::warn!(%class, "narrator returned empty text; using fallback narrative");
                    None
                } else {
                    Some(cleaned)
                }
            }
            Err(e) => {
                tracing::warn!(%class, error = %e, "narrator failed; using fallback narrative");
                None
            }
        }
    }
}

#[cfg(test)]
#[path = "summarizer_test.rs"]
mod tests;

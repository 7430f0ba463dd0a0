//! Monthly churn-risk summaries over enriched reviews.

pub mod error;
pub mod narrator;
pub mod stats;
pub mod summarizer;

pub use error::NarratorError;
pub use narrator::{build_prompt, sanitize, HttpNarrator, Narrator};
pub use stats::{class_breakdown, class_deltas, risk_score, top_keywords};
pub use summarizer::{select_variant, MonthlyRiskSummarizer, RiskConfig};

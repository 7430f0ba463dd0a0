//! Shared domain model and configuration for churnlens.

pub mod app_config;
pub mod config;
pub mod month;
pub mod review;
pub mod summary;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use month::{MonthKey, MonthWindow};
pub use review::{ChurnIntent, RawReview, Review};
pub use summary::{
    ClassBreakdown, ClassDeltas, ClassStats, KeywordShare, NarrativeSection, NarrativeVariant,
    SummaryCard, TopKeywords,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid churn intent label: {0}")]
    InvalidLabel(i64),

    #[error("invalid month key \"{0}\": expected YYYY-MM")]
    InvalidMonthKey(String),
}

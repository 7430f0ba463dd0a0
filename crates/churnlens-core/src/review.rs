//! Review records before and after enrichment.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Churn-intent class assigned by the classifier.
///
/// The numeric values are the wire and storage encoding (`0`, `1`, `2`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChurnIntent {
    None,
    Complaint,
    Confirmed,
}

impl ChurnIntent {
    /// Storage encoding of the label.
    #[must_use]
    pub fn as_label(self) -> u8 {
        match self {
            ChurnIntent::None => 0,
            ChurnIntent::Complaint => 1,
            ChurnIntent::Confirmed => 2,
        }
    }

    /// Decode a stored or collaborator-provided label.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidLabel`] for anything outside `0..=2`.
    pub fn from_label(label: i64) -> Result<Self, CoreError> {
        match label {
            0 => Ok(ChurnIntent::None),
            1 => Ok(ChurnIntent::Complaint),
            2 => Ok(ChurnIntent::Confirmed),
            other => Err(CoreError::InvalidLabel(other)),
        }
    }
}

impl std::fmt::Display for ChurnIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChurnIntent::None => write!(f, "none"),
            ChurnIntent::Complaint => write!(f, "complaint"),
            ChurnIntent::Confirmed => write!(f, "confirmed"),
        }
    }
}

/// A review as delivered by the harvester, before classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawReview {
    pub id: String,
    pub author: String,
    pub text: String,
    /// Star rating, 1..=5.
    pub rating: u8,
    pub thumbs_up: u32,
    pub at: NaiveDateTime,
}

impl RawReview {
    /// Attach the enrichment results. This is the only way to build a [`Review`]
    /// from harvested data.
    #[must_use]
    pub fn enrich(self, intent: ChurnIntent, keywords: Vec<String>) -> Review {
        Review {
            id: self.id,
            author: self.author,
            text: self.text,
            rating: self.rating,
            thumbs_up: self.thumbs_up,
            at: self.at,
            intent,
            keywords,
        }
    }
}

/// An enriched review, ready to persist. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub author: String,
    pub text: String,
    pub rating: u8,
    pub thumbs_up: u32,
    pub at: NaiveDateTime,
    pub intent: ChurnIntent,
    /// Keywords in the order the extractor produced them.
    pub keywords: Vec<String>,
}

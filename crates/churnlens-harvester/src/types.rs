//! Review-source wire types.
//!
//! The source returns reviews newest-first:
//!
//! ```text
//! {
//!   "reviews": [
//!     {"reviewId": "gp:AOqp...", "userName": "Jin", "content": "...",
//!      "score": 1, "thumbsUpCount": 3, "at": "2026-01-14T08:12:55"}
//!   ],
//!   "nextToken": "CAESBgoEC..."
//! }
//! ```
//!
//! `userName` and `content` may be `null`; `nextToken` is `null` or absent on
//! the last page.

use churnlens_core::RawReview;
use serde::Deserialize;

/// Opaque pagination cursor issued by the source. Lives only for the
/// duration of one harvest call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One page of normalized reviews plus the cursor for the next page.
#[derive(Debug, Clone, Default)]
pub struct ReviewPage {
    pub items: Vec<RawReview>,
    pub next: Option<ContinuationToken>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceReview {
    pub review_id: String,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default)]
    pub thumbs_up_count: Option<i64>,
    pub at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcePageResponse {
    #[serde(default)]
    pub reviews: Vec<SourceReview>,
    #[serde(default)]
    pub next_token: Option<String>,
}

//! HTTP client for the paginated review endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};

use crate::error::HarvestError;
use crate::normalize::normalize_review;
use crate::types::{ContinuationToken, ReviewPage, SourcePageResponse};

/// A paginated review source: `page(cursor) -> (items, next_cursor)`.
///
/// Items must come back newest-first. Implementations do not retry; the
/// caller decides what a failed page means for the run.
#[async_trait]
pub trait ReviewSource: Send + Sync {
    async fn page(
        &self,
        app_id: &str,
        page_size: usize,
        cursor: Option<&ContinuationToken>,
    ) -> Result<ReviewPage, HarvestError>;
}

/// Review source backed by `GET {base}/apps/{app_id}/reviews`.
///
/// Handles rate limiting (429) and other non-2xx responses as typed errors,
/// and normalizes every record before handing the page back.
pub struct HttpReviewSource {
    client: Client,
    base_url: Url,
}

impl HttpReviewSource {
    /// Creates a source with the configured timeout and `User-Agent`.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::Http`] if the `reqwest::Client` cannot be built,
    /// or [`HarvestError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn new(base_url: &str, timeout_secs: u64, user_agent: &str) -> Result<Self, HarvestError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| HarvestError::InvalidBaseUrl {
            base_url: base_url.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(Self { client, base_url })
    }

    fn reviews_url(
        &self,
        app_id: &str,
        page_size: usize,
        cursor: Option<&ContinuationToken>,
    ) -> Result<Url, HarvestError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| HarvestError::InvalidBaseUrl {
                base_url: self.base_url.to_string(),
                reason: "URL cannot be a base".to_string(),
            })?
            .pop_if_empty()
            .extend(["apps", app_id, "reviews"]);

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("count", &page_size.to_string());
            if let Some(token) = cursor {
                query.append_pair("continuation", token.as_str());
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl ReviewSource for HttpReviewSource {
    async fn page(
        &self,
        app_id: &str,
        page_size: usize,
        cursor: Option<&ContinuationToken>,
    ) -> Result<ReviewPage, HarvestError> {
        let url = self.reviews_url(app_id, page_size, cursor)?;

        let response = self
            .client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(HarvestError::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            return Err(HarvestError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        let parsed = serde_json::from_str::<SourcePageResponse>(&body).map_err(|e| {
            HarvestError::Deserialize {
                context: format!("review page for {app_id}"),
                source: e,
            }
        })?;

        let received = parsed.reviews.len();
        let items: Vec<_> = parsed
            .reviews
            .into_iter()
            .filter_map(normalize_review)
            .collect();
        if items.len() < received {
            tracing::debug!(
                app_id,
                received,
                kept = items.len(),
                "dropped source records that failed normalization"
            );
        }

        // A page whose records were all dropped is not the end of the feed.
        let next = parsed
            .next_token
            .filter(|t| !t.is_empty())
            .map(ContinuationToken::new);

        Ok(ReviewPage { items, next })
    }
}

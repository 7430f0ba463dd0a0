//! Shared JSON-over-HTTP client for the classifier, keyword and narrator
//! services.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::EnrichError;
use crate::retry::retry_with_backoff;

const DEFAULT_BACKOFF_BASE_MS: u64 = 500;

/// POSTs JSON to `{base_url}/{endpoint}` with an optional bearer key and
/// retries transient failures.
#[derive(Clone)]
pub struct CollaboratorClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl std::fmt::Debug for CollaboratorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollaboratorClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl CollaboratorClient {
    /// # Errors
    ///
    /// Returns [`EnrichError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout_secs: u64,
        max_retries: u32,
    ) -> Result<Self, EnrichError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key,
            max_retries,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
        })
    }

    #[must_use]
    pub fn with_backoff_base_ms(mut self, backoff_base_ms: u64) -> Self {
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// # Errors
    ///
    /// Returns the last [`EnrichError`] once retries are exhausted, or the
    /// first non-retriable one.
    pub async fn post_json<B, R>(&self, endpoint: &str, body: &B) -> Result<R, EnrichError>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        retry_with_backoff(endpoint, self.max_retries, self.backoff_base_ms, || {
            self.post_once(endpoint, body)
        })
        .await
    }

    async fn post_once<B, R>(&self, endpoint: &str, body: &B) -> Result<R, EnrichError>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/{endpoint}", self.base_url);
        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(EnrichError::UnexpectedStatus {
                endpoint: url,
                status: status.as_u16(),
            });
        }

        let text = response.text().await?;
        serde_json::from_str::<R>(&text).map_err(|e| EnrichError::Deserialize {
            context: format!("{endpoint} response"),
            source: e,
        })
    }
}

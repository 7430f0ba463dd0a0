use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("rate limited by review source (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("pagination limit reached for {app_id}: exceeded {max_pages} pages")]
    PaginationLimit { app_id: String, max_pages: usize },

    #[error("invalid source URL \"{base_url}\": {reason}")]
    InvalidBaseUrl { base_url: String, reason: String },

    #[error("review source error: {0}")]
    Source(String),

    #[error("harvest cancelled")]
    Cancelled,
}

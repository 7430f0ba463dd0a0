use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {endpoint}")]
    UnexpectedStatus { endpoint: String, status: u16 },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{collaborator} returned {got} results for {expected} texts")]
    LengthMismatch {
        collaborator: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("classifier returned unknown label {0}")]
    InvalidLabel(i64),

    #[error("{failed} of {total} keyword batches failed; first error: {first_error}")]
    KeywordBatchesFailed {
        failed: usize,
        total: usize,
        first_error: String,
    },

    #[error("no keywords assembled for review {review_id}")]
    MissingKeywords { review_id: String },

    #[error("collaborator error: {0}")]
    Collaborator(String),

    #[error("enrichment cancelled")]
    Cancelled,
}

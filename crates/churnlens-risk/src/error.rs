use churnlens_enrich::EnrichError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NarratorError {
    #[error("narrator request failed: {0}")]
    Collaborator(#[from] EnrichError),

    #[error("narrator returned no usable text")]
    Empty,
}

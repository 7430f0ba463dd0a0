pub mod client;
pub mod error;
pub mod harvester;
pub mod normalize;
pub mod pagination;
pub mod types;

pub use client::{HttpReviewSource, ReviewSource};
pub use error::HarvestError;
pub use harvester::{HarvestConfig, ReviewHarvester};
pub use normalize::normalize_review;
pub use pagination::PageCursor;
pub use types::{ContinuationToken, ReviewPage};

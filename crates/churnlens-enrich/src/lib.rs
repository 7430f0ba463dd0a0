pub mod classifier;
pub mod collaborator;
pub mod error;
pub mod keywords;
pub(crate) mod retry;
pub mod stage;

pub use classifier::{Classifier, HttpClassifier};
pub use collaborator::CollaboratorClient;
pub use error::EnrichError;
pub use keywords::{tidy_keywords, HttpKeywordExtractor, KeywordExtractor};
pub use stage::{EnrichConfig, EnrichmentStage};

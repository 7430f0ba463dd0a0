//! Churn-intent classifier collaborator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::collaborator::CollaboratorClient;
use crate::error::EnrichError;

/// Assigns a raw churn-intent label (`0`, `1` or `2`) to each text.
///
/// Implementations must return exactly one label per input, in input order.
/// Label validation happens in the stage, not here.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, texts: &[String]) -> Result<Vec<i64>, EnrichError>;
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    texts: &'a [String],
}

#[derive(Deserialize)]
struct ClassifyResponse {
    labels: Vec<i64>,
}

/// `POST {url}/classify {"texts": [..]}` → `{"labels": [..]}`.
#[derive(Debug, Clone)]
pub struct HttpClassifier {
    client: CollaboratorClient,
}

impl HttpClassifier {
    #[must_use]
    pub fn new(client: CollaboratorClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, texts: &[String]) -> Result<Vec<i64>, EnrichError> {
        let response: ClassifyResponse = self
            .client
            .post_json("classify", &ClassifyRequest { texts })
            .await?;
        Ok(response.labels)
    }
}

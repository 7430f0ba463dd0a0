//! Keyword-extraction collaborator.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::collaborator::CollaboratorClient;
use crate::error::EnrichError;

/// Extracts an ordered keyword list for each text, one list per input.
#[async_trait]
pub trait KeywordExtractor: Send + Sync {
    async fn extract(&self, texts: &[String]) -> Result<Vec<Vec<String>>, EnrichError>;
}

#[derive(Serialize)]
struct KeywordRequest<'a> {
    texts: &'a [String],
}

#[derive(Deserialize)]
struct KeywordResponse {
    keywords: Vec<Vec<String>>,
}

/// `POST {url}/keywords {"texts": [..]}` → `{"keywords": [[..]]}`.
#[derive(Debug, Clone)]
pub struct HttpKeywordExtractor {
    client: CollaboratorClient,
}

impl HttpKeywordExtractor {
    #[must_use]
    pub fn new(client: CollaboratorClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl KeywordExtractor for HttpKeywordExtractor {
    async fn extract(&self, texts: &[String]) -> Result<Vec<Vec<String>>, EnrichError> {
        let response: KeywordResponse = self
            .client
            .post_json("keywords", &KeywordRequest { texts })
            .await?;
        Ok(response.keywords)
    }
}

/// Trims each keyword, drops blanks and repeats, keeps first-seen order.
#[must_use]
pub fn tidy_keywords(raw: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .map(|k| k.trim().to_owned())
        .filter(|k| !k.is_empty() && seen.insert(k.clone()))
        .collect()
}

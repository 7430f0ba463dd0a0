//! The enrichment stage: classify, extract keywords, reassemble by id.

use std::collections::HashMap;
use std::sync::Arc;

use churnlens_core::{AppConfig, ChurnIntent, RawReview, Review};
use futures::future::FutureExt;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::classifier::Classifier;
use crate::error::EnrichError;
use crate::keywords::{tidy_keywords, KeywordExtractor};

#[derive(Debug, Clone, Copy)]
pub struct EnrichConfig {
    pub classify_batch_size: usize,
    pub keyword_batch_size: usize,
    /// Keyword batches in flight at once.
    pub keyword_max_concurrency: usize,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            classify_batch_size: 16,
            keyword_batch_size: 100,
            keyword_max_concurrency: 4,
        }
    }
}

impl EnrichConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            classify_batch_size: config.classify_batch_size,
            keyword_batch_size: config.keyword_batch_size,
            keyword_max_concurrency: config.keyword_max_concurrency,
        }
    }
}

type BatchResult = Result<Vec<(String, Vec<String>)>, EnrichError>;

/// Turns harvested [`RawReview`]s into persistable [`Review`]s.
///
/// Either every review comes back with a validated label and its keyword
/// list, or the stage fails as a whole.
pub struct EnrichmentStage {
    classifier: Arc<dyn Classifier>,
    extractor: Arc<dyn KeywordExtractor>,
    config: EnrichConfig,
}

impl EnrichmentStage {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        extractor: Arc<dyn KeywordExtractor>,
        config: EnrichConfig,
    ) -> Self {
        Self {
            classifier,
            extractor,
            config,
        }
    }

    /// Enriches `reviews`, preserving their order. Review ids must be unique.
    ///
    /// # Errors
    ///
    /// - any classifier failure, label-count mismatch or unknown label
    /// - [`EnrichError::KeywordBatchesFailed`] if one or more keyword batches
    ///   failed (the others still ran to completion)
    /// - [`EnrichError::Cancelled`] if `cancel` fires
    pub async fn enrich(
        &self,
        reviews: Vec<RawReview>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Review>, EnrichError> {
        if reviews.is_empty() {
            return Ok(Vec::new());
        }

        let intents = self.classify_all(&reviews, cancel).await?;
        let mut keywords = self.extract_all(&reviews, cancel).await?;

        let enriched = reviews
            .into_iter()
            .zip(intents)
            .map(|(review, intent)| {
                let kws = keywords
                    .remove(&review.id)
                    .ok_or_else(|| EnrichError::MissingKeywords {
                        review_id: review.id.clone(),
                    })?;
                Ok(review.enrich(intent, kws))
            })
            .collect::<Result<Vec<_>, EnrichError>>()?;

        tracing::info!(reviews = enriched.len(), "enrichment complete");
        Ok(enriched)
    }

    async fn classify_all(
        &self,
        reviews: &[RawReview],
        cancel: &CancellationToken,
    ) -> Result<Vec<ChurnIntent>, EnrichError> {
        let mut intents = Vec::with_capacity(reviews.len());

        for chunk in reviews.chunks(self.config.classify_batch_size.max(1)) {
            let texts: Vec<String> = chunk.iter().map(|r| r.text.clone()).collect();
            let labels = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(EnrichError::Cancelled),
                labels = self.classifier.classify(&texts) => labels?,
            };
            if labels.len() != texts.len() {
                return Err(EnrichError::LengthMismatch {
                    collaborator: "classifier",
                    expected: texts.len(),
                    got: labels.len(),
                });
            }
            for label in labels {
                intents.push(
                    ChurnIntent::from_label(label).map_err(|_| EnrichError::InvalidLabel(label))?,
                );
            }
        }

        Ok(intents)
    }

    async fn extract_all(
        &self,
        reviews: &[RawReview],
        cancel: &CancellationToken,
    ) -> Result<HashMap<String, Vec<String>>, EnrichError> {
        let extractor = &self.extractor;
        let batches = reviews.chunks(self.config.keyword_batch_size.max(1));
        let total = batches.len();

        let work = stream::iter(batches.enumerate())
            .map(|(index, chunk)| async move {
                let texts: Vec<String> = chunk.iter().map(|r| r.text.clone()).collect();
                let result: BatchResult = match extractor.extract(&texts).await {
                    Ok(lists) if lists.len() == chunk.len() => Ok(chunk
                        .iter()
                        .map(|r| r.id.clone())
                        .zip(lists.into_iter().map(tidy_keywords))
                        .collect()),
                    Ok(lists) => Err(EnrichError::LengthMismatch {
                        collaborator: "keyword extractor",
                        expected: chunk.len(),
                        got: lists.len(),
                    }),
                    Err(e) => Err(e),
                };
                (index, result)
            }
            .boxed())
            .buffer_unordered(self.config.keyword_max_concurrency.max(1))
            .collect::<Vec<_>>()
            .boxed();

        let results = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(EnrichError::Cancelled),
            results = work => results,
        };

        let mut keywords = HashMap::with_capacity(reviews.len());
        let mut failed = 0usize;
        let mut first_error = None;
        for (index, result) in results {
            match result {
                Ok(pairs) => keywords.extend(pairs),
                Err(e) => {
                    tracing::error!(batch = index, error = %e, "keyword batch failed");
                    failed += 1;
                    first_error.get_or_insert_with(|| e.to_string());
                }
            }
        }

        if let Some(first_error) = first_error {
            return Err(EnrichError::KeywordBatchesFailed {
                failed,
                total,
                first_error,
            });
        }

        tracing::debug!(batches = total, "keyword extraction complete");
        Ok(keywords)
    }
}

#[cfg(test)]
#[path = "stage_test.rs"]
mod tests;

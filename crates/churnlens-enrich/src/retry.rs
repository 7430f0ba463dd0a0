//! Retry with exponential back-off and jitter for collaborator calls.
//!
//! [`retry_with_backoff`] wraps any fallible async operation and retries on
//! transient errors (network failures, 429, 5xx). Contract violations such
//! as malformed bodies or length mismatches are returned immediately.

use std::future::Future;
use std::time::Duration;

use crate::error::EnrichError;

/// Returns `true` for errors that are worth retrying after a back-off delay.
///
/// **Retriable:** timeouts, connection failures, HTTP 429 and 5xx.
///
/// **Not retriable:** 4xx other than 429, undecodable bodies, wrong result
/// counts, unknown labels and cancellation.
pub(crate) fn is_retriable(err: &EnrichError) -> bool {
    match err {
        EnrichError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        EnrichError::UnexpectedStatus { status, .. } => *status == 429 || *status >= 500,
        EnrichError::Deserialize { .. }
        | EnrichError::LengthMismatch { .. }
        | EnrichError::InvalidLabel(_)
        | EnrichError::KeywordBatchesFailed { .. }
        | EnrichError::MissingKeywords { .. }
        | EnrichError::Collaborator(_)
        | EnrichError::Cancelled => false,
    }
}

/// Runs `operation` with up to `max_retries` additional attempts on transient errors.
///
/// Back-off schedule with `backoff_base_ms = 500`:
///
/// | Attempt | Sleep before next attempt     |
/// |---------|-------------------------------|
/// | 1       | 500 ms × 2⁰ ± 25 % jitter     |
/// | 2       | 500 ms × 2¹ ± 25 % jitter     |
/// | 3       | 500 ms × 2² ± 25 % jitter     |
///
/// Delay is capped at 30 s. Non-retriable errors are returned immediately.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    endpoint: &str,
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, EnrichError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EnrichError>>,
{
    const MAX_DELAY_MS: u64 = 30_000;
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    endpoint,
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "collaborator transient error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

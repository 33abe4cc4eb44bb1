//! Retry wrapper for HTTP calls: three attempts with exponential
//! backoff, honoring a `Retry-After` header when present and bounded by
//! a maximum wait. Retries on 429 and 5xx; does not retry on 4xx other
//! than 429. Respects caller cancellation between attempts.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

const MAX_ATTEMPTS: u32 = 3;
const MAX_BACKOFF: Duration = Duration::from_secs(30);
const BASE_BACKOFF_MILLIS: u64 = 200;

/// What an attempt closure reports back to the retry loop: whether the
/// failure is worth retrying, and (for 429s) a server-provided wait.
#[derive(Debug, Clone)]
pub struct AttemptFailure {
    pub message: String,
    pub retryable: bool,
    pub retry_after: Option<Duration>,
}

impl AttemptFailure {
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
            retry_after: None,
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
            retry_after: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError {
    #[error("retry budget exhausted: {0}")]
    Exhausted(String),
    #[error("cancelled")]
    Cancelled,
}

/// HTTP status classification: retry on 429 and 5xx only.
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// Parses a `Retry-After` header value given in seconds (the only form
/// the embedder/LLM services this client talks to emit).
pub fn parse_retry_after_secs(value: Option<&str>) -> Option<Duration> {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn backoff_for_attempt(attempt_index: u32) -> Duration {
    let base = BASE_BACKOFF_MILLIS.saturating_mul(1u64 << attempt_index.min(16));
    let jitter = rand::random::<u64>() % 100;
    Duration::from_millis(base + jitter).min(MAX_BACKOFF)
}

/// Runs `attempt` up to [`MAX_ATTEMPTS`] times. `attempt` receives the
/// zero-based attempt index. Sleeps between attempts are cancellable via
/// `cancellation`.
pub async fn retry_with_backoff<F, Fut, T>(
    cancellation: &CancellationToken,
    mut attempt: F,
) -> Result<T, RetryError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AttemptFailure>>,
{
    let mut last_message = String::from("no attempts made");

    for attempt_index in 0..MAX_ATTEMPTS {
        if cancellation.is_cancelled() {
            return Err(RetryError::Cancelled);
        }

        match attempt(attempt_index).await {
            Ok(value) => return Ok(value),
            Err(failure) => {
                last_message = failure.message.clone();
                let is_last_attempt = attempt_index + 1 == MAX_ATTEMPTS;
                if !failure.retryable || is_last_attempt {
                    return Err(RetryError::Exhausted(last_message));
                }

                let wait = failure
                    .retry_after
                    .map(|d| d.min(MAX_BACKOFF))
                    .unwrap_or_else(|| backoff_for_attempt(attempt_index));

                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = cancellation.cancelled() => return Err(RetryError::Cancelled),
                }
            }
        }
    }

    Err(RetryError::Exhausted(last_message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn status_classification_retries_429_and_5xx_only() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(500));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(200));
    }

    #[test]
    fn parses_retry_after_seconds() {
        assert_eq!(parse_retry_after_secs(Some("5")), Some(Duration::from_secs(5)));
        assert_eq!(parse_retry_after_secs(None), None);
        assert_eq!(parse_retry_after_secs(Some("not-a-number")), None);
    }

    #[tokio::test]
    async fn succeeds_without_retry_on_first_try() {
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(&cancel, |_attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, AttemptFailure>(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_failures_up_to_max_attempts() {
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);
        let result: Result<u32, RetryError> = retry_with_backoff(&cancel, |_attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AttemptFailure::transient("503")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn does_not_retry_permanent_failures() {
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);
        let result: Result<u32, RetryError> = retry_with_backoff(&cancel, |_attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AttemptFailure::permanent("400")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn succeeds_after_one_transient_retry() {
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(&cancel, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err(AttemptFailure {
                        message: "rate limited".into(),
                        retryable: true,
                        retry_after: Some(Duration::from_millis(1)),
                    })
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cancellation_is_observed_between_attempts() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: Result<u32, RetryError> =
            retry_with_backoff(&cancel, |_| async { Err(AttemptFailure::transient("x")) }).await;
        assert!(matches!(result, Err(RetryError::Cancelled)));
    }
}

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use crate::storage::StorageError;

// ============================================================================
// Bounded Retry for Transient Storage Failures
// ============================================================================
//
// Wraps the transactional storage operations (order creation, status update,
// review insert). Only errors reporting the backend as unavailable are
// retried; validation and conflict errors are stable facts and surface
// immediately.
//
// ============================================================================

#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Cap on the delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

/// Run `operation`, retrying with exponential backoff while it fails with a
/// transient storage error. The last error is returned once the attempt
/// budget is spent.
pub async fn retry_transient<T, F, Fut>(
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, StorageError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StorageError>>,
{
    let mut delay = config.initial_delay;

    for attempt in 1..=config.max_attempts {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt, "storage operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if err.is_transient() && attempt < config.max_attempts => {
                tracing::warn!(
                    attempt,
                    error = %err,
                    delay_ms = delay.as_millis(),
                    "transient storage failure, retrying"
                );
                sleep(delay).await;
                delay = delay
                    .mul_f64(config.multiplier)
                    .min(config.max_delay);
            }
            Err(err) => return Err(err),
        }
    }

    // max_attempts >= 1, so the loop always returns first.
    unreachable!("retry loop exited without a result")
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let calls = AtomicU32::new(0);
        let result = retry_transient(&quick(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, StorageError>(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let result = retry_transient(&quick(), || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if attempt < 3 {
                    Err(StorageError::Unavailable("connection reset".into()))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_attempt_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_transient(&quick(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StorageError::Unavailable("still down".into())) }
        })
        .await;
        assert!(matches!(result, Err(StorageError::Unavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_transient_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_transient(&quick(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StorageError::DuplicateOrderNumber("ORD-DEADBEEF".into())) }
        })
        .await;
        assert!(matches!(result, Err(StorageError::DuplicateOrderNumber(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

//! Retry logic with exponential backoff
//!
//! Cost Explorer throttles aggressively (`LimitExceededException`), so page
//! requests run under a retry policy. Only errors that report
//! `is_retryable()` are attempted again.

use crate::error::{CostReportError, IsRetryable, Result};
use std::time::Duration;
use tracing::{info, warn};

/// Default number of attempts for a Cost Explorer request
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Retry policy trait
#[allow(async_fn_in_trait)]
pub trait RetryPolicy: Send + Sync {
    /// Execute a function with retry logic
    async fn execute_with_retry<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: std::future::Future<Output = Result<T>> + Send;
}

/// Exponential backoff retry policy
#[derive(Debug, Clone)]
pub struct ExponentialBackoffPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
    jitter_factor: f64,
}

impl ExponentialBackoffPolicy {
    /// Create a new exponential backoff policy (at least one attempt)
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(20),
            jitter_factor: 0.1,
        }
    }

    /// Override the first backoff delay
    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Calculate backoff delay for given attempt number
    fn calculate_backoff(&self, attempt: u32) -> Duration {
        let exponential = self.initial_delay.as_millis() as f64 * 2f64.powi(attempt as i32);
        let delay_ms = exponential.min(self.max_delay.as_millis() as f64);

        let jitter = delay_ms * self.jitter_factor * fastrand::f64();
        Duration::from_millis((delay_ms + jitter) as u64)
    }
}

impl RetryPolicy for ExponentialBackoffPolicy {
    async fn execute_with_retry<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: std::future::Future<Output = Result<T>> + Send,
    {
        let mut attempt = 0;
        loop {
            match f().await {
                Ok(result) => {
                    if attempt > 0 {
                        info!("Operation succeeded after {} retries", attempt);
                    }
                    return Ok(result);
                }
                Err(e) => {
                    if !e.is_retryable() {
                        warn!("Non-retryable error, aborting: {}", e);
                        return Err(e);
                    }

                    if attempt + 1 >= self.max_attempts {
                        warn!("Max retries ({}) reached", self.max_attempts);
                        return Err(CostReportError::Retryable {
                            attempt: attempt + 1,
                            max_attempts: self.max_attempts,
                            reason: e.to_string(),
                            source: Some(Box::new(e)),
                        });
                    }

                    let backoff = self.calculate_backoff(attempt);
                    warn!(
                        "Retryable error (attempt {}/{}), retrying in {:?}: {}",
                        attempt + 1,
                        self.max_attempts,
                        backoff,
                        e
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn throttled() -> CostReportError {
        CostReportError::CloudProvider {
            provider: "aws".to_string(),
            message: "LimitExceededException".to_string(),
            source: None,
        }
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = ExponentialBackoffPolicy::new(10);
        let delay = policy.calculate_backoff(20);
        // max_delay plus at most 10% jitter
        assert!(delay <= Duration::from_millis(22_000));
        assert!(delay >= Duration::from_secs(20));
    }

    #[test]
    fn test_zero_attempts_means_one() {
        assert_eq!(ExponentialBackoffPolicy::new(0).max_attempts(), 1);
    }

    #[tokio::test]
    async fn test_retries_throttling_then_succeeds() {
        let policy = ExponentialBackoffPolicy::new(3).with_initial_delay(Duration::from_millis(1));
        let calls = AtomicU32::new(0);

        let result = policy
            .execute_with_retry(|| async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(throttled())
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let policy = ExponentialBackoffPolicy::new(5).with_initial_delay(Duration::from_millis(1));
        let calls = AtomicU32::new(0);

        let result: Result<()> = policy
            .execute_with_retry(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(CostReportError::Aws("AccessDeniedException".to_string()))
            })
            .await;

        assert!(matches!(result, Err(CostReportError::Aws(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_wrap_last_error() {
        let policy = ExponentialBackoffPolicy::new(2).with_initial_delay(Duration::from_millis(1));
        let calls = AtomicU32::new(0);

        let result: Result<()> = policy
            .execute_with_retry(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(throttled())
            })
            .await;

        match result {
            Err(CostReportError::Retryable {
                attempt,
                max_attempts,
                ..
            }) => {
                assert_eq!(attempt, 2);
                assert_eq!(max_attempts, 2);
            }
            other => panic!("Expected Retryable, got: {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}

//! Resilience utilities for connectors
//!
//! One retry policy shared by every connector: a bounded number of attempts,
//! a backoff function between them, a per-attempt timeout, and a caller
//! supplied predicate deciding which errors are transient.

use serde::Deserialize;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// Default request timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default attempts per operation (first try included)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay between attempts
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;

/// Backoff function between attempts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    /// base, 2×base, 3×base, ...
    #[default]
    Linear,
    /// base, 2×base, 4×base, ... (capped at 64×)
    Exponential,
}

/// Retry policy for a connector
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, first try included (minimum 1)
    pub max_attempts: u32,
    /// Delay unit for the backoff function
    pub base_delay: Duration,
    pub backoff: Backoff,
    /// Deadline for a single attempt
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
            backoff: Backoff::Linear,
            attempt_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1 = first retry)
    pub fn delay(&self, retry: u32) -> Duration {
        let retry = retry.max(1);
        match self.backoff {
            Backoff::Linear => self.base_delay * retry,
            Backoff::Exponential => self.base_delay * (1 << (retry - 1).min(6)),
        }
    }
}

/// Error from retry operation
#[derive(Debug)]
pub enum RetryError<E> {
    /// All retry attempts exhausted on transient errors
    Exhausted { attempts: u32, last_error: String },
    /// Non-retryable error, returned on first occurrence
    Permanent(E),
}

impl<E: std::fmt::Display> std::fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryError::Exhausted {
                attempts,
                last_error,
            } => {
                write!(f, "failed after {} attempts: {}", attempts, last_error)
            }
            RetryError::Permanent(e) => write!(f, "permanent error: {}", e),
        }
    }
}

impl From<RetryError<crate::ConnectorError>> for crate::ConnectorError {
    fn from(err: RetryError<crate::ConnectorError>) -> Self {
        match err {
            RetryError::Exhausted {
                attempts,
                last_error,
            } => crate::ConnectorError::RetriesExhausted {
                attempts,
                last_error,
            },
            RetryError::Permanent(e) => e,
        }
    }
}

/// Execute an operation with per-attempt timeout and retry
///
/// Errors for which `is_retryable` returns false are returned immediately as
/// [`RetryError::Permanent`]. Timeouts always count as retryable.
pub async fn execute_with_retry<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    operation_name: &str,
    is_retryable: P,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=max_attempts {
        if attempt > 1 {
            let delay = policy.delay(attempt - 1);
            debug!(
                operation = operation_name,
                attempt,
                delay_ms = delay.as_millis(),
                "retrying after delay"
            );
            tokio::time::sleep(delay).await;
        }

        match timeout(policy.attempt_timeout, operation()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => {
                if !is_retryable(&e) {
                    return Err(RetryError::Permanent(e));
                }
                debug!(
                    operation = operation_name,
                    attempt,
                    error = %e,
                    "transient failure"
                );
                last_error = Some(e.to_string());
            }
            Err(_) => {
                debug!(
                    operation = operation_name,
                    attempt,
                    timeout_ms = policy.attempt_timeout.as_millis(),
                    "attempt timed out"
                );
                last_error = Some("request timed out".to_string());
            }
        }
    }

    Err(RetryError::Exhausted {
        attempts: max_attempts,
        last_error: last_error.unwrap_or_else(|| "unknown error".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConnectorError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            backoff: Backoff::Linear,
            attempt_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_linear_delays() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(500),
            ..Default::default()
        };
        assert_eq!(policy.delay(1), Duration::from_millis(500));
        assert_eq!(policy.delay(2), Duration::from_millis(1000));
        assert_eq!(policy.delay(3), Duration::from_millis(1500));
    }

    #[test]
    fn test_exponential_delays_capped() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(100),
            backoff: Backoff::Exponential,
            ..Default::default()
        };
        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(3), Duration::from_millis(400));
        assert_eq!(policy.delay(20), Duration::from_millis(6400));
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = execute_with_retry(
            &fast_policy(3),
            "test",
            ConnectorError::is_retryable,
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(ConnectorError::Server {
                        status: 503,
                        message: "unavailable".into(),
                    })
                } else {
                    Ok(n)
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = execute_with_retry(
            &fast_policy(5),
            "test",
            ConnectorError::is_retryable,
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ConnectorError::AuthFailed("bad token".into()))
            },
        )
        .await;

        assert!(matches!(
            result,
            Err(RetryError::Permanent(ConnectorError::AuthFailed(_)))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = execute_with_retry(
            &fast_policy(2),
            "test",
            ConnectorError::is_retryable,
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ConnectorError::RateLimited {
                    retry_after_secs: 1,
                })
            },
        )
        .await;

        let err: ConnectorError = result.unwrap_err().into();
        assert!(matches!(
            err,
            ConnectorError::RetriesExhausted { attempts: 2, .. }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_transient() {
        let policy = RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            backoff: Backoff::Linear,
            attempt_timeout: Duration::from_millis(50),
        };
        let calls = AtomicU32::new(0);
        let result: Result<(), RetryError<ConnectorError>> =
            execute_with_retry(&policy, "test", ConnectorError::is_retryable, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await;

        match result {
            Err(RetryError::Exhausted { last_error, .. }) => {
                assert_eq!(last_error, "request timed out")
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}

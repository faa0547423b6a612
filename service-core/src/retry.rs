//! Bounded retry and timeout helpers for calls into backing stores.
//!
//! Only errors that report themselves as transient are retried; everything
//! else is returned to the caller on the first failure.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Errors that can tell whether retrying the same call may succeed.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Configuration for retry behavior.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt).
    pub max_retries: u32,
    /// Backoff before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound on any single backoff.
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
    /// Deadline applied to every individual attempt.
    pub call_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
            backoff_multiplier: 2.0,
            call_timeout: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    /// A single retry after `backoff`, each attempt bounded by `call_timeout`.
    pub fn single_retry(backoff: Duration, call_timeout: Duration) -> Self {
        Self {
            max_retries: 1,
            initial_backoff: backoff,
            call_timeout,
            ..Default::default()
        }
    }

    fn backoff_duration(&self, attempt: u32) -> Duration {
        let backoff =
            self.initial_backoff.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        let backoff_ms = backoff.min(self.max_backoff.as_millis() as f64) as u64;
        Duration::from_millis(backoff_ms)
    }
}

/// Run `f` with a per-attempt deadline, converting an elapsed deadline with
/// `on_timeout`.
pub async fn with_timeout<F, Fut, T, E>(
    call_timeout: Duration,
    operation_name: &str,
    f: F,
    on_timeout: impl FnOnce() -> E,
) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(call_timeout, f()).await {
        Ok(result) => result,
        Err(_) => {
            warn!(
                operation = operation_name,
                timeout_ms = call_timeout.as_millis() as u64,
                "Store call timed out"
            );
            Err(on_timeout())
        }
    }
}

/// Execute an async call, retrying transient failures with backoff.
///
/// Every attempt is bounded by `config.call_timeout`; a timeout is turned into
/// an error with `on_timeout` and is itself considered transient.
pub async fn retry_transient<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    f: F,
    on_timeout: impl Fn() -> E,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Transient + std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        let outcome = match tokio::time::timeout(config.call_timeout, f()).await {
            Ok(result) => result,
            Err(_) => Err(on_timeout()),
        };

        match outcome {
            Ok(result) => {
                if attempt > 0 {
                    info!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        "Store call succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                if !err.is_transient() {
                    return Err(err);
                }

                if attempt >= config.max_retries {
                    warn!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        error = %err,
                        "Store call failed after max retries"
                    );
                    return Err(err);
                }

                let backoff = config.backoff_duration(attempt);
                warn!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    error = %err,
                    backoff_ms = backoff.as_millis() as u64,
                    "Store call failed, retrying after backoff"
                );

                sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, PartialEq)]
    enum TestError {
        Flaky,
        Fatal,
        TimedOut,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    impl Transient for TestError {
        fn is_transient(&self) -> bool {
            matches!(self, TestError::Flaky | TestError::TimedOut)
        }
    }

    fn quick() -> RetryConfig {
        RetryConfig::single_retry(Duration::from_millis(1), Duration::from_millis(200))
    }

    #[test]
    fn test_backoff_duration() {
        let config = RetryConfig {
            initial_backoff: Duration::from_millis(100),
            ..Default::default()
        };
        assert_eq!(config.backoff_duration(0), Duration::from_millis(100));
        assert_eq!(config.backoff_duration(1), Duration::from_millis(200));
        assert_eq!(config.backoff_duration(10), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_transient_error_retried_once() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = retry_transient(
            &quick(),
            "flaky_then_ok",
            move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(TestError::Flaky)
                } else {
                    Ok(7)
                }
            },
            || TestError::TimedOut,
        )
        .await;
        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_is_bounded() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = retry_transient(
            &quick(),
            "always_flaky",
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError::Flaky)
            },
            || TestError::TimedOut,
        )
        .await;
        assert_eq!(result, Err(TestError::Flaky));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = retry_transient(
            &quick(),
            "fatal",
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError::Fatal)
            },
            || TestError::TimedOut,
        )
        .await;
        assert_eq!(result, Err(TestError::Fatal));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_hanging_call_times_out() {
        let config = RetryConfig::single_retry(Duration::from_millis(1), Duration::from_millis(10));
        let result: Result<(), _> = retry_transient(
            &config,
            "hang",
            || async {
                sleep(Duration::from_secs(60)).await;
                Ok(())
            },
            || TestError::TimedOut,
        )
        .await;
        assert_eq!(result, Err(TestError::TimedOut));
    }

    #[tokio::test]
    async fn test_with_timeout_passes_through_result() {
        let result = with_timeout(
            Duration::from_millis(100),
            "fast",
            || async { Ok::<_, TestError>(1) },
            || TestError::TimedOut,
        )
        .await;
        assert_eq!(result, Ok(1));
    }
}

//! Retry with exponential backoff for remote calls.

use std::future::Future;
use std::time::Duration;

use tracing::info;

use crate::error::{Operation, RemoteRequestError};

/// Retry configuration for remote calls.
///
/// The default makes a single attempt, so failures surface immediately.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first). Zero is treated as one.
    pub max_attempts: u32,
    /// Initial delay between retries.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Default backoff with the given attempt budget.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Delay before the attempt following `delay`.
    fn next_delay(&self, delay: Duration) -> Duration {
        std::cmp::min(
            self.max_delay,
            Duration::from_secs_f64(delay.as_secs_f64() * self.backoff_multiplier),
        )
    }

    /// Whether `err` may be retried for its operation.
    ///
    /// Creating an incident is not idempotent, so it is only repeated when
    /// the connection was never established.
    #[must_use]
    pub fn should_retry(err: &RemoteRequestError) -> bool {
        if err.operation.is_idempotent() {
            err.is_retryable()
        } else {
            err.is_connect()
        }
    }
}

/// Run `f` until it succeeds, fails permanently, or the budget is spent.
///
/// # Errors
/// Returns the last error once no further attempt is allowed.
pub async fn with_retry_async<T, F, Fut>(
    config: &RetryConfig,
    operation: Operation,
    mut f: F,
) -> Result<T, RemoteRequestError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RemoteRequestError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if attempt >= max_attempts || !RetryConfig::should_retry(&e) {
                    return Err(e);
                }

                info!(
                    operation = %operation,
                    attempt,
                    max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "Request failed, retrying"
                );

                tokio::time::sleep(delay).await;
                delay = config.next_delay(delay);
            }
        }
    }
}

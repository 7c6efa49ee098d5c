//! Retry Logic with Exponential Backoff
//!
//! Used by the HTTP transport only. The client core never retries on its own.
//!
//! ```text
//! Attempt 1: Immediate
//! Attempt 2: Wait 100ms (backoff)
//! Attempt 3: Wait 200ms (backoff * 2)
//! Attempt 4: Wait 400ms (backoff * 4)
//! ```
//!
//! ## Retryable vs Non-Retryable Errors
//!
//! **Retryable** (transient failures):
//! - No HTTP response at all (connection refused, reset, timeout)
//! - `429 Too Many Requests`
//! - `5xx` server errors
//!
//! **Non-Retryable**: every other status, in particular `404` which callers interpret.

use crate::error::{RegistryClientError, Result};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry policy configuration for exponential backoff.
///
/// ```text
/// backoff = min(initial_backoff * multiplier^attempt, max_backoff)
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts
    pub max_retries: usize,

    /// Initial backoff duration
    pub initial_backoff: Duration,

    /// Maximum backoff duration
    pub max_backoff: Duration,

    /// Backoff multiplier for exponential growth
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    /// 3 retries, 100ms initial backoff doubling up to 5s.
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(
        max_retries: usize,
        initial_backoff: Duration,
        max_backoff: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_retries,
            initial_backoff,
            max_backoff,
            backoff_multiplier,
        }
    }

    /// Policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Backoff duration before retry number `attempt` (0-indexed).
    pub fn backoff(&self, attempt: usize) -> Duration {
        let backoff_ms =
            self.initial_backoff.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        let backoff = Duration::from_millis(backoff_ms as u64);
        backoff.min(self.max_backoff)
    }

    /// `true` if the error is transient.
    pub fn is_retryable(&self, error: &RegistryClientError) -> bool {
        match error {
            RegistryClientError::Registry { status: None, .. } => true,
            RegistryClientError::Registry {
                status: Some(status),
                ..
            } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Retry a registry call with exponential backoff.
///
/// Non-retryable errors are returned immediately; once `max_retries` is exhausted the last
/// error is returned.
pub async fn retry_with_backoff<F, Fut, T>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(attempt = attempt + 1, "Registry call succeeded after retry");
                }
                return Ok(result);
            }
            Err(error) => {
                if !policy.is_retryable(&error) {
                    return Err(error);
                }

                if attempt >= policy.max_retries {
                    warn!(
                        attempt = attempt + 1,
                        max_retries = policy.max_retries,
                        error = %error,
                        "Max retries exhausted, giving up"
                    );
                    return Err(error);
                }

                let backoff = policy.backoff(attempt);
                warn!(
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %error,
                    "Retryable registry error, backing off"
                );

                sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}

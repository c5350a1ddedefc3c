//! Bounded retry with exponential backoff for transient storage failures.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::BookingError;

/// How many times a storage operation is attempted and how long to wait
/// between attempts. Delay doubles per retry (by `multiplier`), capped at
/// `max_delay`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first. Zero is treated as one.
    pub max_attempts: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Delay before retry number `retry` (0-based).
    pub fn delay_for_retry(&self, retry: usize) -> Duration {
        let exp = i32::try_from(retry).unwrap_or(i32::MAX);
        let delay_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exp);
        let delay = Duration::from_millis(delay_ms.min(u64::MAX as f64) as u64);
        delay.min(self.max_delay)
    }
}

/// Run `operation` until it succeeds, fails with a non-transient error, or
/// the attempt budget is spent. Only [`BookingError::Transient`] is retried.
pub async fn retry_transient<F, Fut, T>(
    policy: &RetryPolicy,
    op_name: &str,
    mut operation: F,
) -> Result<T, BookingError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BookingError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(op = op_name, attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if err.is_transient() && attempt < max_attempts => {
                let delay = policy.delay_for_retry(attempt - 1);
                warn!(
                    op = op_name,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient storage failure, retrying"
                );
                sleep(delay).await;
            }
            Err(err) => {
                if err.is_transient() {
                    warn!(op = op_name, attempt, error = %err, "Retries exhausted");
                }
                return Err(err);
            }
        }
    }
}

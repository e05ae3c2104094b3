//! Bounded retry wrapper

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::errors::{StepError, StepFailure};

/// Upper bound for a single backoff delay
const MAX_BACKOFF_MS: u64 = 60_000;

/// Errors that know whether another attempt may succeed
pub trait Retryable: fmt::Display {
    fn is_retryable(&self) -> bool;
}

impl Retryable for StepError {
    fn is_retryable(&self) -> bool {
        StepError::is_retryable(self)
    }
}

impl Retryable for StepFailure {
    fn is_retryable(&self) -> bool {
        StepFailure::is_retryable(self)
    }
}

/// Last result of a retried operation and how many retries it took
#[derive(Debug)]
pub struct RetryOutcome<T, E = StepError> {
    pub result: Result<T, E>,
    pub retries: u32,
}

impl<T, E> RetryOutcome<T, E> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// `max_retries` retries are spent.
///
/// The closure receives the zero-based attempt number. The delay before
/// retry `n` is `backoff * 2^(n-1)`, capped at 60 seconds.
pub async fn with_retry<T, E, F, Fut>(
    max_retries: u32,
    backoff: Duration,
    mut operation: F,
) -> RetryOutcome<T, E>
where
    E: Retryable,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        match operation(attempt).await {
            Ok(value) => {
                return RetryOutcome {
                    result: Ok(value),
                    retries: attempt,
                }
            }
            Err(err) if attempt < max_retries && err.is_retryable() => {
                attempt += 1;
                let delay = backoff_delay(backoff, attempt);
                warn!(
                    "Attempt {} failed, retrying after {}ms: {}",
                    attempt,
                    delay.as_millis(),
                    err
                );
                if !delay.is_zero() {
                    sleep(delay).await;
                }
            }
            Err(err) => {
                debug!(retries = attempt, error = %err, "giving up");
                return RetryOutcome {
                    result: Err(err),
                    retries: attempt,
                };
            }
        }
    }
}

/// Exponential backoff: `base * 2^(retry-1)`, capped at 60 seconds
pub fn backoff_delay(base: Duration, retry: u32) -> Duration {
    let base_ms = base.as_millis().min(u128::from(u64::MAX)) as u64;
    let multiplier = 2u64.saturating_pow(retry.saturating_sub(1));
    Duration::from_millis(base_ms.saturating_mul(multiplier).min(MAX_BACKOFF_MS))
}

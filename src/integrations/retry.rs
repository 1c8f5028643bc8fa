//! Retry with exponential backoff for Jira fetches
//!
//! Transient search failures (connection resets, 5xx, rate limits) are retried
//! inside a poll cycle before the cycle gives up and reports an empty change
//! set. Publishing never goes through here: failed events are dropped.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Backoff policy
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,

    /// Delay before the first retry
    pub initial_backoff: Duration,

    /// Upper bound for any single delay, including server-requested ones
    pub max_backoff: Duration,

    /// Growth factor between consecutive delays
    pub multiplier: f64,

    /// Spread delays by up to 25%
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::for_fetch(2)
    }
}

impl RetryConfig {
    /// Policy for the search request. Delays stay well under a typical poll
    /// interval so a flaky Jira does not stall the loop for long.
    pub fn for_fetch(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: true,
        }
    }

    /// Delay before retry number `attempt` (zero-based)
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = base.min(self.max_backoff.as_secs_f64());

        let secs = if self.jitter {
            capped * (1.0 + rand_jitter() * 0.25)
        } else {
            capped
        };

        Duration::from_secs_f64(secs)
    }
}

/// Cheap 0.0..1.0 jitter source from the clock's sub-second nanos
fn rand_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    f64::from(nanos % 1000) / 1000.0
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    /// Retry after a server-provided delay (Retry-After)
    RetryAfter(Duration),
    NoRetry,
}

/// Errors that know whether they are transient
pub trait RetryableError {
    fn retry_decision(&self) -> RetryDecision;
}

/// Run `operation` until it succeeds, fails permanently, or the retry budget
/// is spent. Returns the last error in the latter two cases.
pub async fn with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError + std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        let backoff = match err.retry_decision() {
            RetryDecision::NoRetry => {
                debug!(
                    operation = operation_name,
                    attempt,
                    error = %err,
                    "Permanent failure, not retrying"
                );
                return Err(err);
            }
            _ if attempt >= config.max_retries => {
                warn!(
                    operation = operation_name,
                    attempts = attempt + 1,
                    error = %err,
                    "Giving up after retries"
                );
                return Err(err);
            }
            RetryDecision::RetryAfter(d) => d.min(config.max_backoff),
            RetryDecision::Retry => config.backoff_duration(attempt),
        };

        warn!(
            operation = operation_name,
            attempt = attempt + 1,
            max_attempts = config.max_retries + 1,
            backoff_secs = backoff.as_secs_f64(),
            error = %err,
            "Transient failure, retrying"
        );

        sleep(backoff).await;
        attempt += 1;
    }
}

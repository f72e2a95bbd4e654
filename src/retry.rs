//! Retry policy with randomized exponential backoff
//!
//! Wraps any fallible async operation:
//! - Attempts: bounded by `max_attempts` (default 3)
//! - Delay before retry `n`: uniform in `[min, min(max, min * 2^(n-1)))`
//! - Defaults: 1s minimum, 20s maximum
//! - The last underlying error is surfaced unchanged once attempts run out

use crate::errors::{RagError, Result};
use rand::Rng;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Default maximum number of attempts (first try included)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default minimum backoff delay (1 second)
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_secs(1);

/// Default maximum backoff delay (20 seconds)
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(20);

/// Immutable retry parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Lower bound of every backoff delay
    pub min_delay: Duration,

    /// Upper bound of every backoff delay
    pub max_delay: Duration,

    /// Total attempts, including the first one
    pub max_attempts: u32,

    /// Optional ceiling on total elapsed time across all attempts
    pub deadline: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay: DEFAULT_MIN_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            deadline: None,
        }
    }
}

/// Predicate deciding whether an error is worth another attempt
pub type RetryClassifier = Arc<dyn Fn(&RagError) -> bool + Send + Sync>;

/// Retry policy: config plus a pluggable error classifier
#[derive(Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    classifier: RetryClassifier,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Policy that retries transient errors only
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            classifier: Arc::new(RagError::is_transient),
        }
    }

    /// Policy that retries on any error whatsoever
    pub fn unconditional(config: RetryConfig) -> Self {
        Self::new(config).with_classifier(|_| true)
    }

    /// Replace the retry classifier
    pub fn with_classifier<C>(mut self, classifier: C) -> Self
    where
        C: Fn(&RagError) -> bool + Send + Sync + 'static,
    {
        self.classifier = Arc::new(classifier);
        self
    }

    /// Execute operation with retry logic
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute_cancellable(&CancellationToken::new(), operation)
            .await
    }

    /// Execute operation with retry logic, aborting with [`RagError::Cancelled`]
    /// as soon as `token` fires (mid-request or mid-backoff).
    ///
    /// A configured deadline also bounds an attempt that is still running:
    /// once it passes, the previous attempt's error is returned, or a
    /// transient "deadline exceeded" error if no attempt has finished yet.
    pub async fn execute_cancellable<F, Fut, T>(
        &self,
        token: &CancellationToken,
        mut operation: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let deadline_at = self.config.deadline.map(|deadline| started + deadline);
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;
        let mut last_error: Option<RagError> = None;

        loop {
            attempt += 1;

            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(RagError::Cancelled),
                _ = sleep_until(deadline_at.unwrap_or(started)), if deadline_at.is_some() => {
                    return Err(self.deadline_exceeded(attempt, last_error));
                }
                result = operation() => result,
            };

            let error = match outcome {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !(self.classifier)(&error) {
                debug!(attempt, error = %error, "error is not retryable");
                return Err(error);
            }

            if attempt >= max_attempts {
                warn!(attempts = attempt, error = %error, "retries exhausted");
                return Err(error);
            }

            let delay = self.backoff_delay(attempt);

            if let Some(deadline) = self.config.deadline {
                if started.elapsed() + delay > deadline {
                    warn!(
                        attempts = attempt,
                        deadline_ms = deadline.as_millis() as u64,
                        error = %error,
                        "next retry would exceed deadline"
                    );
                    return Err(error);
                }
            }

            debug!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "retrying after backoff"
            );
            last_error = Some(error);

            tokio::select! {
                biased;
                _ = token.cancelled() => return Err(RagError::Cancelled),
                _ = sleep(delay) => {}
            }
        }
    }

    fn deadline_exceeded(&self, attempt: u32, last_error: Option<RagError>) -> RagError {
        let deadline_ms = self.config.deadline.unwrap_or_default().as_millis() as u64;
        warn!(attempt, deadline_ms, "deadline passed while an attempt was in flight");

        last_error.unwrap_or_else(|| RagError::Transient {
            message: format!("deadline of {}ms exceeded", deadline_ms),
        })
    }

    /// Delay to wait after `failed_attempts` consecutive failures (>= 1)
    pub fn backoff_delay(&self, failed_attempts: u32) -> Duration {
        let lower = self.config.min_delay.min(self.config.max_delay);
        let upper = self.backoff_ceiling(failed_attempts);

        if upper <= lower {
            return lower;
        }

        let nanos = rand::thread_rng().gen_range(lower.as_nanos() as u64..upper.as_nanos() as u64);
        Duration::from_nanos(nanos)
    }

    /// Exclusive upper bound of the delay after `failed_attempts` failures
    fn backoff_ceiling(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1).min(31);
        self.config
            .min_delay
            .saturating_mul(1u32 << exponent)
            .min(self.config.max_delay)
    }

    /// Smallest total backoff an always-failing operation can incur
    pub fn min_total_wait_time(&self) -> Duration {
        (1..self.config.max_attempts.max(1))
            .map(|_| self.config.min_delay.min(self.config.max_delay))
            .sum()
    }

    /// Largest total backoff an always-failing operation can incur
    pub fn max_total_wait_time(&self) -> Duration {
        (1..self.config.max_attempts.max(1))
            .map(|attempt| self.backoff_ceiling(attempt).max(self.config.min_delay.min(self.config.max_delay)))
            .sum()
    }

    /// Get retry configuration
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

//! Shared retry policy for rate-limited document service calls.
//!
//! Both the range identifier and the field extractor hit the same
//! rate-limited backend, so they share one [`RetryPolicy`] value object
//! instead of re-implementing a sleep loop at each call site. The delay
//! doubles per attempt (`base, 2·base, 4·base, …`) up to a fixed attempt
//! bound; exceeding the bound surfaces
//! [`PipelineError::RateLimitExceeded`].
//!
//! Only the transient [`PipelineError::RateLimited`] signal is retried.
//! Every other error surfaces immediately — a malformed response or an auth
//! failure does not get better by waiting.
//!
//! Sleeping goes through the [`Sleeper`] trait so tests can observe the
//! delay sequence without real waiting.

use crate::error::PipelineError;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Clock abstraction over `tokio::time::sleep`.
///
/// The pipeline's throttle and backoff delays all go through this seam;
/// tests substitute a recording implementation.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real clock: delegates to `tokio::time::sleep`.
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Exponential-backoff retry policy for 429-class responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first call. Must be >= 1.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles for each subsequent retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    /// 5 attempts with a 5 s base delay: 5 s → 10 s → 20 s → 40 s.
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay applied after failed attempt `attempt` (0-indexed).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }

    /// Run `op`, retrying on [`PipelineError::RateLimited`] with doubling
    /// backoff until `max_attempts` is exhausted.
    pub async fn run<T, F, Fut>(
        &self,
        sleeper: &dyn Sleeper,
        mut op: F,
    ) -> Result<T, PipelineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PipelineError>>,
    {
        for attempt in 0..self.max_attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(PipelineError::RateLimited { detail }) => {
                    if attempt + 1 == self.max_attempts {
                        warn!(
                            attempts = self.max_attempts,
                            "rate limit persisted through final attempt"
                        );
                        return Err(PipelineError::RateLimitExceeded {
                            attempts: self.max_attempts,
                        });
                    }
                    let delay = self.delay_after(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        %detail,
                        "rate limited, backing off"
                    );
                    sleeper.sleep(delay).await;
                }
                Err(other) => return Err(other),
            }
        }

        // Reached only with max_attempts == 0, which the config rejects.
        Err(PipelineError::RateLimitExceeded {
            attempts: self.max_attempts,
        })
    }
}

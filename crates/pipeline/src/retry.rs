//! Backoff schedule for page fetches that fail transiently.
//!
//! Only [`SourceError::Transient`](crate::source::SourceError::Transient)
//! is retried. The schedule is deterministic: a sweep is a single sequential
//! reader, so there is no herd of clients to spread out.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How a failed page fetch is retried before the sweep gives up on the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt; 0 gives up on the first error.
    pub max_retries: u32,
    /// Wait before the first retry.
    pub initial_delay: Duration,
    /// Factor applied to the wait for every further retry (1 = constant).
    pub multiplier: u32,
    /// Upper bound for any single wait.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(200),
            multiplier: 2,
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Give up on the first failure.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Retry `max_retries` times, waiting `delay` before each retry.
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay: delay,
            multiplier: 1,
            max_delay: delay,
        }
    }

    /// Waits before each allowed retry, in order. Ends when retries run out.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_retries).map(move |n| self.delay_before(n))
    }

    fn delay_before(&self, n: u32) -> Duration {
        let factor = self.multiplier.max(1).saturating_pow(n);
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

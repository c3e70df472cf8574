//! Bounded retry with exponential backoff.

use crate::models::GenofetchError;
use std::time::Duration;

/// Decision logic for retrying transient external failures.
///
/// Attempts are numbered from 1. The delay before attempt `n + 1` is
/// `base_delay * 2^(n-1)` plus a fixed inter-attempt pause that keeps a
/// burst of retries from hammering a remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum attempts per operation.
    pub max_attempts: u32,
    /// Exponential backoff base.
    pub base_delay: Duration,
    /// Fixed pause added to every backoff delay.
    pub pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            pause: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Whether another attempt should follow `attempt` failing with `error`.
    ///
    /// Only transient errors are retried; permanent input problems, local
    /// IO failures, and unexpected errors surface immediately.
    pub fn should_retry(&self, attempt: u32, error: &GenofetchError) -> bool {
        attempt < self.max_attempts && error.is_retryable()
    }

    /// Delay to sleep after `attempt` failed.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        // Exponent capped so pathological attempt counts cannot overflow.
        let exp = attempt.saturating_sub(1).min(10);
        self.base_delay * 2u32.pow(exp) + self.pause
    }
}

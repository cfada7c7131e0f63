//! Retry budget and backoff delays for failed attempts.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Attempt budget and backoff-delay function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of attempts per task per batch
    pub max_retries: u32,

    /// Delay after the first failed attempt, in milliseconds
    pub base_delay_ms: u64,

    /// Double the delay after each further failure
    pub exponential_backoff: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 2000,
            exponential_backoff: true,
        }
    }
}

impl RetryPolicy {
    /// Create a new policy.
    pub fn new(max_retries: u32, base_delay: Duration, exponential_backoff: bool) -> Self {
        Self {
            max_retries,
            base_delay_ms: u64::try_from(base_delay.as_millis()).unwrap_or(u64::MAX),
            exponential_backoff,
        }
    }

    /// Policy that makes a single attempt and never waits.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, false)
    }

    /// Delay to wait after the given failed attempt (1-based).
    ///
    /// Returns `None` for attempt 0. Saturates instead of overflowing.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 {
            return None;
        }

        let base = Duration::from_millis(self.base_delay_ms);
        if !self.exponential_backoff {
            return Some(base);
        }

        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        Some(base.saturating_mul(factor))
    }
}

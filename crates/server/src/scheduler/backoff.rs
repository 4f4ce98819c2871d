//! Retry delays for overloaded lookups.

use std::time::Duration;

/// Exponential backoff: the first retry is immediate, then `base`, `2 * base`,
/// `4 * base`, ... capped at `cap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base: Duration,
    pub cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { base: Duration::from_secs(5), cap: Duration::from_secs(300) }
    }
}

impl RetryPolicy {
    /// Delay before the retry that follows `attempts` earlier overloaded responses.
    pub fn delay_for(&self, attempts: u32) -> Duration {
        if attempts == 0 {
            return Duration::ZERO;
        }
        2u32.checked_pow(attempts - 1)
            .and_then(|factor| self.base.checked_mul(factor))
            .map_or(self.cap, |delay| delay.min(self.cap))
    }
}

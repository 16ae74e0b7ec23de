//! Retry policy for transient sync failures.
//!
//! Delays grow exponentially from a base, are capped, and carry random
//! jitter so a fleet of devices coming back online does not hammer a
//! peer in lockstep.

use std::time::Duration;

/// Jitter added to every delay, 0..=500ms.
const JITTER_MS: u64 = 500;

/// Exponential backoff schedule for retrying a failed sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay after the first failed attempt.
    pub base: Duration,
    /// Upper bound on any single delay (before jitter).
    pub cap: Duration,
    /// Attempts before the operation is reported as failed.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(60),
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with explicit parameters.
    pub fn new(base: Duration, cap: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            cap,
            max_attempts,
        }
    }

    /// Delay to sleep after the given failed attempt (1-based).
    ///
    /// Formula: `min(cap, base * 2^(attempt - 1)) + random(0..=500ms)`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1);
        let factor = 1u64.checked_shl(exp).unwrap_or(u64::MAX);
        let base_ms = self.base.as_millis().min(u128::from(u64::MAX)) as u64;
        let scaled = Duration::from_millis(base_ms.saturating_mul(factor));
        scaled.min(self.cap) + Duration::from_millis(random_jitter_ms())
    }

    /// Whether the given attempt count has used up the budget.
    pub fn is_exhausted(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }
}

/// Generate random jitter between 0 and 500 milliseconds.
fn random_jitter_ms() -> u64 {
    let mut bytes = [0u8; 8];
    getrandom::getrandom(&mut bytes).expect("getrandom failed");
    let random = u64::from_le_bytes(bytes);
    random % (JITTER_MS + 1)
}

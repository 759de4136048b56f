//! Failure counting and backoff for the remote tiers

use std::time::Duration;

use rand::Rng;

/// How failures are counted and spaced out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Failed attempts after which the pipeline stops calling out
    pub max_attempts: u32,
    /// Delay before the first retry (doubles each attempt)
    pub base_delay: Duration,
    /// Maximum delay cap
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

/// Consecutive failed remote attempts since the last primary success
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    pub attempts: u32,
}

impl RetryState {
    pub const fn record_failure(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
    }

    pub const fn reset(&mut self) {
        self.attempts = 0;
    }

    #[must_use]
    pub const fn exhausted(&self, policy: &RetryPolicy) -> bool {
        self.attempts >= policy.max_attempts
    }
}

/// Whether an HTTP status is worth retrying later
#[must_use]
pub fn is_recoverable(status: u16) -> bool {
    status == 408 || status == 429 || (500..600).contains(&status)
}

/// Delay before calling the primary tier again after `attempt` failures
///
/// `min(base_delay * 2^(attempt - 1) + jitter, max_delay)` with 0-25% jitter.
/// Zero failures means no delay.
#[must_use]
pub fn delay_for_attempt(policy: &RetryPolicy, attempt: u32) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let base = policy
        .base_delay
        .saturating_mul(2u32.saturating_pow(attempt - 1))
        .min(policy.max_delay);

    let jitter = base.mul_f64(rand::thread_rng().gen_range(0.0..0.25));

    (base + jitter).min(policy.max_delay)
}

//! Retry backoff policy.

use std::time::Duration;

/// Computes exponential backoff delays for transient failures.
///
/// The policy is pure arithmetic: `delay(attempt) = min(base * 2^attempt,
/// max)`. Whether a failure qualifies for retry at all is decided by
/// [`crate::CoreError::is_retryable`]; constraint and timeout failures
/// bypass retry entirely.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// First delay; doubled on each attempt.
    pub base_delay: Duration,
    /// Upper bound on a single delay.
    pub max_delay: Duration,
    /// Fixed cooldown after a confirmed deadlock.
    pub deadlock_cooldown: Duration,
}

impl RetryPolicy {
    /// Creates a policy from explicit delays.
    #[must_use]
    pub fn new(base_delay: Duration, max_delay: Duration, deadlock_cooldown: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            deadlock_cooldown,
        }
    }

    /// Returns the backoff delay for the given zero-based attempt.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_millis().max(1) as u64;
        let cap = (self.max_delay.as_millis() as u64).max(base);

        let mut delay = base;
        for _ in 0..attempt {
            delay = delay.saturating_mul(2).min(cap);
        }
        Duration::from_millis(delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            deadlock_cooldown: Duration::from_millis(500),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn policy(base_ms: u64, max_ms: u64) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_millis(base_ms),
            Duration::from_millis(max_ms),
            Duration::from_millis(1),
        )
    }

    #[test]
    fn first_attempt_gets_base_delay() {
        assert_eq!(policy(100, 5000).delay(0), Duration::from_millis(100));
    }

    #[test]
    fn delay_doubles_per_attempt() {
        let p = policy(100, 5000);
        assert_eq!(p.delay(1), Duration::from_millis(200));
        assert_eq!(p.delay(2), Duration::from_millis(400));
        assert_eq!(p.delay(3), Duration::from_millis(800));
    }

    #[test]
    fn delay_is_capped() {
        let p = policy(100, 500);
        assert_eq!(p.delay(10), Duration::from_millis(500));
    }

    #[test]
    fn huge_attempt_counts_do_not_overflow() {
        let p = policy(1000, 60_000);
        assert_eq!(p.delay(u32::MAX), Duration::from_millis(60_000));
    }

    proptest! {
        #[test]
        fn delay_is_monotone_and_bounded(
            base_ms in 1u64..1000,
            max_ms in 1u64..60_000,
            attempt in 0u32..20,
        ) {
            let p = policy(base_ms, max_ms);
            let current = p.delay(attempt);
            let next = p.delay(attempt + 1);
            prop_assert!(next >= current);
            prop_assert!(current <= Duration::from_millis(max_ms.max(base_ms)));
        }
    }
}

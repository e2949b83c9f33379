//! Retry backoff policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exponential backoff configuration for failed step executions.
///
/// The delay before a job becomes claimable again is
/// `base_delay * 2^attempts`, capped at `max_delay`. With the default
/// one-minute base this yields 2 min, 4 min, 8 min... for attempts 1, 2, 3.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Base delay multiplied by the exponential factor.
    pub base_delay: Duration,
    /// Ceiling on the computed delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl RetryPolicy {
    /// Delay before the next claim, given the failed-attempt count
    /// (1-indexed: the first failure passes `attempts == 1`).
    pub fn delay_for_attempt(&self, attempts: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let max_ms = self.max_delay.as_millis() as f64;

        // Exponent is saturated so pathological attempt counts cannot
        // overflow the multiplication.
        let exp = 2_f64.powi(attempts.min(30) as i32);
        Duration::from_millis((base_ms * exp).min(max_ms) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn doubles_per_attempt_from_two_minutes() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(120));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(240));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(480));
    }

    #[test]
    fn delay_is_capped() {
        let policy = RetryPolicy {
            base_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(600),
        };
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(600));
    }

    proptest! {
        #[test]
        fn backoff_is_strictly_increasing_below_the_cap(attempts in 1u32..12) {
            let policy = RetryPolicy::default();
            prop_assert!(
                policy.delay_for_attempt(attempts + 1) > policy.delay_for_attempt(attempts)
            );
        }

        #[test]
        fn backoff_never_exceeds_the_cap(attempts in 0u32..1000) {
            let policy = RetryPolicy::default();
            prop_assert!(policy.delay_for_attempt(attempts) <= policy.max_delay);
        }
    }
}

//! Retry policy with capped exponential backoff.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::duration_serde;

/// Retry policy applied to each provider within one dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Tries per provider, including the first
    pub max_attempts: u32,

    /// Base delay, doubled per attempt
    #[serde(with = "duration_serde")]
    pub base_delay: Duration,

    /// Cap on the exponential part of the delay
    #[serde(with = "duration_serde")]
    pub max_delay: Duration,

    /// Upper bound (exclusive) of the random jitter added to each delay
    #[serde(with = "duration_serde")]
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(5000),
            max_jitter: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Policy with no waiting between tries.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_jitter: Duration::ZERO,
        }
    }

    /// `min(base * 2^attempt, max)` for a 1-based attempt number.
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Full delay for a 1-based attempt number, jitter included.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay_for(attempt) + self.jitter()
    }

    fn jitter(&self) -> Duration {
        let bound = self.max_jitter.as_millis() as u64;
        if bound == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..bound))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(5));
        assert_eq!(policy.max_jitter, Duration::from_millis(200));
    }

    #[test]
    fn test_exponential_growth_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.base_delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.base_delay_for(2), Duration::from_millis(4000));
        assert_eq!(policy.base_delay_for(3), Duration::from_millis(5000));
        assert_eq!(policy.base_delay_for(40), Duration::from_millis(5000));
    }

    #[test]
    fn test_jitter_bounds() {
        let policy = RetryPolicy::default();
        for _ in 0..100 {
            let delay = policy.delay_for_attempt(1);
            assert!(delay >= Duration::from_millis(2000));
            assert!(delay < Duration::from_millis(2200));
        }
    }

    #[test]
    fn test_immediate_has_no_delay() {
        let policy = RetryPolicy::immediate(3);
        assert_eq!(policy.delay_for_attempt(1), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(2), Duration::ZERO);
    }

    #[test]
    fn test_deserialize_humantime() {
        let policy: RetryPolicy =
            serde_yaml::from_str("max_attempts: 5\nbase_delay: 250ms\nmax_jitter: 0s").unwrap();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay, Duration::from_millis(250));
        assert_eq!(policy.max_delay, Duration::from_secs(5));
        assert_eq!(policy.max_jitter, Duration::ZERO);
    }
}

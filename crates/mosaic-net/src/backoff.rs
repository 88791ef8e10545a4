use std::time::Duration;

use rand::Rng;

use mosaic_shared::constants::{RECONNECT_BASE_MS, RECONNECT_MAX_ATTEMPTS, RECONNECT_MAX_MS};

/// Exponential reconnect schedule for the live channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
    pub max_attempts: u32,
    /// Pick each delay uniformly from `[d/2, d]` instead of `d`.
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(RECONNECT_BASE_MS),
            max: Duration::from_millis(RECONNECT_MAX_MS),
            max_attempts: RECONNECT_MAX_ATTEMPTS,
            jitter: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    attempt: u32,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    /// Delay before the next attempt, or `None` once attempts are exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.policy.max_attempts {
            return None;
        }

        let factor = 1u32.checked_shl(self.attempt).unwrap_or(u32::MAX);
        let delay = self
            .policy
            .base
            .checked_mul(factor)
            .unwrap_or(self.policy.max)
            .min(self.policy.max);

        self.attempt += 1;

        if !self.policy.jitter {
            return Some(delay);
        }

        let hi = delay.as_millis() as u64;
        let lo = hi / 2;
        Some(Duration::from_millis(rand::thread_rng().gen_range(lo..=hi)))
    }

    /// Number of delays handed out since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(jitter: bool) -> BackoffPolicy {
        BackoffPolicy {
            base: Duration::from_millis(100),
            max: Duration::from_millis(1000),
            max_attempts: 6,
            jitter,
        }
    }

    #[test]
    fn test_doubles_until_cap() {
        let mut backoff = Backoff::new(policy(false));
        let delays: Vec<u64> = std::iter::from_fn(|| backoff.next_delay())
            .map(|d| d.as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1000, 1000]);
        assert_eq!(backoff.attempt(), 6);
        assert!(backoff.next_delay().is_none());
    }

    #[test]
    fn test_reset_restarts_schedule() {
        let mut backoff = Backoff::new(policy(false));
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn test_jitter_within_bounds() {
        let mut backoff = Backoff::new(policy(true));
        for expected in [100u64, 200, 400, 800, 1000, 1000] {
            let d = backoff.next_delay().unwrap().as_millis() as u64;
            assert!(d >= expected / 2 && d <= expected, "{d} outside [{}, {expected}]", expected / 2);
        }
    }

    #[test]
    fn test_huge_attempt_count_saturates() {
        let mut backoff = Backoff::new(BackoffPolicy {
            max_attempts: 64,
            jitter: false,
            ..policy(false)
        });
        let last = std::iter::from_fn(|| backoff.next_delay()).last().unwrap();
        assert_eq!(last, Duration::from_millis(1000));
    }
}

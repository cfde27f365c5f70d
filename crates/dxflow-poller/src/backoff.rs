//! Exponential backoff between failed fetches

use dxflow_status::RetryPolicy;
use rand::Rng;
use std::time::Duration;

/// Backoff state for one poller
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    failures: u32,
}

impl Backoff {
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            failures: 0,
        }
    }

    /// Record a failure and return the delay before the next attempt
    ///
    /// Returns `None` once `max_attempts` fetches have failed in a row.
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.failures = self.failures.saturating_add(1);
        if self.failures >= self.policy.max_attempts {
            return None;
        }

        let exponent = i32::try_from(self.failures - 1).unwrap_or(i32::MAX);
        #[allow(clippy::cast_precision_loss)]
        let base = self.policy.initial_backoff_ms as f64 * self.policy.multiplier.powi(exponent);
        #[allow(clippy::cast_precision_loss)]
        let capped = base.min(self.policy.max_backoff_ms as f64);

        let jittered = if self.policy.jitter > 0.0 {
            let spread = capped * self.policy.jitter;
            capped + rand::thread_rng().gen_range(-spread..=spread)
        } else {
            capped
        };

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Some(Duration::from_millis(jittered.max(0.0).round() as u64))
    }

    /// Consecutive failures so far
    #[inline]
    #[must_use]
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Forget failures after a successful fetch
    pub fn reset(&mut self) {
        self.failures = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            initial_backoff_ms: 100,
            max_backoff_ms: 300,
            multiplier: 2.0,
            jitter: 0.0,
        }
    }

    #[test]
    fn grows_then_caps_then_gives_up() {
        let mut backoff = Backoff::new(policy());
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(100)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(200)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(300)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(300)));
        assert_eq!(backoff.next_delay(), None);
        assert_eq!(backoff.failures(), 5);
    }

    #[test]
    fn single_attempt_never_retries() {
        let mut backoff = Backoff::new(RetryPolicy::no_retry());
        assert_eq!(backoff.next_delay(), None);
    }

    #[test]
    fn reset_restarts_sequence() {
        let mut backoff = Backoff::new(policy());
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn jitter_stays_within_spread() {
        let mut backoff = Backoff::new(RetryPolicy {
            jitter: 0.5,
            ..policy()
        });
        let delay = backoff.next_delay().unwrap();
        assert!(delay >= Duration::from_millis(50));
        assert!(delay <= Duration::from_millis(150));
    }
}

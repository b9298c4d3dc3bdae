//! Retry policy with fixed or exponential backoff.

use std::time::Duration;

/// Default ceiling for exponential delays.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);

/// Retry behaviour for one provider's attempt loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Double the delay for every further retry.
    pub exponential: bool,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            exponential: true,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Set the maximum number of attempts (at least one).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Set the base delay.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Toggle exponential backoff.
    pub fn with_exponential(mut self, exponential: bool) -> Self {
        self.exponential = exponential;
        self
    }

    /// Set the delay ceiling.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    ///
    /// Exponential: `base * 2^(attempt-1)`, capped at `max_delay`.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        if !self.exponential {
            return self.base_delay;
        }
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(2u32.pow(exponent))
            .min(self.max_delay)
    }

    /// Whether another attempt is allowed after `attempt` failed.
    pub fn has_attempts_left(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_delay_calculation() {
        let policy = RetryPolicy::default().with_base_delay(Duration::from_millis(100));

        assert_eq!(policy.next_delay(1), Duration::from_millis(100));
        assert_eq!(policy.next_delay(2), Duration::from_millis(200));
        assert_eq!(policy.next_delay(3), Duration::from_millis(400));
        assert_eq!(policy.next_delay(4), Duration::from_millis(800));
    }

    #[test]
    fn test_delay_capped_at_ceiling() {
        let policy = RetryPolicy::default()
            .with_base_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(3));

        assert_eq!(policy.next_delay(3), Duration::from_secs(3));
        assert_eq!(policy.next_delay(40), Duration::from_secs(3));
    }

    #[test]
    fn test_fixed_delay() {
        let policy = RetryPolicy::default()
            .with_exponential(false)
            .with_base_delay(Duration::from_millis(250));

        assert_eq!(policy.next_delay(1), Duration::from_millis(250));
        assert_eq!(policy.next_delay(5), Duration::from_millis(250));
    }

    #[test]
    fn test_single_attempt_has_no_retries() {
        let policy = RetryPolicy::single_attempt();
        assert!(!policy.has_attempts_left(1));
        assert_eq!(RetryPolicy::default().with_max_attempts(0).max_attempts, 1);
    }
}

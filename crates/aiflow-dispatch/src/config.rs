//! Dispatch configuration.

use std::time::Duration;

use crate::retry::{RetryPolicy, DEFAULT_MAX_DELAY};

/// Per-call dispatch settings.
///
/// Values loaded from the environment are clamped to their supported ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Attempts per provider (1-10)
    pub max_attempts: u32,
    /// Base delay between attempts (100ms-10s)
    pub retry_delay: Duration,
    /// Double the delay after each failed attempt
    pub exponential_backoff: bool,
    /// Ceiling for exponential delays
    pub max_retry_delay: Duration,
    /// Walk the fallback chain after the primary is exhausted
    pub enable_fallback: bool,
    /// Per-attempt timeout (1s-60s)
    pub timeout: Duration,
    /// Stop retrying a provider after this many timeouts in a row (0 = never)
    pub max_consecutive_timeouts: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_millis(1000),
            exponential_backoff: true,
            max_retry_delay: DEFAULT_MAX_DELAY,
            enable_fallback: true,
            timeout: Duration::from_millis(30_000),
            max_consecutive_timeouts: 2,
        }
    }
}

impl DispatchConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_attempts: env_parse("MAX_RETRIES", defaults.max_attempts).clamp(1, 10),
            retry_delay: Duration::from_millis(
                env_parse("RETRY_DELAY_MS", 1000u64).clamp(100, 10_000),
            ),
            exponential_backoff: env_bool("EXPONENTIAL_BACKOFF", defaults.exponential_backoff),
            max_retry_delay: Duration::from_millis(
                env_parse("RETRY_MAX_DELAY_MS", 10_000u64).clamp(100, 60_000),
            ),
            enable_fallback: env_bool("ENABLE_FALLBACK", defaults.enable_fallback),
            timeout: Duration::from_millis(env_parse("TIMEOUT_MS", 30_000u64).clamp(1000, 60_000)),
            max_consecutive_timeouts: env_parse(
                "MAX_CONSECUTIVE_TIMEOUTS",
                defaults.max_consecutive_timeouts,
            ),
        }
    }

    /// Retry policy derived from these settings.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(self.max_attempts)
            .with_base_delay(self.retry_delay)
            .with_exponential(self.exponential_backoff)
            .with_max_delay(self.max_retry_delay)
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_exponential_backoff(mut self, enabled: bool) -> Self {
        self.exponential_backoff = enabled;
        self
    }

    pub fn with_fallback(mut self, enabled: bool) -> Self {
        self.enable_fallback = enabled;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_consecutive_timeouts(mut self, limit: u32) -> Self {
        self.max_consecutive_timeouts = limit;
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

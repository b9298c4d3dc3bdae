//! Dispatch metrics.
//!
//! Provides standardized metrics for provider calls:
//! - Attempt counters by provider and outcome
//! - Latency histograms
//! - Fallback counters

use std::time::Duration;

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Provider attempts by provider and outcome.
    pub const ATTEMPTS_TOTAL: &str = "aiflow_dispatch_attempts_total";

    /// Provider call latency in seconds.
    pub const LATENCY_SECONDS: &str = "aiflow_dispatch_latency_seconds";

    /// Dispatches that moved past their first candidate.
    pub const FALLBACKS_TOTAL: &str = "aiflow_dispatch_fallbacks_total";

    /// Dispatches that ended with every candidate failed.
    pub const EXHAUSTED_TOTAL: &str = "aiflow_dispatch_exhausted_total";
}

/// Record one provider attempt.
pub fn record_attempt(provider: &str, outcome: &'static str, latency: Duration) {
    counter!(
        names::ATTEMPTS_TOTAL,
        "provider" => provider.to_string(),
        "outcome" => outcome
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "provider" => provider.to_string()
    )
    .record(latency.as_secs_f64());
}

/// Record a move to a non-primary candidate.
pub fn record_fallback(from: &str, to: &str) {
    counter!(
        names::FALLBACKS_TOTAL,
        "from" => from.to_string(),
        "to" => to.to_string()
    )
    .increment(1);
}

/// Record a fully exhausted chain.
pub fn record_exhausted(origin: &str) {
    counter!(names::EXHAUSTED_TOTAL, "origin" => origin.to_string()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::ATTEMPTS_TOTAL.contains("attempts"));
        assert!(names::LATENCY_SECONDS.contains("latency"));
        assert!(names::FALLBACKS_TOTAL.contains("fallbacks"));
    }
}

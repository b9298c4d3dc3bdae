//! Per-provider request statistics.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

/// Counters for one provider or model.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServiceStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// Running average over every attempt, in milliseconds
    pub average_latency_ms: f64,
    pub last_used: Option<DateTime<Utc>>,
}

impl ServiceStats {
    /// Fraction of attempts that succeeded, `None` before the first attempt.
    pub fn success_rate(&self) -> Option<f64> {
        if self.total_requests == 0 {
            None
        } else {
            Some(self.successful_requests as f64 / self.total_requests as f64)
        }
    }

    fn record(&mut self, success: bool, latency: Duration) {
        self.total_requests += 1;
        if success {
            self.successful_requests += 1;
        } else {
            self.failed_requests += 1;
        }
        let latency_ms = latency.as_secs_f64() * 1000.0;
        self.average_latency_ms +=
            (latency_ms - self.average_latency_ms) / self.total_requests as f64;
        self.last_used = Some(Utc::now());
    }
}

/// Shared stats table, mutated after every dispatch attempt.
///
/// Only reset by an explicit operator call.
#[derive(Debug, Default)]
pub struct StatsTracker {
    stats: RwLock<HashMap<String, ServiceStats>>,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_success(&self, provider: &str, latency: Duration) {
        self.record(provider, true, latency).await;
    }

    pub async fn record_failure(&self, provider: &str, latency: Duration) {
        self.record(provider, false, latency).await;
    }

    async fn record(&self, provider: &str, success: bool, latency: Duration) {
        let mut stats = self.stats.write().await;
        stats
            .entry(provider.to_string())
            .or_default()
            .record(success, latency);
    }

    pub async fn get(&self, provider: &str) -> Option<ServiceStats> {
        self.stats.read().await.get(provider).cloned()
    }

    pub async fn snapshot(&self) -> HashMap<String, ServiceStats> {
        self.stats.read().await.clone()
    }

    /// Clear one provider's stats, or all of them.
    pub async fn reset(&self, provider: Option<&str>) {
        let mut stats = self.stats.write().await;
        match provider {
            Some(p) => {
                stats.remove(p);
            }
            None => stats.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_running_average_and_counts() {
        let tracker = StatsTracker::new();
        tracker.record_success("a", Duration::from_millis(100)).await;
        tracker.record_failure("a", Duration::from_millis(300)).await;
        tracker.record_success("a", Duration::from_millis(200)).await;

        let stats = tracker.get("a").await.unwrap();
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.successful_requests, 2);
        assert_eq!(stats.failed_requests, 1);
        assert!((stats.average_latency_ms - 200.0).abs() < 1e-6);
        assert!(stats.last_used.is_some());
        assert!((stats.success_rate().unwrap() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_reset() {
        let tracker = StatsTracker::new();
        tracker.record_success("a", Duration::from_millis(1)).await;
        tracker.record_success("b", Duration::from_millis(1)).await;

        tracker.reset(Some("a")).await;
        assert!(tracker.get("a").await.is_none());
        assert!(tracker.get("b").await.is_some());

        tracker.reset(None).await;
        assert!(tracker.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_updates() {
        let tracker = std::sync::Arc::new(StatsTracker::new());
        let mut handles = Vec::new();
        for _ in 0..20 {
            let t = tracker.clone();
            handles.push(tokio::spawn(async move {
                t.record_success("p", Duration::from_millis(5)).await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(tracker.get("p").await.unwrap().total_requests, 20);
    }
}

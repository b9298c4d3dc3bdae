//! Provider health probing.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::Serialize;
use tracing::warn;

use crate::executor::ServiceExecutor;
use crate::stats::{ServiceStats, StatsTracker};

/// Default timeout for a single health probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Probe result for one provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
    pub provider: String,
    pub healthy: bool,
    pub response_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Share of recorded attempts that succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<ServiceStats>,
}

/// Probes registered executors and pairs the result with their stats.
pub struct HealthMonitor {
    targets: Vec<(String, Arc<dyn ServiceExecutor>)>,
    stats: Arc<StatsTracker>,
    probe_timeout: Duration,
}

impl HealthMonitor {
    pub fn new(stats: Arc<StatsTracker>) -> Self {
        Self {
            targets: Vec::new(),
            stats,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Add a probe target. Duplicate names (a model shared by two domains)
    /// are probed once.
    pub fn watch(&mut self, name: impl Into<String>, executor: Arc<dyn ServiceExecutor>) {
        let name = name.into();
        if !self.targets.iter().any(|(n, _)| *n == name) {
            self.targets.push((name, executor));
        }
    }

    pub fn stats(&self) -> &Arc<StatsTracker> {
        &self.stats
    }

    /// Probe every target concurrently.
    pub async fn check_all(&self) -> Vec<ProviderHealth> {
        join_all(self.targets.iter().map(|(name, executor)| self.probe(name, executor))).await
    }

    async fn probe(&self, name: &str, executor: &Arc<dyn ServiceExecutor>) -> ProviderHealth {
        let start = Instant::now();
        let result = tokio::time::timeout(self.probe_timeout, executor.health_check()).await;
        let response_time_ms = start.elapsed().as_millis() as u64;

        let error = match result {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.message),
            Err(_) => Some(format!(
                "health check timed out after {}ms",
                self.probe_timeout.as_millis()
            )),
        };
        if let Some(e) = &error {
            warn!(provider = %name, "Health check failed: {}", e);
        }

        let stats = self.stats.get(name).await;
        ProviderHealth {
            provider: name.to_string(),
            healthy: error.is_none(),
            response_time_ms,
            error,
            success_rate: stats.as_ref().and_then(ServiceStats::success_rate),
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use async_trait::async_trait;
    use serde_json::Value;

    struct Healthy;
    struct Broken;
    struct Hanging;

    #[async_trait]
    impl ServiceExecutor for Healthy {
        async fn execute(&self, _r: &Value) -> Result<Value, ProviderError> {
            Ok(Value::Null)
        }
    }

    #[async_trait]
    impl ServiceExecutor for Broken {
        async fn execute(&self, _r: &Value) -> Result<Value, ProviderError> {
            Ok(Value::Null)
        }
        async fn health_check(&self) -> Result<(), ProviderError> {
            Err(ProviderError::with_status("401 Unauthorized", 401))
        }
    }

    #[async_trait]
    impl ServiceExecutor for Hanging {
        async fn execute(&self, _r: &Value) -> Result<Value, ProviderError> {
            Ok(Value::Null)
        }
        async fn health_check(&self) -> Result<(), ProviderError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_check_all_reports_each_provider() {
        let stats = Arc::new(StatsTracker::new());
        stats.record_success("ok", Duration::from_millis(10)).await;

        let mut monitor =
            HealthMonitor::new(stats).with_probe_timeout(Duration::from_millis(50));
        monitor.watch("ok", Arc::new(Healthy));
        monitor.watch("ok", Arc::new(Broken));
        monitor.watch("broken", Arc::new(Broken));
        monitor.watch("hanging", Arc::new(Hanging));

        let report = monitor.check_all().await;
        assert_eq!(report.len(), 3);

        let ok = &report[0];
        assert!(ok.healthy);
        assert_eq!(ok.stats.as_ref().unwrap().total_requests, 1);
        assert_eq!(ok.success_rate, Some(1.0));

        let broken = &report[1];
        assert!(!broken.healthy);
        assert!(broken.error.as_ref().unwrap().contains("401"));

        let hanging = &report[2];
        assert!(!hanging.healthy);
        assert!(hanging.error.as_ref().unwrap().contains("timed out"));
    }
}

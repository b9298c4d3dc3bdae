//! Worker configuration.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use aiflow_dispatch::env_key;
use aiflow_queue::redis_store::DEFAULT_REDIS_URL;

use crate::error::WorkerError;

/// Job types served when `WORKER_JOB_TYPES` is unset.
pub const DEFAULT_JOB_TYPES: [&str; 2] = ["analysis", "generation"];

/// Which job store backs the consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobStoreKind {
    #[default]
    Redis,
    Memory,
}

impl FromStr for JobStoreKind {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => Err(WorkerError::config_error(format!("unknown JOB_STORE: {}", other))),
        }
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Job types this process consumes
    pub job_types: Vec<String>,
    /// Per-type concurrency ceilings (missing types use 1)
    pub max_jobs: HashMap<String, usize>,
    /// How long shutdown waits for in-flight handlers
    pub shutdown_timeout: Duration,
    /// Health/metrics server bind host
    pub health_host: String,
    /// Health/metrics server port
    pub health_port: u16,
    /// Expose Prometheus metrics at /metrics
    pub metrics_enabled: bool,
    pub job_store: JobStoreKind,
    pub redis_url: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            job_types: DEFAULT_JOB_TYPES.iter().map(|s| s.to_string()).collect(),
            max_jobs: HashMap::from([
                ("analysis".to_string(), 3),
                ("generation".to_string(), 1),
            ]),
            shutdown_timeout: Duration::from_secs(30),
            health_host: "0.0.0.0".to_string(),
            health_port: 8081,
            metrics_enabled: true,
            job_store: JobStoreKind::default(),
            redis_url: DEFAULT_REDIS_URL.to_string(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let job_types: Vec<String> = std::env::var("WORKER_JOB_TYPES")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|t| t.trim().to_lowercase())
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .filter(|types: &Vec<String>| !types.is_empty())
            .unwrap_or(defaults.job_types);

        let mut max_jobs = defaults.max_jobs;
        for job_type in &job_types {
            if let Some(limit) = std::env::var(format!("WORKER_MAX_JOBS_{}", env_key(job_type)))
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
            {
                max_jobs.insert(job_type.clone(), limit.max(1));
            }
        }

        Self {
            job_types,
            max_jobs,
            shutdown_timeout: Duration::from_secs(
                std::env::var("WORKER_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            health_host: std::env::var("HEALTH_HOST").unwrap_or(defaults.health_host),
            health_port: std::env::var("HEALTH_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.health_port),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
            job_store: std::env::var("JOB_STORE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
        }
    }

    /// Concurrency ceiling for `job_type`.
    pub fn max_jobs_for(&self, job_type: &str) -> usize {
        self.max_jobs.get(job_type).copied().unwrap_or(1)
    }

    pub fn with_max_jobs(mut self, job_type: impl Into<String>, limit: usize) -> Self {
        self.max_jobs.insert(job_type.into(), limit.max(1));
        self
    }

    pub fn with_job_types<I, S>(mut self, job_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.job_types = job_types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.max_jobs_for("analysis"), 3);
        assert_eq!(config.max_jobs_for("generation"), 1);
        assert_eq!(config.max_jobs_for("other"), 1);
        assert_eq!(config.health_port, 8081);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_job_store_kind_parse() {
        assert_eq!("memory".parse::<JobStoreKind>().unwrap(), JobStoreKind::Memory);
        assert_eq!(" Redis ".parse::<JobStoreKind>().unwrap(), JobStoreKind::Redis);
        assert!("postgres".parse::<JobStoreKind>().is_err());
    }

    #[test]
    fn test_from_env_reads_per_type_limits() {
        std::env::set_var("WORKER_JOB_TYPES", "analysis, video-render");
        std::env::set_var("WORKER_MAX_JOBS_VIDEO_RENDER", "4");
        std::env::set_var("WORKER_MAX_JOBS_ANALYSIS", "0");

        let config = WorkerConfig::from_env();

        std::env::remove_var("WORKER_JOB_TYPES");
        std::env::remove_var("WORKER_MAX_JOBS_VIDEO_RENDER");
        std::env::remove_var("WORKER_MAX_JOBS_ANALYSIS");

        assert_eq!(config.job_types, vec!["analysis", "video-render"]);
        assert_eq!(config.max_jobs_for("video-render"), 4);
        assert_eq!(config.max_jobs_for("analysis"), 1);
    }
}

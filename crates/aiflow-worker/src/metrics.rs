//! Prometheus metrics for the worker.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::error::{WorkerError, WorkerResult};

/// Install the Prometheus recorder.
pub fn init_metrics() -> WorkerResult<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| WorkerError::config_error(format!("metrics recorder: {}", e)))
}

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_CLAIMED_TOTAL: &str = "aiflow_jobs_claimed_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "aiflow_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "aiflow_jobs_failed_total";
    /// Notifications left pending because the consumer was at capacity
    pub const JOBS_DROPPED_TOTAL: &str = "aiflow_jobs_dropped_total";
    pub const JOBS_ACTIVE: &str = "aiflow_jobs_active";
    pub const STORE_ERRORS_TOTAL: &str = "aiflow_store_errors_total";
}

pub fn record_claimed(job_type: &str) {
    counter!(names::JOBS_CLAIMED_TOTAL, "type" => job_type.to_string()).increment(1);
}

pub fn record_completed(job_type: &str) {
    counter!(names::JOBS_COMPLETED_TOTAL, "type" => job_type.to_string()).increment(1);
}

pub fn record_failed(job_type: &str) {
    counter!(names::JOBS_FAILED_TOTAL, "type" => job_type.to_string()).increment(1);
}

pub fn record_dropped(job_type: &str) {
    counter!(names::JOBS_DROPPED_TOTAL, "type" => job_type.to_string()).increment(1);
}

pub fn set_active(job_type: &str, active: usize) {
    gauge!(names::JOBS_ACTIVE, "type" => job_type.to_string()).set(active as f64);
}

pub fn record_store_error(job_type: &str, status: &'static str) {
    counter!(
        names::STORE_ERRORS_TOTAL,
        "type" => job_type.to_string(),
        "status" => status
    )
    .increment(1);
}

//! Structured job logging and log-level mapping.

use aiflow_models::JobId;
use tracing::{error, info, warn, Span};

/// Map `LOG_LEVEL` (silent|error|warn|info|debug) to a filter directive level.
///
/// Unknown values fall back to `info`.
pub fn level_directive(level: &str) -> &'static str {
    match level.trim().to_lowercase().as_str() {
        "silent" | "off" => "off",
        "error" => "error",
        "warn" | "warning" => "warn",
        "debug" => "debug",
        "trace" => "trace",
        _ => "info",
    }
}

/// Job logger for structured logging with consistent formatting.
///
/// Every line carries `job_id` and `job_type`.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    job_type: String,
}

impl JobLogger {
    pub fn new(job_id: &JobId, job_type: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            job_type: job_type.to_string(),
        }
    }

    pub fn log_claimed(&self, active: usize, max: usize) {
        info!(
            job_id = %self.job_id,
            job_type = %self.job_type,
            active,
            max,
            "Job claimed"
        );
    }

    pub fn log_dropped(&self, active: usize, max: usize) {
        warn!(
            job_id = %self.job_id,
            job_type = %self.job_type,
            active,
            max,
            "At capacity, leaving job pending"
        );
    }

    pub fn log_completion(&self, elapsed_ms: u64) {
        info!(
            job_id = %self.job_id,
            job_type = %self.job_type,
            elapsed_ms,
            "Job completed"
        );
    }

    pub fn log_failure(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            job_type = %self.job_type,
            "Job failed: {}", message
        );
    }

    pub fn log_store_error(&self, status: &str, message: &str) {
        warn!(
            job_id = %self.job_id,
            job_type = %self.job_type,
            status,
            "Failed to write job status: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn job_type(&self) -> &str {
        &self.job_type
    }

    /// Span wrapping the handler invocation.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            job_type = %self.job_type
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_directive() {
        assert_eq!(level_directive("silent"), "off");
        assert_eq!(level_directive("WARN"), "warn");
        assert_eq!(level_directive("debug"), "debug");
        assert_eq!(level_directive("verbose"), "info");
    }

    #[test]
    fn test_job_logger_fields() {
        let job_id = JobId::from_string("job-1");
        let logger = JobLogger::new(&job_id, "analysis");
        assert_eq!(logger.job_id(), "job-1");
        assert_eq!(logger.job_type(), "analysis");
    }
}

//! Job store error types.

use aiflow_models::JobStatus;
use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job {job_id}: cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Update failed: {0}")]
    UpdateFailed(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QueueError {
    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::ConnectionFailed(msg.into())
    }

    pub fn job_not_found(job_id: impl Into<String>) -> Self {
        Self::JobNotFound(job_id.into())
    }

    pub fn invalid_transition(job_id: impl Into<String>, from: JobStatus, to: JobStatus) -> Self {
        Self::InvalidTransition {
            job_id: job_id.into(),
            from,
            to,
        }
    }

    pub fn update_failed(msg: impl Into<String>) -> Self {
        Self::UpdateFailed(msg.into())
    }
}

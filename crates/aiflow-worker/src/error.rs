//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Handler panicked: {0}")]
    HandlerPanicked(String),

    #[error("{0}")]
    Dispatch(#[from] aiflow_dispatch::DispatchError),

    #[error("Model error: {0}")]
    Model(#[from] aiflow_models::ModelError),

    #[error("Queue error: {0}")]
    Queue(#[from] aiflow_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    pub fn invalid_payload(msg: impl Into<String>) -> Self {
        Self::InvalidPayload(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}

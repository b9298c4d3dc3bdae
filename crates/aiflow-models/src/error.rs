//! Model validation errors.

use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unknown content domain: {0}")]
    UnknownDomain(String),

    #[error("Invalid job payload: {0}")]
    InvalidPayload(String),
}

impl ModelError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn invalid_payload(msg: impl Into<String>) -> Self {
        Self::InvalidPayload(msg.into())
    }
}

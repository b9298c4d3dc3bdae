//! Dispatch error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by a single provider call.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ProviderError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default)]
    timed_out: bool,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: None,
            timed_out: false,
        }
    }

    pub fn with_status(message: impl Into<String>, status_code: u16) -> Self {
        Self {
            message: message.into(),
            status_code: Some(status_code),
            timed_out: false,
        }
    }

    /// The attempt did not finish within its per-attempt timeout.
    pub fn timeout(timeout_ms: u64) -> Self {
        Self {
            message: format!("request timed out after {}ms", timeout_ms),
            status_code: None,
            timed_out: true,
        }
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::new(format!("network error: {}", msg.into()))
    }

    pub fn is_timeout(&self) -> bool {
        self.timed_out
    }
}

/// Why a dispatch or analysis ended without a result.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DispatchError {
    #[error("service not registered: {provider}")]
    ServiceNotRegistered { provider: String },

    #[error("validation failed: {message}")]
    Validation { message: String },

    #[error("no_models_available: no {domain} model supports '{analysis_type}'")]
    NoModelsAvailable {
        domain: String,
        analysis_type: String,
    },

    #[error("all candidates failed after {attempts} attempt(s); last error: {last_error}")]
    ChainExhausted { last_error: String, attempts: u32 },
}

impl DispatchError {
    pub fn not_registered(provider: impl Into<String>) -> Self {
        Self::ServiceNotRegistered {
            provider: provider.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    pub fn exhausted(last_error: impl Into<String>, attempts: u32) -> Self {
        Self::ChainExhausted {
            last_error: last_error.into(),
            attempts,
        }
    }

    /// Short machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::ServiceNotRegistered { .. } => "service_not_registered",
            DispatchError::Validation { .. } => "validation_error",
            DispatchError::NoModelsAvailable { .. } => "no_models_available",
            DispatchError::ChainExhausted { .. } => "chain_exhausted",
        }
    }
}

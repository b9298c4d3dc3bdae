//! Dispatch and analysis results.

use aiflow_models::ContentDomain;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DispatchError;

/// One failed attempt, kept for diagnosis until the call returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryAttempt {
    /// Attempt number within the candidate's own loop (1-based)
    pub attempt: u32,
    /// Provider or model that failed
    pub provider: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
    pub retryable: bool,
}

/// Outcome of [`FallbackDispatcher::dispatch`](crate::FallbackDispatcher::dispatch).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<DispatchError>,
    /// Provider that produced the result, or the last one tried
    pub provider: String,
    /// Attempts across every provider tried
    pub attempts: u32,
    pub fallback_used: bool,
    pub elapsed_ms: u64,
    pub retry_history: Vec<RetryAttempt>,
}

impl DispatchResult {
    /// Convert into a plain `Result` for `?` users.
    pub fn into_result(self) -> Result<Value, DispatchError> {
        match (self.data, self.error) {
            (Some(data), None) if self.success => Ok(data),
            (_, Some(err)) => Err(err),
            _ => Err(DispatchError::exhausted("no data returned", self.attempts)),
        }
    }

    /// Error text suitable for end users.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }
}

/// Outcome of [`ModelSelector::select_and_execute`](crate::ModelSelector::select_and_execute).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub success: bool,
    pub domain: ContentDomain,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<DispatchError>,
    /// Model that produced the result, or the last one tried
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub attempts: u32,
    pub fallback_used: bool,
    pub elapsed_ms: u64,
    pub retry_history: Vec<RetryAttempt>,
}

impl AnalysisResult {
    pub fn into_result(self) -> Result<Value, DispatchError> {
        match (self.data, self.error) {
            (Some(data), None) if self.success => Ok(data),
            (_, Some(err)) => Err(err),
            _ => Err(DispatchError::exhausted("no data returned", self.attempts)),
        }
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_into_result() {
        let ok = DispatchResult {
            success: true,
            data: Some(json!("ok")),
            error: None,
            provider: "a".into(),
            attempts: 1,
            fallback_used: false,
            elapsed_ms: 5,
            retry_history: Vec::new(),
        };
        assert_eq!(ok.clone().into_result().unwrap(), json!("ok"));

        let failed = DispatchResult {
            success: false,
            data: None,
            error: Some(DispatchError::exhausted("boom", 3)),
            ..ok
        };
        assert!(failed.error_message().unwrap().contains("boom"));
        assert!(matches!(
            failed.into_result(),
            Err(DispatchError::ChainExhausted { attempts: 3, .. })
        ));
    }
}

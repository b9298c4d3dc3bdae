//! Persisted jobs and the status updates a consumer writes back.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ModelError;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job lifecycle status.
///
/// The consumer only ever advances `pending -> processing -> terminal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is waiting for a worker
    #[default]
    Pending,
    /// Job is being processed
    Processing,
    /// Job completed successfully
    Completed,
    /// Job failed
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether a row in this status may be written as `next`.
    ///
    /// Status only moves forward. Rewriting the current status is allowed so
    /// repeated writes stay idempotent. `pending` may go straight to a
    /// terminal status when the processing write was lost.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match (self, next) {
            (current, next) if *current == next => true,
            (JobStatus::Pending, _) => true,
            (JobStatus::Processing, next) => next.is_terminal(),
            (JobStatus::Completed | JobStatus::Failed, _) => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(ModelError::invalid_payload(format!("unknown job status '{}'", other))),
        }
    }
}

/// A persisted unit of asynchronous work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Job type, selects the handler
    pub job_type: String,

    /// Current status
    #[serde(default)]
    pub status: JobStatus,

    /// Handler-specific input
    #[serde(default)]
    pub payload: Value,

    /// Handler output (when completed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Location of any produced asset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,

    /// Error message (when failed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Started at timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// Completed at timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a new pending job.
    pub fn new(job_type: impl Into<String>, payload: Value) -> Self {
        Self {
            id: JobId::new(),
            job_type: job_type.into(),
            status: JobStatus::Pending,
            payload,
            result: None,
            output_url: None,
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Apply a status update. Returns `false` when the row already holds
    /// exactly this status and these fields.
    pub fn apply(&mut self, status: JobStatus, update: &JobUpdate) -> bool {
        let mut next = self.clone();
        next.status = status;
        if let Some(ts) = update.started_at {
            next.started_at = Some(ts);
        }
        if let Some(ts) = update.completed_at {
            next.completed_at = Some(ts);
        }
        if let Some(result) = &update.result {
            next.result = Some(result.clone());
        }
        if let Some(url) = &update.output_url {
            next.output_url = Some(url.clone());
        }
        if let Some(msg) = &update.error_message {
            next.error_message = Some(msg.clone());
        }

        if next == *self {
            return false;
        }
        *self = next;
        true
    }

    /// Notification describing this row's current state.
    pub fn to_event(&self) -> JobEvent {
        JobEvent {
            job_id: self.id.clone(),
            job_type: self.job_type.clone(),
            status: self.status,
            payload: self.payload.clone(),
        }
    }
}

/// Push notification emitted by the job store on insert/update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobEvent {
    pub job_id: JobId,
    pub job_type: String,
    pub status: JobStatus,
    #[serde(default)]
    pub payload: Value,
}

/// Fields written alongside a status transition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl JobUpdate {
    /// Fields for the `processing` transition.
    pub fn started() -> Self {
        Self {
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Fields for the `completed` transition.
    pub fn completed(output: JobOutput) -> Self {
        Self {
            completed_at: Some(Utc::now()),
            result: Some(output.result),
            output_url: output.output_url,
            ..Default::default()
        }
    }

    /// Fields for the `failed` transition.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            completed_at: Some(Utc::now()),
            error_message: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Successful handler output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobOutput {
    pub result: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,
}

impl JobOutput {
    pub fn new(result: Value) -> Self {
        Self {
            result,
            output_url: None,
        }
    }

    pub fn with_output_url(mut self, url: impl Into<String>) -> Self {
        self.output_url = Some(url.into());
        self
    }
}

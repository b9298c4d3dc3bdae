//! Shared data models for the AIFlow dispatch engine.
//!
//! This crate provides Serde-serializable types for:
//! - Provider identifiers and content domains
//! - Analysis requests and their capability filters
//! - Persisted jobs, job events and status updates

pub mod error;
pub mod job;
pub mod provider;
pub mod request;

// Re-export common types
pub use error::{ModelError, ModelResult};
pub use job::{Job, JobEvent, JobId, JobOutput, JobStatus, JobUpdate};
pub use provider::{AnalysisType, ContentDomain, ProviderId};
pub use request::AnalysisRequest;

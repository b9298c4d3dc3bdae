//! Resilient dispatch of AI requests across interchangeable providers.
//!
//! This crate provides:
//! - Error classification and retry policy
//! - Provider-level fallback dispatch
//! - Capability/priority based model selection per content domain
//! - Per-provider statistics and health probes

pub mod chain;
pub mod classifier;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod health;
pub mod metrics;
pub mod providers;
pub mod registry;
pub mod result;
pub mod retry;
pub mod selector;
pub mod stats;

pub use chain::{run_chain, ChainCandidate, ChainOutcome, ChainSettings};
pub use classifier::{Classification, ErrorClassifier, ErrorKind};
pub use config::DispatchConfig;
pub use dispatcher::FallbackDispatcher;
pub use error::{DispatchError, ProviderError};
pub use executor::ServiceExecutor;
pub use health::{HealthMonitor, ProviderHealth};
pub use providers::{GeminiExecutor, HttpJsonExecutor};
pub use registry::{env_key, ExecutorRegistry, FallbackChains};
pub use result::{AnalysisResult, DispatchResult, RetryAttempt};
pub use retry::RetryPolicy;
pub use selector::{system_instruction, ModelCatalog, ModelDescriptor, ModelSelector, BATCH_CHUNK_SIZE};
pub use stats::{ServiceStats, StatsTracker};

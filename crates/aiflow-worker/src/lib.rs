//! Job worker.
//!
//! This crate provides:
//! - A concurrency-limited consumer per job type
//! - Built-in analysis and generation handlers
//! - Provider/model wiring from the environment
//! - A health, stats and metrics HTTP server

pub mod config;
pub mod consumer;
pub mod error;
pub mod handler;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod pool;
pub mod providers;
pub mod server;

pub use config::{JobStoreKind, WorkerConfig};
pub use consumer::{ClaimOutcome, ConsumerStatus, JobQueueConsumer};
pub use error::{WorkerError, WorkerResult};
pub use handler::{HandlerRegistry, JobHandler};
pub use handlers::{AnalysisHandler, GenerationHandler};
pub use logging::JobLogger;
pub use pool::{PoolStatus, WorkerPool};
pub use server::{create_router, AppState};

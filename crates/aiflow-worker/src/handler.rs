//! Job handler capability.

use std::collections::HashMap;
use std::sync::Arc;

use aiflow_models::{JobEvent, JobOutput};
use async_trait::async_trait;

use crate::error::WorkerResult;

/// Executes the work behind one job type.
///
/// Returning `Err` (or panicking) marks the job `failed`.
#[async_trait]
pub trait JobHandler: Send + Sync {
    fn job_type(&self) -> &str;

    async fn handle(&self, job: &JobEvent) -> WorkerResult<JobOutput>;
}

/// Handlers keyed by the job type they serve.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, handler: Arc<dyn JobHandler>) -> Self {
        self.register(handler);
        self
    }

    pub fn register(&mut self, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(handler.job_type().to_string(), handler);
    }

    pub fn get(&self, job_type: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(job_type).cloned()
    }

    pub fn job_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

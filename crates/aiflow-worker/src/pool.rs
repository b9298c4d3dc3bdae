//! One consumer per configured job type, sharing a store and a shutdown signal.

use std::sync::Arc;
use std::time::Duration;

use aiflow_queue::JobStore;
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::watch;
use tracing::info;
use uuid::Uuid;

use crate::config::WorkerConfig;
use crate::consumer::{ConsumerStatus, JobQueueConsumer};
use crate::error::{WorkerError, WorkerResult};
use crate::handler::HandlerRegistry;

/// Aggregate status served by `/health`.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStatus {
    pub instance_id: String,
    pub is_running: bool,
    pub active_jobs: usize,
    pub total_workers: usize,
    pub workers: Vec<ConsumerStatus>,
}

pub struct WorkerPool {
    instance_id: String,
    consumers: Vec<Arc<JobQueueConsumer>>,
    shutdown: watch::Sender<bool>,
    shutdown_timeout: Duration,
}

impl WorkerPool {
    /// Build a consumer for every job type in `config`.
    ///
    /// Fails when a configured job type has no handler.
    pub fn new(
        store: Arc<dyn JobStore>,
        handlers: &HandlerRegistry,
        config: &WorkerConfig,
    ) -> WorkerResult<Self> {
        let mut consumers = Vec::with_capacity(config.job_types.len());
        for job_type in &config.job_types {
            let handler = handlers.get(job_type).ok_or_else(|| {
                WorkerError::config_error(format!("no handler registered for job type '{}'", job_type))
            })?;
            consumers.push(Arc::new(JobQueueConsumer::new(
                handler,
                Arc::clone(&store),
                config.max_jobs_for(job_type),
            )));
        }

        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            instance_id: format!("worker-{}", Uuid::new_v4()),
            consumers,
            shutdown,
            shutdown_timeout: config.shutdown_timeout,
        })
    }

    /// Identifies this process among workers sharing a store.
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn consumers(&self) -> &[Arc<JobQueueConsumer>] {
        &self.consumers
    }

    pub fn consumer(&self, job_type: &str) -> Option<&Arc<JobQueueConsumer>> {
        self.consumers.iter().find(|c| c.job_type() == job_type)
    }

    /// Run every consumer until [`shutdown`](Self::shutdown) is called.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            instance_id = %self.instance_id,
            workers = self.consumers.len(),
            "Starting worker pool"
        );
        let results = join_all(
            self.consumers
                .iter()
                .map(|c| c.run(self.shutdown.subscribe(), self.shutdown_timeout)),
        )
        .await;
        results.into_iter().collect::<WorkerResult<Vec<()>>>()?;
        info!("Worker pool stopped");
        Ok(())
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub async fn status(&self) -> PoolStatus {
        let workers = join_all(self.consumers.iter().map(|c| c.status())).await;
        PoolStatus {
            instance_id: self.instance_id.clone(),
            is_running: !workers.is_empty() && workers.iter().all(|w| w.is_running),
            active_jobs: workers.iter().map(|w| w.active_jobs).sum(),
            total_workers: workers.len(),
            workers,
        }
    }
}

//! In-process job store.

use std::collections::HashMap;

use aiflow_models::{Job, JobEvent, JobId, JobStatus, JobUpdate};
use async_trait::async_trait;
use futures_util::{future, stream, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{QueueError, QueueResult};
use crate::store::{JobEventStream, JobStore};

const EVENT_BUFFER: usize = 1024;

/// Job rows kept in a map, notifications fanned out over a broadcast channel.
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
    events: broadcast::Sender<JobEvent>,
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryJobStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            jobs: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Snapshot of every row.
    pub async fn jobs(&self) -> Vec<Job> {
        self.jobs.read().await.values().cloned().collect()
    }

    fn notify(&self, event: JobEvent) {
        // No subscribers is fine; the row is still the record.
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn subscribe(&self, job_type: &str) -> QueueResult<JobEventStream> {
        let job_type = job_type.to_string();
        let rx = self.events.subscribe();

        let events = stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(event) => return Some((event, rx)),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Job event subscriber lagged, notifications dropped");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        })
        .filter(move |event| future::ready(event.job_type == job_type));

        Ok(Box::pin(events))
    }

    async fn update_job_status(
        &self,
        job_id: &JobId,
        status: JobStatus,
        update: JobUpdate,
    ) -> QueueResult<()> {
        let event = {
            let mut jobs = self.jobs.write().await;
            let job = jobs
                .get_mut(job_id)
                .ok_or_else(|| QueueError::job_not_found(job_id.as_str()))?;
            if !job.status.can_transition_to(status) {
                return Err(QueueError::invalid_transition(job_id.as_str(), job.status, status));
            }
            if !job.apply(status, &update) {
                debug!(job_id = %job_id, status = %status, "Status unchanged, skipping notify");
                return Ok(());
            }
            job.to_event()
        };

        self.notify(event);
        Ok(())
    }

    async fn claim_job(&self, job_id: &JobId) -> QueueResult<bool> {
        let event = {
            let mut jobs = self.jobs.write().await;
            let job = jobs
                .get_mut(job_id)
                .ok_or_else(|| QueueError::job_not_found(job_id.as_str()))?;
            if job.status != JobStatus::Pending {
                debug!(job_id = %job_id, status = %job.status, "Claim skipped, job not pending");
                return Ok(false);
            }
            job.apply(JobStatus::Processing, &JobUpdate::started());
            job.to_event()
        };

        self.notify(event);
        Ok(true)
    }

    async fn get_job(&self, job_id: &JobId) -> QueueResult<Option<Job>> {
        Ok(self.jobs.read().await.get(job_id).cloned())
    }

    async fn insert_job(&self, job: Job) -> QueueResult<()> {
        let event = job.to_event();
        self.jobs.write().await.insert(job.id.clone(), job);
        self.notify(event);
        Ok(())
    }
}

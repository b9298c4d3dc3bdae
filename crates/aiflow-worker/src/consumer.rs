//! Concurrency-limited job consumer.
//!
//! Turns the store's push notifications into bounded job execution. The
//! ActiveJobSet is the only in-process state; the store stays the record.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use aiflow_models::{JobEvent, JobId, JobStatus, JobUpdate};
use aiflow_queue::JobStore;
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinError;
use tokio::time::Instant;
use tracing::{debug, error, info, warn, Instrument};

use crate::error::{WorkerError, WorkerResult};
use crate::handler::JobHandler;
use crate::logging::JobLogger;
use crate::metrics;

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);
const RESUBSCRIBE_BACKOFF: Duration = Duration::from_secs(5);

/// What happened to one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// Marked processing and handed to the handler
    Claimed,
    /// Left pending: the consumer is full
    AtCapacity,
    /// This process is already running the job
    AlreadyActive,
    /// Wrong job type, or the store no longer holds the job as pending
    Ignored,
}

/// Point-in-time view of one consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsumerStatus {
    pub job_type: String,
    pub is_running: bool,
    pub active_jobs: usize,
    pub max_concurrent_jobs: usize,
}

/// Claims pending jobs of one type, at most `max_concurrent_jobs` at a time.
pub struct JobQueueConsumer {
    job_type: String,
    handler: Arc<dyn JobHandler>,
    store: Arc<dyn JobStore>,
    max_concurrent_jobs: usize,
    active: Arc<Mutex<HashSet<JobId>>>,
    running: AtomicBool,
}

impl JobQueueConsumer {
    pub fn new(
        handler: Arc<dyn JobHandler>,
        store: Arc<dyn JobStore>,
        max_concurrent_jobs: usize,
    ) -> Self {
        Self {
            job_type: handler.job_type().to_string(),
            handler,
            store,
            max_concurrent_jobs: max_concurrent_jobs.max(1),
            active: Arc::new(Mutex::new(HashSet::new())),
            running: AtomicBool::new(false),
        }
    }

    pub fn job_type(&self) -> &str {
        &self.job_type
    }

    pub fn max_concurrent_jobs(&self) -> usize {
        self.max_concurrent_jobs
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn active_jobs(&self) -> usize {
        self.active.lock().await.len()
    }

    pub async fn status(&self) -> ConsumerStatus {
        ConsumerStatus {
            job_type: self.job_type.clone(),
            is_running: self.is_running(),
            active_jobs: self.active_jobs().await,
            max_concurrent_jobs: self.max_concurrent_jobs,
        }
    }

    /// React to one store notification.
    ///
    /// The capacity check and ActiveJobSet insert happen under one lock, so
    /// concurrent notifications can never claim more than the ceiling. A
    /// notification that arrives at capacity is dropped, not queued.
    pub async fn on_job_event(&self, event: JobEvent) -> ClaimOutcome {
        if event.job_type != self.job_type || event.status != JobStatus::Pending {
            return ClaimOutcome::Ignored;
        }

        let logger = JobLogger::new(&event.job_id, &self.job_type);

        let active_now = {
            let mut active = self.active.lock().await;
            if active.contains(&event.job_id) {
                debug!(job_id = %event.job_id, "Duplicate notification for active job");
                return ClaimOutcome::AlreadyActive;
            }
            if active.len() >= self.max_concurrent_jobs {
                logger.log_dropped(active.len(), self.max_concurrent_jobs);
                metrics::record_dropped(&self.job_type);
                return ClaimOutcome::AtCapacity;
            }
            active.insert(event.job_id.clone());
            active.len()
        };

        // Replayed notifications for finished jobs stop here; the store only
        // lets one claim move a row out of pending.
        match self.store.claim_job(&event.job_id).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(job_id = %event.job_id, "Job no longer pending, releasing slot");
                let remaining = self.release(&event.job_id).await;
                metrics::set_active(&self.job_type, remaining);
                return ClaimOutcome::Ignored;
            }
            // A failed write does not stop the job; the terminal write still runs.
            Err(e) => {
                logger.log_store_error(JobStatus::Processing.as_str(), &e.to_string());
                metrics::record_store_error(&self.job_type, JobStatus::Processing.as_str());
            }
        }

        logger.log_claimed(active_now, self.max_concurrent_jobs);
        metrics::record_claimed(&self.job_type);
        metrics::set_active(&self.job_type, active_now);

        let span = logger.create_span();
        tokio::spawn(
            run_job(
                Arc::clone(&self.handler),
                Arc::clone(&self.store),
                Arc::clone(&self.active),
                event,
                logger,
            )
            .instrument(span),
        );

        ClaimOutcome::Claimed
    }

    async fn release(&self, job_id: &JobId) -> usize {
        let mut active = self.active.lock().await;
        active.remove(job_id);
        active.len()
    }

    /// Wait until no handler is in flight, or `timeout` elapses.
    ///
    /// Returns `true` when drained.
    pub async fn wait_for_jobs(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.active.lock().await.is_empty() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }
    }

    /// Consume notifications until `shutdown` flips to `true`, then drain.
    pub async fn run(
        &self,
        mut shutdown: watch::Receiver<bool>,
        shutdown_timeout: Duration,
    ) -> WorkerResult<()> {
        let mut events = self.store.subscribe(&self.job_type).await?;
        self.running.store(true, Ordering::SeqCst);
        info!(
            job_type = %self.job_type,
            max_concurrent_jobs = self.max_concurrent_jobs,
            "Consumer started"
        );

        while !*shutdown.borrow() {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                event = events.next() => match event {
                    Some(event) => {
                        self.on_job_event(event).await;
                    }
                    None => {
                        warn!(job_type = %self.job_type, "Job notification stream ended, resubscribing");
                        tokio::select! {
                            _ = shutdown.changed() => break,
                            _ = tokio::time::sleep(RESUBSCRIBE_BACKOFF) => {}
                        }
                        match self.store.subscribe(&self.job_type).await {
                            Ok(stream) => events = stream,
                            Err(e) => error!(job_type = %self.job_type, "Resubscribe failed: {}", e),
                        }
                    }
                },
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!(job_type = %self.job_type, "Consumer stopping, waiting for in-flight jobs");

        if !self.wait_for_jobs(shutdown_timeout).await {
            let remaining = self.active_jobs().await;
            warn!(
                job_type = %self.job_type,
                remaining,
                "Shutdown timeout elapsed with jobs still running"
            );
        }
        Ok(())
    }
}

/// Run the handler in its own task, record the terminal state, release the slot.
async fn run_job(
    handler: Arc<dyn JobHandler>,
    store: Arc<dyn JobStore>,
    active: Arc<Mutex<HashSet<JobId>>>,
    event: JobEvent,
    logger: JobLogger,
) {
    let started = Instant::now();
    let job_id = event.job_id.clone();
    let job_type = event.job_type.clone();

    let outcome = tokio::spawn(async move { handler.handle(&event).await }.in_current_span()).await;

    let (status, update) = match outcome {
        Ok(Ok(output)) => {
            logger.log_completion(started.elapsed().as_millis() as u64);
            metrics::record_completed(&job_type);
            (JobStatus::Completed, JobUpdate::completed(output))
        }
        Ok(Err(e)) => {
            let message = e.to_string();
            logger.log_failure(&message);
            metrics::record_failed(&job_type);
            (JobStatus::Failed, JobUpdate::failed(message))
        }
        Err(join_error) => {
            let message = panic_error(join_error).to_string();
            logger.log_failure(&message);
            metrics::record_failed(&job_type);
            (JobStatus::Failed, JobUpdate::failed(message))
        }
    };

    if let Err(e) = store.update_job_status(&job_id, status, update).await {
        logger.log_store_error(status.as_str(), &e.to_string());
        metrics::record_store_error(&job_type, status.as_str());
    }

    let remaining = {
        let mut active = active.lock().await;
        active.remove(&job_id);
        active.len()
    };
    metrics::set_active(&job_type, remaining);
}

fn panic_error(join_error: JoinError) -> WorkerError {
    if !join_error.is_panic() {
        return WorkerError::job_failed("handler task was cancelled");
    }
    let payload = join_error.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    WorkerError::HandlerPanicked(message)
}

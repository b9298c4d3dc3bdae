//! The store interface the consumer depends on.

use std::pin::Pin;

use aiflow_models::{Job, JobEvent, JobId, JobStatus, JobUpdate};
use async_trait::async_trait;
use futures_util::Stream;

use crate::error::QueueResult;

/// Push notifications for one job type, in delivery order.
pub type JobEventStream = Pin<Box<dyn Stream<Item = JobEvent> + Send>>;

/// System of record for jobs.
///
/// The consumer never reads its own in-memory state back as truth; every
/// transition goes through `update_job_status`.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Subscribe to insert/update notifications for `job_type`.
    async fn subscribe(&self, job_type: &str) -> QueueResult<JobEventStream>;

    /// Write `status` and `update` onto the row.
    ///
    /// Writing the status and fields a row already holds is a no-op and
    /// emits no notification. A backward move (see
    /// [`JobStatus::can_transition_to`]) fails with
    /// [`QueueError::InvalidTransition`](crate::QueueError::InvalidTransition).
    async fn update_job_status(
        &self,
        job_id: &JobId,
        status: JobStatus,
        update: JobUpdate,
    ) -> QueueResult<()>;

    /// Move the row from `pending` to `processing` in one step.
    ///
    /// Returns `false`, writing nothing, when the row is no longer pending.
    async fn claim_job(&self, job_id: &JobId) -> QueueResult<bool>;

    async fn get_job(&self, job_id: &JobId) -> QueueResult<Option<Job>>;

    /// Producer side: persist a new row and notify subscribers.
    async fn insert_job(&self, job: Job) -> QueueResult<()>;
}

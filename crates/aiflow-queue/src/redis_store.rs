//! Redis-backed job store.
//!
//! Rows live in hash `aiflow:job:{id}` (`data` holds the JSON row, `status`
//! and `job_type` are mirrored for inspection). Every change is published as a
//! [`JobEvent`] on `aiflow:jobs:{job_type}`.
//!
//! Status writes go through a Lua compare-and-set on the `status` field, so a
//! row that moved on between read and write is never overwritten.

use std::sync::LazyLock;

use aiflow_models::{Job, JobEvent, JobId, JobStatus, JobUpdate};
use async_trait::async_trait;
use futures_util::StreamExt;
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use crate::error::{QueueError, QueueResult};
use crate::store::{JobEventStream, JobStore};

pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";

/// KEYS[1] row; ARGV: expected status, data, new status, channel, event.
static SET_IF_STATUS: LazyLock<redis::Script> = LazyLock::new(|| {
    redis::Script::new(
        r"
        if redis.call('HGET', KEYS[1], 'status') ~= ARGV[1] then
            return 0
        end
        redis.call('HSET', KEYS[1], 'data', ARGV[2], 'status', ARGV[3])
        redis.call('PUBLISH', ARGV[4], ARGV[5])
        return 1
        ",
    )
});

pub struct RedisJobStore {
    client: redis::Client,
}

impl RedisJobStore {
    pub fn new(redis_url: &str) -> QueueResult<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| QueueError::connection_failed(e.to_string()))?;
        Ok(Self { client })
    }

    /// Create from `REDIS_URL`.
    pub fn from_env() -> QueueResult<Self> {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string());
        info!("Connecting job store to Redis");
        Self::new(&url)
    }

    pub fn row_key(job_id: &JobId) -> String {
        format!("aiflow:job:{}", job_id)
    }

    pub fn channel_name(job_type: &str) -> String {
        format!("aiflow:jobs:{}", job_type)
    }

    async fn write_row(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        job: &Job,
    ) -> QueueResult<()> {
        let data = serde_json::to_string(job)?;
        conn.hset_multiple::<_, _, _, ()>(
            Self::row_key(&job.id),
            &[
                ("data", data.as_str()),
                ("status", job.status.as_str()),
                ("job_type", job.job_type.as_str()),
            ],
        )
        .await?;
        Ok(())
    }

    async fn read_row(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        job_id: &JobId,
    ) -> QueueResult<Option<Job>> {
        let data: Option<String> = conn.hget(Self::row_key(job_id), "data").await?;
        data.map(|d| serde_json::from_str(&d).map_err(QueueError::from))
            .transpose()
    }

    /// Write `job` and publish its event only if the stored status is still
    /// `expected`. Returns whether the write happened.
    async fn write_if_status(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        expected: JobStatus,
        job: &Job,
    ) -> QueueResult<bool> {
        let data = serde_json::to_string(job)?;
        let event = serde_json::to_string(&job.to_event())?;
        let written: i32 = SET_IF_STATUS
            .key(Self::row_key(&job.id))
            .arg(expected.as_str())
            .arg(data)
            .arg(job.status.as_str())
            .arg(Self::channel_name(&job.job_type))
            .arg(event)
            .invoke_async(conn)
            .await?;
        Ok(written == 1)
    }

    async fn publish(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        event: &JobEvent,
    ) -> QueueResult<()> {
        let channel = Self::channel_name(&event.job_type);
        let payload = serde_json::to_string(event)?;
        debug!(job_id = %event.job_id, "Publishing job event to {}", channel);
        conn.publish::<_, _, ()>(channel, payload).await?;
        Ok(())
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn subscribe(&self, job_type: &str) -> QueueResult<JobEventStream> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        let channel = Self::channel_name(job_type);
        pubsub.subscribe(&channel).await?;
        info!(channel = %channel, "Subscribed to job notifications");

        let stream = pubsub.into_on_message().filter_map(|msg| async move {
            let payload: String = msg.get_payload().ok()?;
            match serde_json::from_str::<JobEvent>(&payload) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!("Discarding malformed job event: {}", e);
                    None
                }
            }
        });

        Ok(Box::pin(stream))
    }

    async fn update_job_status(
        &self,
        job_id: &JobId,
        status: JobStatus,
        update: JobUpdate,
    ) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let mut job = self
            .read_row(&mut conn, job_id)
            .await?
            .ok_or_else(|| QueueError::job_not_found(job_id.as_str()))?;

        let current = job.status;
        if !current.can_transition_to(status) {
            return Err(QueueError::invalid_transition(job_id.as_str(), current, status));
        }
        if !job.apply(status, &update) {
            debug!(job_id = %job_id, status = %status, "Status unchanged, skipping write");
            return Ok(());
        }

        if self.write_if_status(&mut conn, current, &job).await? {
            Ok(())
        } else {
            Err(QueueError::update_failed(format!(
                "job {} changed while writing {}",
                job_id, status
            )))
        }
    }

    async fn claim_job(&self, job_id: &JobId) -> QueueResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let mut job = self
            .read_row(&mut conn, job_id)
            .await?
            .ok_or_else(|| QueueError::job_not_found(job_id.as_str()))?;

        if job.status != JobStatus::Pending {
            debug!(job_id = %job_id, status = %job.status, "Claim skipped, job not pending");
            return Ok(false);
        }
        job.apply(JobStatus::Processing, &JobUpdate::started());
        self.write_if_status(&mut conn, JobStatus::Pending, &job).await
    }

    async fn get_job(&self, job_id: &JobId) -> QueueResult<Option<Job>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        self.read_row(&mut conn, job_id).await
    }

    async fn insert_job(&self, job: Job) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        self.write_row(&mut conn, &job).await?;
        self.publish(&mut conn, &job.to_event()).await
    }
}

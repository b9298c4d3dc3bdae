mod common;

use std::sync::Arc;
use std::time::Duration;

use aiflow_models::{Job, JobId, JobStatus, JobUpdate};
use aiflow_queue::{JobEventStream, JobStore, MemoryJobStore, QueueError, QueueResult};
use aiflow_worker::{ClaimOutcome, JobQueueConsumer};
use async_trait::async_trait;
use futures::future::join_all;
use mockall::mock;
use tokio::sync::{watch, Semaphore};

use common::{insert_pending, status_of, wait_for_status, Behavior, TestHandler};

#[tokio::test]
async fn test_capacity_ceiling_leaves_extra_job_pending() {
    let store = Arc::new(MemoryJobStore::new());
    let gate = Arc::new(Semaphore::new(0));
    let handler = Arc::new(TestHandler::new("analysis", Behavior::Succeed).gated(Arc::clone(&gate)));
    let consumer = JobQueueConsumer::new(handler.clone(), store.clone(), 2);

    let mut events = Vec::new();
    for _ in 0..3 {
        events.push(insert_pending(&store, "analysis").await);
    }

    let outcomes = join_all(events.iter().cloned().map(|e| consumer.on_job_event(e))).await;

    let claimed = outcomes.iter().filter(|o| **o == ClaimOutcome::Claimed).count();
    let dropped = outcomes.iter().filter(|o| **o == ClaimOutcome::AtCapacity).count();
    assert_eq!(claimed, 2);
    assert_eq!(dropped, 1);
    assert_eq!(consumer.active_jobs().await, 2);

    let mut statuses = Vec::new();
    for event in &events {
        statuses.push(status_of(&store, &event.job_id).await);
    }
    assert_eq!(statuses.iter().filter(|s| **s == JobStatus::Processing).count(), 2);
    assert_eq!(statuses.iter().filter(|s| **s == JobStatus::Pending).count(), 1);

    gate.add_permits(2);
    assert!(consumer.wait_for_jobs(Duration::from_secs(2)).await);
    assert_eq!(handler.calls(), 2);

    for (event, outcome) in events.iter().zip(&outcomes) {
        let row = store.get_job(&event.job_id).await.unwrap().unwrap();
        match outcome {
            ClaimOutcome::Claimed => {
                assert_eq!(row.status, JobStatus::Completed);
                assert!(row.started_at.is_some());
                assert!(row.completed_at.is_some());
                assert!(row.output_url.is_some());
            }
            _ => {
                assert_eq!(row.status, JobStatus::Pending);
                assert!(row.started_at.is_none());
            }
        }
    }
}

#[tokio::test]
async fn test_handler_error_marks_failed() {
    let store = Arc::new(MemoryJobStore::new());
    let consumer = JobQueueConsumer::new(
        Arc::new(TestHandler::new("generation", Behavior::Fail)),
        store.clone(),
        1,
    );
    let event = insert_pending(&store, "generation").await;

    assert_eq!(consumer.on_job_event(event.clone()).await, ClaimOutcome::Claimed);
    let row = wait_for_status(&store, &event.job_id, JobStatus::Failed).await;

    assert!(row.error_message.unwrap().contains("provider exploded"));
    assert!(row.completed_at.is_some());
    assert!(consumer.wait_for_jobs(Duration::from_secs(1)).await);
}

#[tokio::test]
async fn test_handler_panic_marks_failed_and_frees_slot() {
    let store = Arc::new(MemoryJobStore::new());
    let consumer = JobQueueConsumer::new(
        Arc::new(TestHandler::new("analysis", Behavior::Panic)),
        store.clone(),
        1,
    );
    let event = insert_pending(&store, "analysis").await;

    consumer.on_job_event(event.clone()).await;
    let row = wait_for_status(&store, &event.job_id, JobStatus::Failed).await;

    assert!(row.error_message.unwrap().contains("boom"));
    assert!(consumer.wait_for_jobs(Duration::from_secs(1)).await);

    let next = insert_pending(&store, "analysis").await;
    assert_eq!(consumer.on_job_event(next).await, ClaimOutcome::Claimed);
}

#[tokio::test]
async fn test_duplicate_and_foreign_notifications() {
    let store = Arc::new(MemoryJobStore::new());
    let gate = Arc::new(Semaphore::new(0));
    let consumer = JobQueueConsumer::new(
        Arc::new(TestHandler::new("analysis", Behavior::Succeed).gated(Arc::clone(&gate))),
        store.clone(),
        3,
    );

    let event = insert_pending(&store, "analysis").await;
    assert_eq!(consumer.on_job_event(event.clone()).await, ClaimOutcome::Claimed);
    assert_eq!(consumer.on_job_event(event.clone()).await, ClaimOutcome::AlreadyActive);

    let other_type = insert_pending(&store, "generation").await;
    assert_eq!(consumer.on_job_event(other_type).await, ClaimOutcome::Ignored);

    let mut not_pending = insert_pending(&store, "analysis").await;
    not_pending.status = JobStatus::Completed;
    assert_eq!(consumer.on_job_event(not_pending).await, ClaimOutcome::Ignored);

    assert_eq!(consumer.active_jobs().await, 1);
    gate.add_permits(1);
    assert!(consumer.wait_for_jobs(Duration::from_secs(1)).await);
}

#[tokio::test]
async fn test_replayed_notification_for_finished_job_is_ignored() {
    let store = Arc::new(MemoryJobStore::new());
    let handler = Arc::new(TestHandler::new("analysis", Behavior::Succeed));
    let consumer = JobQueueConsumer::new(handler.clone(), store.clone(), 1);

    let event = insert_pending(&store, "analysis").await;
    assert_eq!(consumer.on_job_event(event.clone()).await, ClaimOutcome::Claimed);
    let first = wait_for_status(&store, &event.job_id, JobStatus::Completed).await;
    assert!(consumer.wait_for_jobs(Duration::from_secs(1)).await);

    // Same pending notification delivered again after completion.
    assert_eq!(consumer.on_job_event(event.clone()).await, ClaimOutcome::Ignored);

    assert_eq!(handler.calls(), 1);
    assert_eq!(consumer.active_jobs().await, 0);
    let row = store.get_job(&event.job_id).await.unwrap().unwrap();
    assert_eq!(row.status, JobStatus::Completed);
    assert_eq!(row.completed_at, first.completed_at);
}

#[tokio::test]
async fn test_claim_is_skipped_once_row_left_pending() {
    let store = Arc::new(MemoryJobStore::new());
    let handler = Arc::new(TestHandler::new("analysis", Behavior::Succeed));
    let consumer = JobQueueConsumer::new(handler.clone(), store.clone(), 1);

    let event = insert_pending(&store, "analysis").await;
    // Another worker got there first.
    assert!(store.claim_job(&event.job_id).await.unwrap());

    assert_eq!(consumer.on_job_event(event.clone()).await, ClaimOutcome::Ignored);
    assert_eq!(consumer.active_jobs().await, 0);
    assert_eq!(handler.calls(), 0);
    assert_eq!(status_of(&store, &event.job_id).await, JobStatus::Processing);
}

mock! {
    pub Store {}

    #[async_trait]
    impl JobStore for Store {
        async fn subscribe(&self, job_type: &str) -> QueueResult<JobEventStream>;
        async fn update_job_status(
            &self,
            job_id: &JobId,
            status: JobStatus,
            update: JobUpdate,
        ) -> QueueResult<()>;
        async fn claim_job(&self, job_id: &JobId) -> QueueResult<bool>;
        async fn get_job(&self, job_id: &JobId) -> QueueResult<Option<Job>>;
        async fn insert_job(&self, job: Job) -> QueueResult<()>;
    }
}

#[tokio::test]
async fn test_store_errors_do_not_abort_job() {
    let mut store = MockStore::new();
    store
        .expect_claim_job()
        .times(1)
        .returning(|_| Err(QueueError::update_failed("connection reset")));
    store
        .expect_update_job_status()
        .withf(|_, status, _| *status == JobStatus::Completed)
        .times(1)
        .returning(|_, _, _| Err(QueueError::update_failed("connection reset")));

    let handler = Arc::new(TestHandler::new("analysis", Behavior::Succeed));
    let consumer = JobQueueConsumer::new(handler.clone(), Arc::new(store), 1);

    let event = Job::new("analysis", serde_json::json!({})).to_event();
    assert_eq!(consumer.on_job_event(event).await, ClaimOutcome::Claimed);
    assert!(consumer.wait_for_jobs(Duration::from_secs(1)).await);
    assert_eq!(handler.calls(), 1);
}

#[tokio::test]
async fn test_run_consumes_notifications_until_shutdown() {
    let store = Arc::new(MemoryJobStore::new());
    let handler = Arc::new(TestHandler::new("analysis", Behavior::Succeed));
    let consumer = Arc::new(JobQueueConsumer::new(handler.clone(), store.clone(), 2));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let runner = Arc::clone(&consumer);
    let task = tokio::spawn(async move { runner.run(shutdown_rx, Duration::from_secs(1)).await });

    for _ in 0..200 {
        if consumer.is_running() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(consumer.is_running());

    let event = insert_pending(&store, "analysis").await;
    let row = wait_for_status(&store, &event.job_id, JobStatus::Completed).await;
    assert_eq!(row.result.unwrap()["echo"]["n"], 1);

    shutdown_tx.send(true).unwrap();
    task.await.unwrap().unwrap();
    assert!(!consumer.is_running());
    assert_eq!(handler.calls(), 1);
}

#[tokio::test]
async fn test_shutdown_gives_up_after_timeout_with_job_in_flight() {
    let store = Arc::new(MemoryJobStore::new());
    let gate = Arc::new(Semaphore::new(0));
    let handler = Arc::new(TestHandler::new("analysis", Behavior::Succeed).gated(Arc::clone(&gate)));
    let consumer = Arc::new(JobQueueConsumer::new(handler.clone(), store.clone(), 1));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let runner = Arc::clone(&consumer);
    let task =
        tokio::spawn(async move { runner.run(shutdown_rx, Duration::from_millis(200)).await });

    for _ in 0..200 {
        if consumer.is_running() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let event = insert_pending(&store, "analysis").await;
    wait_for_status(&store, &event.job_id, JobStatus::Processing).await;
    assert!(!consumer.wait_for_jobs(Duration::from_millis(50)).await);

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("run returns once the drain timeout elapses")
        .unwrap()
        .unwrap();

    assert!(!consumer.is_running());
    assert_eq!(consumer.active_jobs().await, 1);
    assert_eq!(status_of(&store, &event.job_id).await, JobStatus::Processing);

    gate.add_permits(1);
    wait_for_status(&store, &event.job_id, JobStatus::Completed).await;
}

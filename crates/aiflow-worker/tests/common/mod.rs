#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use aiflow_models::{Job, JobEvent, JobId, JobOutput, JobStatus};
use aiflow_queue::{JobStore, MemoryJobStore};
use aiflow_worker::{JobHandler, WorkerError, WorkerResult};
use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Semaphore;

#[derive(Clone, Copy)]
pub enum Behavior {
    Succeed,
    Fail,
    Panic,
}

/// Handler whose outcome is fixed up front, optionally held at a gate.
pub struct TestHandler {
    job_type: String,
    behavior: Behavior,
    gate: Option<Arc<Semaphore>>,
    calls: AtomicU32,
}

impl TestHandler {
    pub fn new(job_type: &str, behavior: Behavior) -> Self {
        Self {
            job_type: job_type.to_string(),
            behavior,
            gate: None,
            calls: AtomicU32::new(0),
        }
    }

    /// Block every invocation until the gate gets permits.
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobHandler for TestHandler {
    fn job_type(&self) -> &str {
        &self.job_type
    }

    async fn handle(&self, job: &JobEvent) -> WorkerResult<JobOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let permit = gate.acquire().await.map_err(|e| WorkerError::job_failed(e.to_string()))?;
            permit.forget();
        }
        match self.behavior {
            Behavior::Succeed => Ok(JobOutput::new(json!({ "echo": job.payload }))
                .with_output_url(format!("https://cdn.example.com/{}", job.job_id))),
            Behavior::Fail => Err(WorkerError::job_failed("provider exploded")),
            Behavior::Panic => panic!("boom"),
        }
    }
}

pub async fn insert_pending(store: &MemoryJobStore, job_type: &str) -> JobEvent {
    let job = Job::new(job_type, json!({ "n": 1 }));
    let event = job.to_event();
    store.insert_job(job).await.unwrap();
    event
}

pub async fn status_of(store: &MemoryJobStore, id: &JobId) -> JobStatus {
    store.get_job(id).await.unwrap().unwrap().status
}

/// Poll until the row reaches `status`, panicking after two seconds.
pub async fn wait_for_status(store: &MemoryJobStore, id: &JobId, status: JobStatus) -> Job {
    for _ in 0..200 {
        let job = store.get_job(id).await.unwrap().unwrap();
        if job.status == status {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {id} never reached {status}");
}

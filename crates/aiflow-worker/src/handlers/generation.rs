//! `generation` jobs: a single provider call with retry and fallback.

use std::sync::Arc;

use aiflow_dispatch::FallbackDispatcher;
use aiflow_models::{JobEvent, JobOutput, ProviderId};
use async_trait::async_trait;
use serde_json::json;

use crate::error::{WorkerError, WorkerResult};
use crate::handler::JobHandler;

pub const JOB_TYPE: &str = "generation";

/// Payload: `{ provider, request }`. A `url` or `output_url` string in the
/// provider's reply becomes the job's output URL.
pub struct GenerationHandler {
    dispatcher: Arc<FallbackDispatcher>,
}

impl GenerationHandler {
    pub fn new(dispatcher: Arc<FallbackDispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl JobHandler for GenerationHandler {
    fn job_type(&self) -> &str {
        JOB_TYPE
    }

    async fn handle(&self, job: &JobEvent) -> WorkerResult<JobOutput> {
        let provider = job.payload["provider"]
            .as_str()
            .map(ProviderId::new)
            .ok_or_else(|| WorkerError::invalid_payload("missing 'provider'"))?;
        let request = job
            .payload
            .get("request")
            .cloned()
            .ok_or_else(|| WorkerError::invalid_payload("missing 'request'"))?;

        let result = self.dispatcher.dispatch_default(&provider, &request).await;
        let used = result.provider.clone();
        let attempts = result.attempts;
        let fallback_used = result.fallback_used;
        let data = result.into_result()?;

        let output_url = data
            .get("url")
            .or_else(|| data.get("output_url"))
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let output = JobOutput::new(json!({
            "provider": used,
            "attempts": attempts,
            "fallback_used": fallback_used,
            "data": data,
        }));
        Ok(match output_url {
            Some(url) => output.with_output_url(url),
            None => output,
        })
    }
}

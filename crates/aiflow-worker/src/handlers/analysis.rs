//! `analysis` jobs: content analysis through the domain model selectors.

use std::sync::Arc;

use aiflow_dispatch::ModelCatalog;
use aiflow_models::{AnalysisRequest, ContentDomain, JobEvent, JobOutput};
use async_trait::async_trait;
use serde_json::json;

use crate::error::{WorkerError, WorkerResult};
use crate::handler::JobHandler;

pub const JOB_TYPE: &str = "analysis";

/// Payload: `{ domain, content_url, instruction, annotation?, analysis_type? }`.
pub struct AnalysisHandler {
    catalog: Arc<ModelCatalog>,
}

impl AnalysisHandler {
    pub fn new(catalog: Arc<ModelCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl JobHandler for AnalysisHandler {
    fn job_type(&self) -> &str {
        JOB_TYPE
    }

    async fn handle(&self, job: &JobEvent) -> WorkerResult<JobOutput> {
        let domain: ContentDomain = job.payload["domain"]
            .as_str()
            .ok_or_else(|| WorkerError::invalid_payload("missing 'domain'"))?
            .parse()?;
        let request = AnalysisRequest::from_payload(&job.payload)?;

        let result = self.catalog.analyze(domain, &request).await;
        let model = result.model.clone();
        let attempts = result.attempts;
        let fallback_used = result.fallback_used;
        let analysis = result.into_result()?;

        Ok(JobOutput::new(json!({
            "domain": domain,
            "model": model,
            "attempts": attempts,
            "fallback_used": fallback_used,
            "analysis": analysis,
        })))
    }
}

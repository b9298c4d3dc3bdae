//! Priority-ordered model selection per content domain.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use aiflow_models::{AnalysisRequest, AnalysisType, ContentDomain};
use futures::future::join_all;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::chain::{run_chain, ChainCandidate, ChainSettings};
use crate::classifier::ErrorClassifier;
use crate::error::DispatchError;
use crate::executor::ServiceExecutor;
use crate::result::AnalysisResult;
use crate::stats::StatsTracker;

/// In-flight analyses per batch chunk.
pub const BATCH_CHUNK_SIZE: usize = 3;

/// A model that can serve analyses in one domain.
#[derive(Clone)]
pub struct ModelDescriptor {
    pub name: String,
    /// Lower is tried first
    pub priority: u32,
    pub capabilities: BTreeSet<AnalysisType>,
    pub executor: Arc<dyn ServiceExecutor>,
    pub description: String,
}

impl ModelDescriptor {
    pub fn new(name: impl Into<String>, priority: u32, executor: Arc<dyn ServiceExecutor>) -> Self {
        Self {
            name: name.into(),
            priority,
            capabilities: BTreeSet::new(),
            executor,
            description: String::new(),
        }
    }

    pub fn with_capabilities<I, T>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<AnalysisType>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn supports(&self, analysis_type: &AnalysisType) -> bool {
        self.capabilities.contains(analysis_type)
    }
}

impl std::fmt::Debug for ModelDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelDescriptor")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

/// Instruction prefixed onto every prompt to pin the request to analysis of
/// the right modality.
pub fn system_instruction(domain: ContentDomain) -> &'static str {
    match domain {
        ContentDomain::Image => {
            "You are an image analysis model. Analyze the provided image and answer in text. Do not generate or edit images."
        }
        ContentDomain::Video => {
            "You are a video analysis model. Analyze the provided video and answer in text. Do not generate or edit video."
        }
        ContentDomain::Text => {
            "You are a text analysis model. Analyze the provided text and answer concisely. Do not rewrite or continue it."
        }
        ContentDomain::Audio => {
            "You are an audio analysis model. Analyze the provided audio and answer in text. Do not generate or synthesize audio."
        }
    }
}

/// Chooses among a domain's models by capability and priority, falling
/// through to the next model on failure.
pub struct ModelSelector {
    domain: ContentDomain,
    models: Vec<ModelDescriptor>,
    classifier: ErrorClassifier,
    stats: Arc<StatsTracker>,
    timeout: Duration,
}

impl ModelSelector {
    pub fn new(domain: ContentDomain, models: Vec<ModelDescriptor>, stats: Arc<StatsTracker>) -> Self {
        Self {
            domain,
            models,
            classifier: ErrorClassifier::new(),
            stats,
            timeout: domain.default_timeout(),
        }
    }

    /// Override the per-model timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn domain(&self) -> ContentDomain {
        self.domain
    }

    pub fn models(&self) -> &[ModelDescriptor] {
        &self.models
    }

    /// Candidates for `analysis_type`, ascending by priority.
    ///
    /// Equal priorities keep declaration order.
    pub fn candidates(&self, analysis_type: Option<&AnalysisType>) -> Vec<&ModelDescriptor> {
        let mut candidates: Vec<&ModelDescriptor> = self
            .models
            .iter()
            .filter(|m| analysis_type.map_or(true, |t| m.supports(t)))
            .collect();
        candidates.sort_by_key(|m| m.priority);
        candidates
    }

    fn shape_request(&self, model: &ModelDescriptor, request: &AnalysisRequest) -> Value {
        let instruction = system_instruction(self.domain);
        json!({
            "model": model.name,
            "domain": self.domain.as_str(),
            "system_instruction": instruction,
            "prompt": format!("{}\n\n{}", instruction, request.instruction),
            "content_url": request.content_url,
            "annotation": request.annotation,
            "analysis_type": request.analysis_type,
        })
    }

    fn failed(&self, error: DispatchError, attempts: u32) -> AnalysisResult {
        AnalysisResult {
            success: false,
            domain: self.domain,
            data: None,
            error: Some(error),
            model: None,
            attempts,
            fallback_used: false,
            elapsed_ms: 0,
            retry_history: Vec::new(),
        }
    }

    /// Analyze `request` with the best available model.
    pub async fn select_and_execute(&self, request: &AnalysisRequest) -> AnalysisResult {
        if let Err(e) = request.check() {
            warn!(domain = %self.domain, "Rejected analysis request: {}", e);
            return self.failed(DispatchError::validation(e.to_string()), 0);
        }

        let models = self.candidates(request.analysis_type.as_ref());
        if models.is_empty() {
            let analysis_type = request
                .analysis_type
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "any".to_string());
            warn!(domain = %self.domain, analysis_type = %analysis_type, "No models available");
            return self.failed(
                DispatchError::NoModelsAvailable {
                    domain: self.domain.to_string(),
                    analysis_type,
                },
                0,
            );
        }

        let candidates: Vec<ChainCandidate> = models
            .iter()
            .map(|m| {
                ChainCandidate::new(
                    m.name.clone(),
                    Arc::clone(&m.executor),
                    self.shape_request(m, request),
                )
            })
            .collect();

        let settings = ChainSettings::single_try(self.timeout);
        let outcome = run_chain(&candidates, &settings, &self.classifier, &self.stats).await;
        let success = outcome.success();

        if success {
            info!(
                domain = %self.domain,
                model = outcome.used.as_deref().unwrap_or_default(),
                attempts = outcome.attempts,
                fallback_used = outcome.fallback_used,
                "Analysis succeeded"
            );
        }

        AnalysisResult {
            success,
            domain: self.domain,
            data: outcome.data,
            error: outcome.error,
            model: outcome.used,
            attempts: outcome.attempts,
            fallback_used: outcome.fallback_used,
            elapsed_ms: outcome.elapsed.as_millis() as u64,
            retry_history: outcome.history,
        }
    }

    /// Run independent analyses, at most [`BATCH_CHUNK_SIZE`] in flight.
    ///
    /// Each chunk is awaited fully before the next starts. Results keep the
    /// order of `requests`.
    pub async fn select_and_execute_batch(&self, requests: &[AnalysisRequest]) -> Vec<AnalysisResult> {
        let mut results = Vec::with_capacity(requests.len());
        for chunk in requests.chunks(BATCH_CHUNK_SIZE) {
            let chunk_results = join_all(chunk.iter().map(|r| self.select_and_execute(r))).await;
            results.extend(chunk_results);
        }
        results
    }
}

/// The four domain selectors, built once at startup.
#[derive(Default)]
pub struct ModelCatalog {
    selectors: HashMap<ContentDomain, ModelSelector>,
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_selector(mut self, selector: ModelSelector) -> Self {
        self.selectors.insert(selector.domain(), selector);
        self
    }

    pub fn selector(&self, domain: ContentDomain) -> Option<&ModelSelector> {
        self.selectors.get(&domain)
    }

    /// Every model executor across domains, for health probing.
    pub fn executors(&self) -> Vec<(String, Arc<dyn ServiceExecutor>)> {
        let mut out = Vec::new();
        for domain in ContentDomain::ALL {
            if let Some(selector) = self.selectors.get(&domain) {
                for model in selector.models() {
                    out.push((model.name.clone(), Arc::clone(&model.executor)));
                }
            }
        }
        out
    }

    /// Analyze with the selector for `domain`.
    pub async fn analyze(&self, domain: ContentDomain, request: &AnalysisRequest) -> AnalysisResult {
        match self.selectors.get(&domain) {
            Some(selector) => selector.select_and_execute(request).await,
            None => AnalysisResult {
                success: false,
                domain,
                data: None,
                error: Some(DispatchError::NoModelsAvailable {
                    domain: domain.to_string(),
                    analysis_type: request
                        .analysis_type
                        .as_ref()
                        .map(ToString::to_string)
                        .unwrap_or_else(|| "any".to_string()),
                }),
                model: None,
                attempts: 0,
                fallback_used: false,
                elapsed_ms: 0,
                retry_history: Vec::new(),
            },
        }
    }
}

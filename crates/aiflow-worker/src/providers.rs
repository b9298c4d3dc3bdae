//! Provider and model wiring from the environment.
//!
//! Built once at startup and shared by reference afterwards.

use std::sync::Arc;

use aiflow_dispatch::{
    env_key, ExecutorRegistry, GeminiExecutor, HealthMonitor, HttpJsonExecutor, ModelCatalog,
    ModelDescriptor, ModelSelector, StatsTracker,
};
use aiflow_models::{ContentDomain, ProviderId};
use tracing::{info, warn};

use crate::error::{WorkerError, WorkerResult};

pub const GEMINI_PROVIDER: &str = "gemini";

const FLASH: &str = "gemini-2.5-flash";
const PRO: &str = "gemini-2.5-pro";

/// Executors for every configured provider.
///
/// `gemini` is registered when `GEMINI_API_KEY` is set; each id in
/// `PROVIDERS` needs a `PROVIDER_<ID>_URL`.
pub fn build_registry() -> WorkerResult<ExecutorRegistry> {
    let mut registry = ExecutorRegistry::new();

    if std::env::var("GEMINI_API_KEY").is_ok() {
        let gemini = GeminiExecutor::from_env()
            .map_err(|e| WorkerError::config_error(e.message))?;
        registry.register(GEMINI_PROVIDER, Arc::new(gemini));
    }

    let extra = std::env::var("PROVIDERS").unwrap_or_default();
    for id in extra.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let key = env_key(id);
        match HttpJsonExecutor::from_env(&key) {
            Some(executor) => {
                info!(provider = id, endpoint = executor.endpoint(), "Registered HTTP provider");
                registry.register(id, Arc::new(executor));
            }
            None => {
                return Err(WorkerError::config_error(format!(
                    "provider '{}' listed in PROVIDERS but PROVIDER_{}_URL is not set",
                    id, key
                )))
            }
        }
    }

    if registry.is_empty() {
        warn!("No providers configured; generation jobs will fail");
    }
    Ok(registry)
}

const IMAGE_CAPS: &[&str] = &["description", "labels", "objects", "ocr", "classification"];
const VIDEO_CAPS: &[&str] = &["summary", "scenes", "objects", "transcription"];
const TEXT_CAPS: &[&str] = &["summary", "sentiment", "entities", "classification", "translation"];
const AUDIO_CAPS: &[&str] = &["transcription", "summary", "sentiment"];

/// Default Gemini models for one domain: flash first, pro as fallback with
/// the domain's extra capability.
fn gemini_models(domain: ContentDomain) -> Vec<(&'static str, u32, Vec<&'static str>)> {
    let (base, pro_only) = match domain {
        ContentDomain::Image => (IMAGE_CAPS, "faces"),
        ContentDomain::Video => (VIDEO_CAPS, "highlights"),
        ContentDomain::Text => (TEXT_CAPS, "reasoning"),
        ContentDomain::Audio => (AUDIO_CAPS, "speakers"),
    };
    let mut pro = base.to_vec();
    pro.push(pro_only);
    vec![(FLASH, 1, base.to_vec()), (PRO, 2, pro)]
}

/// One selector per domain over the Gemini models, when Gemini is registered.
pub fn build_catalog(registry: &ExecutorRegistry, stats: &Arc<StatsTracker>) -> ModelCatalog {
    let Some(gemini) = registry.get(&ProviderId::new(GEMINI_PROVIDER)) else {
        warn!("Gemini not configured; analysis jobs will report no_models_available");
        return ModelCatalog::new();
    };

    ContentDomain::ALL
        .into_iter()
        .fold(ModelCatalog::new(), |catalog, domain| {
            let models = gemini_models(domain)
                .into_iter()
                .map(|(name, priority, caps)| {
                    ModelDescriptor::new(name, priority, Arc::clone(&gemini))
                        .with_capabilities(caps)
                        .with_description(format!("{} {} analysis", name, domain))
                })
                .collect();
            catalog.with_selector(ModelSelector::new(domain, models, Arc::clone(stats)))
        })
}

/// Health monitor watching every provider and model executor.
pub fn build_monitor(
    registry: &ExecutorRegistry,
    catalog: &ModelCatalog,
    stats: &Arc<StatsTracker>,
) -> HealthMonitor {
    let mut monitor = HealthMonitor::new(Arc::clone(stats));
    for (id, executor) in registry.iter() {
        monitor.watch(id.as_str(), Arc::clone(executor));
    }
    for (name, executor) in catalog.executors() {
        monitor.watch(name, executor);
    }
    monitor
}

#[cfg(test)]
mod tests {
    use super::*;
    use aiflow_models::AnalysisType;

    #[test]
    fn test_catalog_empty_without_gemini() {
        let stats = Arc::new(StatsTracker::new());
        let catalog = build_catalog(&ExecutorRegistry::new(), &stats);
        assert!(catalog.selector(ContentDomain::Image).is_none());
    }

    #[test]
    fn test_catalog_covers_every_domain() {
        let stats = Arc::new(StatsTracker::new());
        let registry = ExecutorRegistry::new().with(GEMINI_PROVIDER, Arc::new(GeminiExecutor::new("k")));
        let catalog = build_catalog(&registry, &stats);

        for domain in ContentDomain::ALL {
            let selector = catalog.selector(domain).unwrap();
            assert_eq!(selector.models().len(), 2);
        }
        let faces = catalog
            .selector(ContentDomain::Image)
            .unwrap()
            .candidates(Some(&AnalysisType::new("faces")));
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].name, PRO);

        let monitor = build_monitor(&registry, &catalog, &stats);
        assert!(Arc::ptr_eq(monitor.stats(), &stats));
    }
}

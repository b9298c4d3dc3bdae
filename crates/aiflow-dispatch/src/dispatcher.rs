//! Provider-level fallback dispatcher.

use std::sync::Arc;

use aiflow_models::ProviderId;
use serde_json::Value;
use tracing::{info, warn};

use crate::chain::{run_chain, ChainCandidate, ChainSettings};
use crate::classifier::ErrorClassifier;
use crate::config::DispatchConfig;
use crate::error::DispatchError;
use crate::registry::{ExecutorRegistry, FallbackChains};
use crate::result::DispatchResult;
use crate::stats::StatsTracker;

/// Drives retry + fallback across registered providers.
///
/// Constructed once at process start and shared by reference.
pub struct FallbackDispatcher {
    registry: Arc<ExecutorRegistry>,
    chains: FallbackChains,
    classifier: ErrorClassifier,
    stats: Arc<StatsTracker>,
    config: DispatchConfig,
}

impl FallbackDispatcher {
    pub fn new(
        registry: Arc<ExecutorRegistry>,
        chains: FallbackChains,
        stats: Arc<StatsTracker>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            registry,
            chains,
            classifier: ErrorClassifier::new(),
            stats,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<ExecutorRegistry> {
        &self.registry
    }

    pub fn stats(&self) -> &Arc<StatsTracker> {
        &self.stats
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Dispatch with the dispatcher's default configuration.
    pub async fn dispatch_default(&self, provider: &ProviderId, request: &Value) -> DispatchResult {
        self.dispatch(provider, request, &self.config).await
    }

    /// Dispatch `request` to `provider`, retrying and then walking the
    /// provider's fallback chain in configured order.
    pub async fn dispatch(
        &self,
        provider: &ProviderId,
        request: &Value,
        config: &DispatchConfig,
    ) -> DispatchResult {
        let Some(primary) = self.registry.get(provider) else {
            warn!(provider = %provider, "Dispatch to unregistered provider");
            return DispatchResult {
                success: false,
                data: None,
                error: Some(DispatchError::not_registered(provider.as_str())),
                provider: provider.to_string(),
                attempts: 0,
                fallback_used: false,
                elapsed_ms: 0,
                retry_history: Vec::new(),
            };
        };

        let mut candidates = vec![ChainCandidate::new(
            provider.as_str(),
            primary,
            request.clone(),
        )];

        if config.enable_fallback {
            for fallback in self.chains.chain_for(provider) {
                match self.registry.get(fallback) {
                    Some(executor) => candidates.push(ChainCandidate::new(
                        fallback.as_str(),
                        executor,
                        request.clone(),
                    )),
                    None => warn!(
                        provider = %provider,
                        fallback = %fallback,
                        "Fallback provider not registered, skipping"
                    ),
                }
            }
        }

        let settings = ChainSettings {
            retry: config.retry_policy(),
            timeout: config.timeout,
            max_consecutive_timeouts: config.max_consecutive_timeouts,
        };

        let outcome = run_chain(&candidates, &settings, &self.classifier, &self.stats).await;
        let success = outcome.success();

        if success {
            info!(
                requested = %provider,
                provider = outcome.used.as_deref().unwrap_or_default(),
                attempts = outcome.attempts,
                fallback_used = outcome.fallback_used,
                "Dispatch succeeded"
            );
        } else {
            warn!(
                requested = %provider,
                attempts = outcome.attempts,
                "Dispatch failed: {}",
                outcome
                    .error
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default()
            );
        }

        DispatchResult {
            success,
            data: outcome.data,
            error: outcome.error,
            provider: outcome.used.unwrap_or_else(|| provider.to_string()),
            attempts: outcome.attempts,
            fallback_used: outcome.fallback_used,
            elapsed_ms: outcome.elapsed.as_millis() as u64,
            retry_history: outcome.history,
        }
    }
}

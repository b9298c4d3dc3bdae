//! Executor registry and static fallback chains.

use std::collections::HashMap;
use std::sync::Arc;

use aiflow_models::ProviderId;

use crate::executor::ServiceExecutor;

/// Mapping from provider id to its executor, populated once at startup.
#[derive(Default, Clone)]
pub struct ExecutorRegistry {
    executors: HashMap<ProviderId, Arc<dyn ServiceExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executor (builder style).
    pub fn with(mut self, id: impl Into<ProviderId>, executor: Arc<dyn ServiceExecutor>) -> Self {
        self.register(id, executor);
        self
    }

    /// Register an executor, replacing any previous one under the same id.
    pub fn register(&mut self, id: impl Into<ProviderId>, executor: Arc<dyn ServiceExecutor>) {
        self.executors.insert(id.into(), executor);
    }

    pub fn get(&self, id: &ProviderId) -> Option<Arc<dyn ServiceExecutor>> {
        self.executors.get(id).cloned()
    }

    pub fn contains(&self, id: &ProviderId) -> bool {
        self.executors.contains_key(id)
    }

    /// Registered provider ids, sorted for stable output.
    pub fn ids(&self) -> Vec<ProviderId> {
        let mut ids: Vec<_> = self.executors.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ProviderId, &Arc<dyn ServiceExecutor>)> {
        self.executors.iter()
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("providers", &self.ids())
            .finish()
    }
}

/// Ordered alternates per originating provider. Read-only after startup.
#[derive(Debug, Default, Clone)]
pub struct FallbackChains {
    chains: HashMap<ProviderId, Vec<ProviderId>>,
}

impl FallbackChains {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the chain for `primary` (builder style).
    pub fn with_chain<I, P>(mut self, primary: impl Into<ProviderId>, fallbacks: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<ProviderId>,
    {
        let primary = primary.into();
        let chain: Vec<ProviderId> = fallbacks
            .into_iter()
            .map(Into::into)
            .filter(|id| *id != primary)
            .collect();
        self.chains.insert(primary, chain);
        self
    }

    /// Fallbacks configured for `primary`, in order. Empty if none.
    pub fn chain_for(&self, primary: &ProviderId) -> &[ProviderId] {
        self.chains.get(primary).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Load chains from `FALLBACK_<PROVIDER>=a,b,c` variables for the given providers.
    pub fn from_env(providers: &[ProviderId]) -> Self {
        let mut chains = Self::new();
        for provider in providers {
            let key = format!("FALLBACK_{}", env_key(provider.as_str()));
            if let Ok(value) = std::env::var(&key) {
                let fallbacks: Vec<ProviderId> = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(ProviderId::from)
                    .collect();
                chains = chains.with_chain(provider.clone(), fallbacks);
            }
        }
        chains
    }
}

/// Normalize a provider id into an environment variable suffix.
pub fn env_key(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}

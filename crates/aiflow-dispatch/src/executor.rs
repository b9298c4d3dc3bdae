//! Provider executor capability.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ProviderError;

/// Executes a single request against one provider.
///
/// Implementations hold no per-call state and may be invoked concurrently
/// from independent dispatches.
#[async_trait]
pub trait ServiceExecutor: Send + Sync {
    /// Perform the call.
    async fn execute(&self, request: &Value) -> Result<Value, ProviderError>;

    /// Cheap local check run before any network round trip.
    ///
    /// Returning `false` aborts the whole chain: the same request would be
    /// rejected by every provider.
    fn validate_input(&self, _request: &Value) -> bool {
        true
    }

    /// Liveness probe used by the health monitor.
    async fn health_check(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

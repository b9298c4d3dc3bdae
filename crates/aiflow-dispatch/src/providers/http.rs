//! Generic JSON-over-HTTP executor.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::error::ProviderError;
use crate::executor::ServiceExecutor;

/// POSTs the request body as JSON and returns the JSON reply.
///
/// Used for providers configured through `PROVIDER_<NAME>_URL`.
pub struct HttpJsonExecutor {
    endpoint: String,
    api_key: Option<String>,
    client: Client,
}

impl HttpJsonExecutor {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            client: Client::new(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Build from `PROVIDER_<KEY>_URL` and optional `PROVIDER_<KEY>_API_KEY`.
    pub fn from_env(env_key: &str) -> Option<Self> {
        let endpoint = std::env::var(format!("PROVIDER_{}_URL", env_key)).ok()?;
        let mut executor = Self::new(endpoint);
        if let Ok(key) = std::env::var(format!("PROVIDER_{}_API_KEY", env_key)) {
            executor = executor.with_api_key(key);
        }
        Some(executor)
    }
}

#[async_trait]
impl ServiceExecutor for HttpJsonExecutor {
    async fn execute(&self, request: &Value) -> Result<Value, ProviderError> {
        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ProviderError::network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::with_status(
                format!("{} returned {}: {}", self.endpoint, status, body),
                status.as_u16(),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::new(format!("invalid JSON response: {}", e)))
    }

    fn validate_input(&self, request: &Value) -> bool {
        request.is_object()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_posts_json_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .and(header("authorization", "Bearer secret"))
            .and(body_json(json!({ "prompt": "a red fox" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "url": "https://cdn/x.png" })))
            .expect(1)
            .mount(&server)
            .await;

        let executor =
            HttpJsonExecutor::new(format!("{}/generate", server.uri())).with_api_key("secret");
        let out = executor.execute(&json!({ "prompt": "a red fox" })).await.unwrap();
        assert_eq!(out["url"], "https://cdn/x.png");
    }

    #[tokio::test]
    async fn test_rate_limit_keeps_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let executor = HttpJsonExecutor::new(server.uri());
        let err = executor.execute(&json!({})).await.unwrap_err();
        assert_eq!(err.status_code, Some(429));
    }

    #[test]
    fn test_validate_input_requires_object() {
        let executor = HttpJsonExecutor::new("http://localhost");
        assert!(executor.validate_input(&json!({ "a": 1 })));
        assert!(!executor.validate_input(&json!("text")));
    }
}

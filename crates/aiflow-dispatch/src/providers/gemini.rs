//! Gemini generateContent executor.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::ProviderError;
use crate::executor::ServiceExecutor;
use crate::providers::strip_code_fence;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Gemini API executor.
pub struct GeminiExecutor {
    api_key: String,
    base_url: String,
    default_model: String,
    client: Client,
}

/// Gemini API request.
#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    File {
        #[serde(rename = "fileData")]
        file_data: FileData,
    },
}

#[derive(Debug, Serialize)]
struct FileData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    #[serde(rename = "fileUri")]
    file_uri: String,
}

/// Gemini API response.
#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

impl GeminiExecutor {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            client: Client::new(),
        }
    }

    /// Create from `GEMINI_API_KEY` / `GEMINI_BASE_URL`.
    pub fn from_env() -> Result<Self, ProviderError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| ProviderError::new("GEMINI_API_KEY not set"))?;
        let mut executor = Self::new(api_key);
        if let Ok(base_url) = std::env::var("GEMINI_BASE_URL") {
            executor = executor.with_base_url(base_url);
        }
        Ok(executor)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    fn build_request(&self, request: &Value) -> GeminiRequest {
        let prompt = request["prompt"].as_str().unwrap_or_default();
        let mut parts = vec![Part::Text {
            text: prompt.to_string(),
        }];

        if let Some(url) = request["content_url"].as_str() {
            match request["mime_type"].as_str() {
                Some(mime) => parts.push(Part::File {
                    file_data: FileData {
                        mime_type: mime.to_string(),
                        file_uri: url.to_string(),
                    },
                }),
                None => parts.push(Part::Text {
                    text: format!("Content URL: {}", url),
                }),
            }
        }
        if let Some(note) = request["annotation"].as_str() {
            parts.push(Part::Text {
                text: format!("User note: {}", note),
            });
        }

        // Selector-shaped prompts already open with the instruction.
        let system_instruction = request["system_instruction"]
            .as_str()
            .filter(|s| !prompt.starts_with(*s))
            .map(|s| Content {
                parts: vec![Part::Text {
                    text: s.to_string(),
                }],
            });

        GeminiRequest {
            contents: vec![Content { parts }],
            system_instruction,
        }
    }
}

#[async_trait]
impl ServiceExecutor for GeminiExecutor {
    async fn execute(&self, request: &Value) -> Result<Value, ProviderError> {
        let model = request["model"].as_str().unwrap_or(&self.default_model);
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        );
        debug!(model, "Calling Gemini generateContent");

        let response = self
            .client
            .post(&url)
            .json(&self.build_request(request))
            .send()
            .await
            .map_err(|e| ProviderError::network(e.without_url().to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::with_status(
                format!("Gemini API returned {}: {}", status, error_text),
                status.as_u16(),
            ));
        }

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::new(format!("Failed to parse Gemini response: {}", e)))?;

        let text = gemini_response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .ok_or_else(|| ProviderError::new("No content in Gemini response"))?;

        let text = strip_code_fence(text);
        Ok(serde_json::from_str(text).unwrap_or_else(|_| json!({ "text": text })))
    }

    fn validate_input(&self, request: &Value) -> bool {
        request["prompt"]
            .as_str()
            .is_some_and(|p| !p.trim().is_empty())
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        let url = format!(
            "{}/v1beta/models/{}?key={}",
            self.base_url, self.default_model, self.api_key
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::network(e.without_url().to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::with_status(
                format!("Gemini health check returned {}", response.status()),
                response.status().as_u16(),
            ))
        }
    }
}

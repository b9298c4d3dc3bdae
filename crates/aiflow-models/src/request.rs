//! Analysis request submitted to a model selector.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{ModelError, ModelResult};
use crate::provider::AnalysisType;

/// A request to analyze one piece of content.
///
/// Immutable once built; consumed by a single selector dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct AnalysisRequest {
    /// URL of the content to analyze
    #[validate(url)]
    pub content_url: String,

    /// Instruction / prompt for the model
    #[validate(length(min = 1, max = 32000))]
    pub instruction: String,

    /// Optional free-form note from the user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 4000))]
    pub annotation: Option<String>,

    /// Restrict candidates to models supporting this analysis type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_type: Option<AnalysisType>,
}

impl AnalysisRequest {
    pub fn new(content_url: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            content_url: content_url.into(),
            instruction: instruction.into(),
            annotation: None,
            analysis_type: None,
        }
    }

    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotation = Some(annotation.into());
        self
    }

    pub fn with_analysis_type(mut self, analysis_type: impl Into<AnalysisType>) -> Self {
        self.analysis_type = Some(analysis_type.into());
        self
    }

    /// Validate field constraints, flattening validator output into one message.
    pub fn check(&self) -> ModelResult<()> {
        self.validate()
            .map_err(|e| ModelError::invalid_request(e.to_string().replace('\n', "; ")))
    }

    /// Parse and validate a request from a job payload.
    pub fn from_payload(payload: &serde_json::Value) -> ModelResult<Self> {
        let request: Self = serde_json::from_value(payload.clone())
            .map_err(|e| ModelError::invalid_payload(e.to_string()))?;
        request.check()?;
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_request_passes() {
        let req = AnalysisRequest::new("https://cdn.example.com/cat.png", "Describe the image")
            .with_analysis_type("ocr");
        assert!(req.check().is_ok());
        assert_eq!(req.analysis_type.unwrap().as_str(), "ocr");
    }

    #[test]
    fn test_invalid_url_rejected() {
        let req = AnalysisRequest::new("not a url", "Describe");
        assert!(matches!(req.check(), Err(ModelError::InvalidRequest(_))));
    }

    #[test]
    fn test_empty_instruction_rejected() {
        let req = AnalysisRequest::new("https://cdn.example.com/a.mp4", "");
        assert!(req.check().is_err());
    }

    #[test]
    fn test_from_payload() {
        let payload = json!({
            "content_url": "https://cdn.example.com/a.mp3",
            "instruction": "Transcribe",
            "analysis_type": "transcription"
        });
        let req = AnalysisRequest::from_payload(&payload).unwrap();
        assert_eq!(req.instruction, "Transcribe");
        assert!(req.annotation.is_none());

        let missing = json!({ "instruction": "x" });
        assert!(matches!(
            AnalysisRequest::from_payload(&missing),
            Err(ModelError::InvalidPayload(_))
        ));
    }
}

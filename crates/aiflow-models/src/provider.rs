//! Provider identifiers, content domains and capability tags.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Identifier of a third-party execution backend.
///
/// Defined at configuration time and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ProviderId(pub String);

impl ProviderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ProviderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Content domain handled by a model selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContentDomain {
    Image,
    Video,
    Text,
    Audio,
}

impl ContentDomain {
    pub const ALL: [ContentDomain; 4] = [
        ContentDomain::Image,
        ContentDomain::Video,
        ContentDomain::Text,
        ContentDomain::Audio,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentDomain::Image => "image",
            ContentDomain::Video => "video",
            ContentDomain::Text => "text",
            ContentDomain::Audio => "audio",
        }
    }

    /// Default per-attempt timeout for analyses in this domain.
    ///
    /// Video providers are markedly slower than the others.
    pub fn default_timeout(&self) -> Duration {
        match self {
            ContentDomain::Image | ContentDomain::Text => Duration::from_secs(30),
            ContentDomain::Audio => Duration::from_secs(60),
            ContentDomain::Video => Duration::from_secs(90),
        }
    }
}

impl fmt::Display for ContentDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ContentDomain {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "image" => Ok(ContentDomain::Image),
            "video" => Ok(ContentDomain::Video),
            "text" => Ok(ContentDomain::Text),
            "audio" => Ok(ContentDomain::Audio),
            other => Err(ModelError::UnknownDomain(other.to_string())),
        }
    }
}

/// Capability tag describing one kind of analysis a model supports
/// (e.g. `ocr`, `object_detection`, `transcription`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct AnalysisType(pub String);

impl AnalysisType {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AnalysisType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

//! Request and error types shared by every generator adapter.

use std::fmt;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use thiserror::Error;

use super::registry::ToolRegistry;
use crate::equipment::ReferenceMaterial;

/// Identifies the prompt a request was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKey {
    IdentifyFunctions,
    FailureModes,
    ConsequenceAssessment,
    SuggestTasks,
    MaintenancePlan,
}

impl fmt::Display for PromptKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::IdentifyFunctions => "identify_functions",
            Self::FailureModes => "failure_modes",
            Self::ConsequenceAssessment => "consequence_assessment",
            Self::SuggestTasks => "suggest_tasks",
            Self::MaintenancePlan => "maintenance_plan",
        };
        f.write_str(s)
    }
}

/// An image passed to the model alongside the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    pub media_type: String,
    pub data_uri: String,
}

impl ImageAttachment {
    /// Extract the attachment from reference material, if it is an image.
    pub fn from_reference(material: &ReferenceMaterial) -> Option<Self> {
        match material {
            ReferenceMaterial::Image {
                media_type,
                data_uri,
            } => Some(Self {
                media_type: media_type.clone(),
                data_uri: data_uri.clone(),
            }),
            ReferenceMaterial::Text { .. } => None,
        }
    }

    /// Decode the base64 payload of the data URI.
    pub fn decode(&self) -> Result<Vec<u8>, GenerationError> {
        let payload = self
            .data_uri
            .split_once(";base64,")
            .map(|(_, payload)| payload)
            .ok_or_else(|| GenerationError::InvalidAttachment("missing base64 payload".into()))?;
        STANDARD
            .decode(payload.trim())
            .map_err(|e| GenerationError::InvalidAttachment(e.to_string()))
    }

    /// File extension matching the media type (without the dot).
    pub fn extension(&self) -> &str {
        match self.media_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/gif" => "gif",
            "image/webp" => "webp",
            _ => "png",
        }
    }
}

/// A single structured-generation call.
///
/// `schema` is a JSON Schema the returned value must satisfy. When `tools`
/// is set, the generator may invoke any registered tool zero or more times
/// before returning the final value.
#[derive(Debug, Clone)]
pub struct GenerationRequest<'a> {
    pub key: PromptKey,
    pub prompt: String,
    pub schema: Value,
    pub image: Option<ImageAttachment>,
    pub tools: Option<&'a ToolRegistry>,
}

impl<'a> GenerationRequest<'a> {
    pub fn new(key: PromptKey, prompt: impl Into<String>, schema: Value) -> Self {
        Self {
            key,
            prompt: prompt.into(),
            schema,
            image: None,
            tools: None,
        }
    }

    pub fn with_image(mut self, image: Option<ImageAttachment>) -> Self {
        self.image = image;
        self
    }

    pub fn with_tools(mut self, tools: &'a ToolRegistry) -> Self {
        self.tools = Some(tools);
        self
    }
}

/// Errors from a generation call.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("failed to launch generator {binary:?}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("generator exited with {status}: {stderr}")]
    Process { status: String, stderr: String },

    #[error("generator timed out after {0:?}")]
    Timeout(Duration),

    #[error("model reported an error: {0}")]
    Model(String),

    #[error("malformed generator response: {0}")]
    MalformedResponse(String),

    #[error("output for {key} does not match its schema: {source}")]
    Schema {
        key: PromptKey,
        #[source]
        source: serde_json::Error,
    },

    #[error("model requested unknown tool {0:?}")]
    UnknownTool(String),

    #[error("tool {name:?} failed: {message}")]
    Tool { name: String, message: String },

    #[error("model exceeded {0} tool rounds without producing output")]
    ToolRoundsExceeded(usize),

    #[error("invalid image attachment: {0}")]
    InvalidAttachment(String),

    #[error("generator I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_decodes_payload() {
        let image = ImageAttachment {
            media_type: "image/png".into(),
            data_uri: "data:image/png;base64,YWJj".into(),
        };
        assert_eq!(image.decode().unwrap(), b"abc");
        assert_eq!(image.extension(), "png");
    }

    #[test]
    fn attachment_without_payload_is_invalid() {
        let image = ImageAttachment {
            media_type: "image/jpeg".into(),
            data_uri: "data:image/jpeg,raw".into(),
        };
        assert!(matches!(
            image.decode(),
            Err(GenerationError::InvalidAttachment(_))
        ));
        assert_eq!(image.extension(), "jpg");
    }

    #[test]
    fn text_reference_has_no_attachment() {
        let text = ReferenceMaterial::Text {
            content: "manual".into(),
        };
        assert!(ImageAttachment::from_reference(&text).is_none());
    }
}

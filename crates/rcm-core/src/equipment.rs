//! Pipeline input: the equipment under analysis and optional reference
//! material supplied by the operator.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use thiserror::Error;

/// Minimum description length accepted by [`EquipmentDescriptor::new`].
pub const MIN_DESCRIPTION_CHARS: usize = 10;

/// Errors from validating operator input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("equipment tag is required")]
    EmptyTag,

    #[error("equipment description must be at least {min} characters (got {actual})")]
    DescriptionTooShort { min: usize, actual: usize },
}

/// Optional material the operator attaches to ground the final plan.
///
/// Text is inlined into the plan prompt; images are passed to the generator
/// as a multimodal attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReferenceMaterial {
    Text { content: String },
    Image { media_type: String, data_uri: String },
}

impl ReferenceMaterial {
    /// Classify raw operator input.
    ///
    /// A `data:image/<type>;base64,...` URI becomes [`ReferenceMaterial::Image`],
    /// any other non-blank string becomes [`ReferenceMaterial::Text`], and
    /// blank input yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        let image_type = trimmed
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(";base64,"))
            .map(|(media_type, _payload)| media_type)
            .filter(|media_type| media_type.starts_with("image/"));

        if let Some(media_type) = image_type {
            return Some(Self::Image {
                media_type: media_type.to_string(),
                data_uri: trimmed.to_string(),
            });
        }

        Some(Self::Text {
            content: trimmed.to_string(),
        })
    }

    /// Build an image reference from raw bytes, encoding them as a data URI.
    pub fn image_from_bytes(media_type: impl Into<String>, bytes: &[u8]) -> Self {
        let media_type = media_type.into();
        let data_uri = format!("data:{media_type};base64,{}", STANDARD.encode(bytes));
        Self::Image {
            media_type,
            data_uri,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image { .. })
    }
}

/// The equipment under analysis. Validated once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EquipmentDescriptor {
    tag: String,
    description: String,
    reference_material: Option<ReferenceMaterial>,
}

impl EquipmentDescriptor {
    /// Validate and build a descriptor.
    ///
    /// The tag must be non-blank and the description must contain at least
    /// [`MIN_DESCRIPTION_CHARS`] characters after trimming.
    pub fn new(
        tag: impl Into<String>,
        description: impl Into<String>,
        reference_material: Option<ReferenceMaterial>,
    ) -> Result<Self, DescriptorError> {
        let tag = tag.into().trim().to_string();
        let description = description.into().trim().to_string();

        if tag.is_empty() {
            return Err(DescriptorError::EmptyTag);
        }

        let actual = description.chars().count();
        if actual < MIN_DESCRIPTION_CHARS {
            return Err(DescriptorError::DescriptionTooShort {
                min: MIN_DESCRIPTION_CHARS,
                actual,
            });
        }

        Ok(Self {
            tag,
            description,
            reference_material,
        })
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn reference_material(&self) -> Option<&ReferenceMaterial> {
        self.reference_material.as_ref()
    }
}

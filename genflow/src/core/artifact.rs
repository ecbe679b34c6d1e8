//! Pipeline artifacts and normalized image results.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::{decode_base64, encode_base64, generate_uuid, iso_timestamp, sha256_hex, split_data_url};

/// Mime type assumed for inline images that arrive without one.
pub const DEFAULT_IMAGE_MIME: &str = "image/png";

/// The kind of content an artifact holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    /// Typography reference supplied by the caller.
    TypographySet,
    /// Scene description rewritten by a model.
    EnhancedPrompt,
    /// Standalone generated image.
    ImageReference,
    /// Final composed poster image.
    CompositeImage,
    /// Generated video.
    VideoReference,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypographySet => write!(f, "typography-set"),
            Self::EnhancedPrompt => write!(f, "enhanced-prompt"),
            Self::ImageReference => write!(f, "image-reference"),
            Self::CompositeImage => write!(f, "composite-image"),
            Self::VideoReference => write!(f, "video-reference"),
        }
    }
}

/// An image as returned by a vendor, normalized right after the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageResult {
    /// Raw image bytes.
    Inline {
        /// Decoded image bytes.
        bytes: Vec<u8>,
        /// Content type, when the vendor reports one.
        mime_type: Option<String>,
    },
    /// A dereferenceable location.
    Reference(String),
}

impl ImageResult {
    /// Builds an inline result from a base64 body, as found in `b64_json`.
    #[must_use]
    pub fn from_base64(encoded: &str, mime_type: Option<String>) -> Option<Self> {
        decode_base64(encoded).map(|bytes| Self::Inline { bytes, mime_type })
    }
}

/// Where an artifact's content lives. Callers must accept either form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArtifactPayload {
    /// A dereferenceable URL.
    Url {
        /// The URL.
        url: String,
    },
    /// An inline base64 blob.
    Inline {
        /// Content type of the decoded bytes.
        mime_type: String,
        /// Standard base64 body.
        base64: String,
    },
}

impl ArtifactPayload {
    /// Creates a URL payload.
    #[must_use]
    pub fn url(url: impl Into<String>) -> Self {
        Self::Url { url: url.into() }
    }

    /// Creates an inline payload from raw bytes.
    #[must_use]
    pub fn inline(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self::Inline {
            mime_type: mime_type.into(),
            base64: encode_base64(bytes),
        }
    }

    /// Interprets a vendor output reference, which may be a `data:` URL.
    #[must_use]
    pub fn from_reference(reference: &str) -> Self {
        match split_data_url(reference) {
            Some((mime_type, base64)) => Self::Inline { mime_type, base64 },
            None => Self::url(reference.trim()),
        }
    }

    /// Returns true for inline payloads.
    #[must_use]
    pub fn is_inline(&self) -> bool {
        matches!(self, Self::Inline { .. })
    }

    /// Returns the URL for URL payloads.
    #[must_use]
    pub fn as_url(&self) -> Option<&str> {
        match self {
            Self::Url { url } => Some(url),
            Self::Inline { .. } => None,
        }
    }

    /// Renders the payload as something a browser or vendor can dereference.
    #[must_use]
    pub fn to_data_url(&self) -> String {
        match self {
            Self::Url { url } => url.clone(),
            Self::Inline { mime_type, base64 } => format!("data:{mime_type};base64,{base64}"),
        }
    }

    /// Decodes an inline payload.
    #[must_use]
    pub fn decode_inline(&self) -> Option<Vec<u8>> {
        match self {
            Self::Inline { base64, .. } => decode_base64(base64),
            Self::Url { .. } => None,
        }
    }

    /// Hex sha256 over the decoded inline bytes, or over the URL text.
    #[must_use]
    pub fn digest(&self) -> String {
        match self {
            Self::Url { url } => sha256_hex(url.as_bytes()),
            Self::Inline { base64, .. } => match decode_base64(base64) {
                Some(bytes) => sha256_hex(&bytes),
                None => sha256_hex(base64.as_bytes()),
            },
        }
    }
}

impl From<ImageResult> for ArtifactPayload {
    fn from(result: ImageResult) -> Self {
        match result {
            ImageResult::Inline { bytes, mime_type } => Self::inline(
                &bytes,
                mime_type.unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string()),
            ),
            ImageResult::Reference(reference) => Self::from_reference(&reference),
        }
    }
}

/// A finished or intermediate unit of pipeline output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineArtifact {
    /// Unique identifier.
    pub id: String,
    /// What the artifact holds.
    pub kind: ArtifactKind,
    /// Where the content lives.
    pub payload: ArtifactPayload,
    /// Name of the stage that produced it.
    pub produced_by: String,
    /// When the artifact was created (ISO 8601).
    pub created_at: String,
}

impl PipelineArtifact {
    /// Creates a new artifact.
    #[must_use]
    pub fn new(kind: ArtifactKind, payload: ArtifactPayload, produced_by: impl Into<String>) -> Self {
        Self {
            id: generate_uuid().to_string(),
            kind,
            payload,
            produced_by: produced_by.into(),
            created_at: iso_timestamp(),
        }
    }
}

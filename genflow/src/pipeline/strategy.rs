//! Poster strategies and name resolution.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use super::StageName;
use crate::errors::GenflowError;

/// One interchangeable way of turning (typography, description) into a
/// composite image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Image-edit job seeded with the typography and an enhanced description.
    #[default]
    Edit,
    /// Text-to-image from the description alone.
    Generate,
    /// Vision-and-generation call given the typography inline.
    Responses,
}

impl Strategy {
    /// Resolves a caller-supplied name.
    ///
    /// Unknown names fall back to [`Strategy::Edit`]; the second element is
    /// true when that happened. `default` names `Edit` explicitly and is not a
    /// fallback.
    #[must_use]
    pub fn resolve(name: &str) -> (Self, bool) {
        match name.parse() {
            Ok(strategy) => (strategy, false),
            Err(_) => {
                warn!(strategy = %name, "Unknown strategy, falling back to edit");
                (Self::Edit, true)
            }
        }
    }

    /// Returns the stages this strategy runs, in order.
    #[must_use]
    pub fn stages(&self) -> &'static [StageName] {
        match self {
            Self::Edit => &[StageName::Typography, StageName::PromptEnhancement, StageName::Composite],
            Self::Generate => &[StageName::PromptEnhancement, StageName::BackgroundImage, StageName::Composite],
            Self::Responses => &[StageName::Typography, StageName::Composite],
        }
    }

    /// Returns the strategy name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Edit => "edit",
            Self::Generate => "generate",
            Self::Responses => "responses",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = GenflowError;

    /// Strict parsing: unknown names are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "edit" | "default" => Ok(Self::Edit),
            "generate" => Ok(Self::Generate),
            "responses" => Ok(Self::Responses),
            _ => Err(GenflowError::invalid_request(format!("unknown strategy '{s}'"))),
        }
    }
}

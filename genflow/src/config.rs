//! Startup configuration for the orchestration core.
//!
//! Configuration is explicit: collaborators load a [`GenflowConfig`] once
//! and hand it to the pipelines. Nothing in the core consults module-level
//! mutable state.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::errors::GenflowError;
use crate::pipeline::ImageFailurePolicy;
use crate::poll::PollOptions;
use crate::utils::non_empty_env;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenflowConfig {
    /// Default polling budget for vendor jobs.
    #[serde(default)]
    pub poll: PollOptions,
    /// Attempt budget for sermon angle generation.
    #[serde(default = "default_angle_attempts")]
    pub angle_attempts: u32,
    /// Model used at each call site.
    #[serde(default)]
    pub models: ModelConfig,
    /// Vendor API locations and credentials.
    #[serde(default)]
    pub endpoints: VendorEndpoints,
    /// What the sermon outline does when its illustration fails.
    #[serde(default)]
    pub sermon_image_policy: ImageFailurePolicy,
}

fn default_angle_attempts() -> u32 {
    3
}

impl Default for GenflowConfig {
    fn default() -> Self {
        Self {
            poll: PollOptions::default(),
            angle_attempts: default_angle_attempts(),
            models: ModelConfig::default(),
            endpoints: VendorEndpoints::default(),
            sermon_image_policy: ImageFailurePolicy::default(),
        }
    }
}

impl GenflowConfig {
    /// Parses and validates a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, GenflowError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| GenflowError::Config(format!("invalid configuration JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, GenflowError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| GenflowError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    /// Overlays `GENFLOW_*` and vendor credential environment variables.
    ///
    /// Blank variables are ignored.
    pub fn from_env_overlay(self) -> Result<Self, GenflowError> {
        self.overlay_with(non_empty_env)
    }

    fn overlay_with(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, GenflowError> {
        if let Some(value) = lookup("GENFLOW_POLL_INTERVAL_MS") {
            self.poll.interval_ms = parse_number("GENFLOW_POLL_INTERVAL_MS", &value)?;
        }
        if let Some(value) = lookup("GENFLOW_MAX_POLLS") {
            self.poll.max_polls = parse_number("GENFLOW_MAX_POLLS", &value)?;
        }
        if let Some(value) = lookup("GENFLOW_POLL_TIMEOUT_MS") {
            self.poll.timeout_ms = parse_number("GENFLOW_POLL_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = lookup("GENFLOW_ANGLE_ATTEMPTS") {
            self.angle_attempts = parse_number("GENFLOW_ANGLE_ATTEMPTS", &value)?;
        }
        if let Some(token) = lookup("REPLICATE_API_TOKEN") {
            self.endpoints.replicate_api_token = Some(token);
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.endpoints.openai_api_key = Some(key);
        }
        if let Some(base) = lookup("REPLICATE_API_BASE") {
            self.endpoints.replicate_api_base = base.trim_end_matches('/').to_string();
        }
        if let Some(base) = lookup("OPENAI_API_BASE") {
            self.endpoints.openai_api_base = base.trim_end_matches('/').to_string();
        }
        self.validate()?;
        Ok(self)
    }

    /// Rejects budgets that could never complete.
    pub fn validate(&self) -> Result<(), GenflowError> {
        self.poll.validate()?;
        if self.angle_attempts == 0 {
            return Err(GenflowError::Config("angle_attempts must be >= 1".to_string()));
        }
        if self.endpoints.request_timeout_secs == 0 {
            return Err(GenflowError::Config("request_timeout_secs must be > 0".to_string()));
        }
        Ok(())
    }
}

fn parse_number<N: std::str::FromStr>(key: &str, value: &str) -> Result<N, GenflowError> {
    value
        .trim()
        .parse()
        .map_err(|_| GenflowError::Config(format!("{key} must be a non-negative integer, got '{value}'")))
}

/// Model identifiers per call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Rewrites the scene description for the edit strategy.
    pub prompt_enhancement: String,
    /// Image-edit job seeded with the typography.
    pub image_edit: String,
    /// Text-to-image model for the generate strategy.
    pub text_to_image: String,
    /// Combined vision-and-generation model.
    pub responses: String,
    /// Video synthesis job.
    pub video: String,
    /// Sermon angle generation.
    pub angles: String,
    /// Sermon outline expansion.
    pub outline: String,
    /// Sermon illustration.
    pub illustration: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            prompt_enhancement: "gpt-4o-mini".to_string(),
            image_edit: "black-forest-labs/flux-kontext-pro".to_string(),
            text_to_image: "gpt-image-1".to_string(),
            responses: "gpt-4.1".to_string(),
            video: "minimax/video-01".to_string(),
            angles: "gpt-4o-mini".to_string(),
            outline: "gpt-4o".to_string(),
            illustration: "gpt-image-1".to_string(),
        }
    }
}

/// Vendor base URLs and credentials. Credentials are never serialized.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VendorEndpoints {
    /// Replicate API base URL.
    pub replicate_api_base: String,
    /// OpenAI API base URL.
    pub openai_api_base: String,
    /// Replicate bearer token.
    #[serde(skip_serializing)]
    pub replicate_api_token: Option<String>,
    /// OpenAI API key.
    #[serde(skip_serializing)]
    pub openai_api_key: Option<String>,
    /// Per-request HTTP timeout, in seconds.
    pub request_timeout_secs: u64,
}

impl std::fmt::Debug for VendorEndpoints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VendorEndpoints")
            .field("replicate_api_base", &self.replicate_api_base)
            .field("openai_api_base", &self.openai_api_base)
            .field("has_replicate_token", &self.replicate_api_token.is_some())
            .field("has_openai_key", &self.openai_api_key.is_some())
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Default for VendorEndpoints {
    fn default() -> Self {
        Self {
            replicate_api_base: "https://api.replicate.com/v1".to_string(),
            openai_api_base: "https://api.openai.com/v1".to_string(),
            replicate_api_token: None,
            openai_api_key: None,
            request_timeout_secs: 120,
        }
    }
}

impl VendorEndpoints {
    /// Gets the request timeout as a Duration.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = GenflowConfig::default();
        assert_eq!(config.poll.max_polls, 60);
        assert_eq!(config.angle_attempts, 3);
        assert_eq!(config.sermon_image_policy, ImageFailurePolicy::Degrade);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = GenflowConfig::from_json_str(
            r#"{"poll": {"max_polls": 10}, "models": {"outline": "gpt-4.1"}}"#,
        )
        .unwrap();
        assert_eq!(config.poll.max_polls, 10);
        assert_eq!(config.poll.interval_ms, 1000);
        assert_eq!(config.models.outline, "gpt-4.1");
        assert_eq!(config.models.angles, "gpt-4o-mini");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = GenflowConfig::from_json_str(r#"{"angle_attempts": 0}"#).unwrap_err();
        assert!(matches!(err, GenflowError::Config(_)));

        let err = GenflowConfig::from_json_str(r#"{"poll": {"interval_ms": 0}}"#).unwrap_err();
        assert_eq!(err.http_status(), 500);

        assert!(GenflowConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"sermon_image_policy": "fail_fast", "angle_attempts": 5}}"#).unwrap();

        let config = GenflowConfig::from_file(file.path()).unwrap();
        assert_eq!(config.sermon_image_policy, ImageFailurePolicy::FailFast);
        assert_eq!(config.angle_attempts, 5);

        let missing = GenflowConfig::from_file(file.path().with_extension("missing"));
        assert!(missing.is_err());
    }

    #[test]
    fn test_overlay() {
        let vars: HashMap<&str, &str> = [
            ("GENFLOW_MAX_POLLS", "12"),
            ("GENFLOW_ANGLE_ATTEMPTS", "4"),
            ("OPENAI_API_KEY", "sk-test"),
            ("REPLICATE_API_BASE", "http://localhost:9000/v1/"),
        ]
        .into_iter()
        .collect();

        let config = GenflowConfig::default()
            .overlay_with(|key| vars.get(key).map(|v| (*v).to_string()))
            .unwrap();

        assert_eq!(config.poll.max_polls, 12);
        assert_eq!(config.angle_attempts, 4);
        assert_eq!(config.endpoints.openai_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.endpoints.replicate_api_base, "http://localhost:9000/v1");
    }

    #[test]
    fn test_overlay_rejects_garbage() {
        let err = GenflowConfig::default()
            .overlay_with(|key| (key == "GENFLOW_MAX_POLLS").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("GENFLOW_MAX_POLLS"));
    }

    #[test]
    fn test_credentials_are_not_serialized() {
        let mut config = GenflowConfig::default();
        config.endpoints.openai_api_key = Some("sk-secret".to_string());

        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sk-secret"));
        assert!(!format!("{:?}", config.endpoints).contains("sk-secret"));
    }
}

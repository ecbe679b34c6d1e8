//! Sermon angle and outline pipeline.
//!
//! Angle generation goes through the [`ValidatedRetrier`]; outline
//! expansion is a single completion with an optional illustration whose
//! failure handling is governed by an [`ImageFailurePolicy`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};

use super::{StageName, StageTrail};
use crate::config::{GenflowConfig, ModelConfig};
use crate::contracts::{FieldType, Shape, ValidatedRetrier};
use crate::core::ArtifactPayload;
use crate::errors::{GenflowError, NoImageProducedError, VendorError, VendorOperation};
use crate::events::{EventSink, NoOpEventSink};
use crate::vendor::{CompletionRequest, CompletionVendor, ImageRequest, ImageVendor, VendorPorts};

const ANGLE_INSTRUCTIONS: &str = "You help preachers find fresh angles on a text. Answer with a JSON \
object {\"angles\": [...]} holding 3 to 5 angles, each with string fields \"title\", \"summary\" and \
\"journey\".";

const OUTLINE_INSTRUCTIONS: &str = "Expand the chosen angle into a sermon outline with an \
introduction, three movements and a closing application.";

/// Minimum and maximum number of angles per set.
pub const ANGLE_COUNT: (usize, usize) = (3, 5);

/// What to do when an optional image branch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFailurePolicy {
    /// Fail the whole response.
    FailFast,
    /// Report no image and keep the rest of the response.
    #[default]
    Degrade,
}

/// Caller input for angle generation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SermonRequest {
    /// Sermon topic.
    pub topic: String,
    /// Scripture reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scripture: Option<String>,
    /// Target length, e.g. `20 minutes`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<String>,
    /// Intended audience.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
}

impl SermonRequest {
    /// Creates a request for `topic`.
    #[must_use]
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Self::default()
        }
    }

    /// Sets the scripture reference.
    #[must_use]
    pub fn with_scripture(mut self, scripture: impl Into<String>) -> Self {
        self.scripture = Some(scripture.into());
        self
    }

    /// Sets the target length.
    #[must_use]
    pub fn with_length(mut self, length: impl Into<String>) -> Self {
        self.length = Some(length.into());
        self
    }

    /// Sets the audience.
    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    fn validate(&self) -> Result<(), GenflowError> {
        if self.topic.trim().is_empty() {
            return Err(GenflowError::invalid_request("topic must not be blank"));
        }
        Ok(())
    }

    /// Renders the request as a prompt brief.
    fn brief(&self) -> String {
        let mut lines = vec![format!("Topic: {}", self.topic.trim())];
        let optional = [
            ("Scripture", &self.scripture),
            ("Length", &self.length),
            ("Audience", &self.audience),
        ];
        for (label, value) in optional {
            if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                lines.push(format!("{label}: {value}"));
            }
        }
        lines.join("\n")
    }
}

/// One candidate angle.
///
/// Models sometimes call the summary `description`. When both keys are
/// present, a non-null `summary` wins, the same precedence the angle shape
/// applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AngleRecord")]
pub struct SermonAngle {
    /// Short title.
    pub title: String,
    /// What the angle says.
    pub summary: String,
    /// How the sermon moves the listener.
    pub journey: String,
}

/// Wire form of an angle before the summary alias is resolved.
#[derive(Deserialize)]
struct AngleRecord {
    title: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    description: Option<String>,
    journey: String,
}

impl TryFrom<AngleRecord> for SermonAngle {
    type Error = String;

    fn try_from(record: AngleRecord) -> Result<Self, Self::Error> {
        let summary = record
            .summary
            .or(record.description)
            .ok_or_else(|| "missing field `summary`".to_string())?;
        Ok(Self {
            title: record.title,
            summary,
            journey: record.journey,
        })
    }
}

/// A validated set of angles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AngleSet {
    /// Between three and five angles.
    pub angles: Vec<SermonAngle>,
}

/// The shape every accepted angle set satisfies.
#[must_use]
pub fn angle_set_shape() -> Shape {
    let angle = Shape::new()
        .required("title", FieldType::non_empty_text())
        .required_with_aliases("summary", &["description"], FieldType::non_empty_text())
        .required("journey", FieldType::non_empty_text());
    Shape::new().required(
        "angles",
        FieldType::list_of(FieldType::Object(angle), ANGLE_COUNT.0, Some(ANGLE_COUNT.1)),
    )
}

/// Result of angle generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AngleResponse {
    /// The accepted angles.
    pub angles: Vec<SermonAngle>,
    /// Attempts spent, including the accepted one.
    pub attempts_used: u32,
}

/// Caller input for outline expansion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineRequest {
    /// The original sermon request.
    #[serde(flatten)]
    pub request: SermonRequest,
    /// The angle a human picked.
    pub angle: SermonAngle,
    /// Whether to attempt an illustration.
    #[serde(default)]
    pub with_image: bool,
}

/// Result of outline expansion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineResponse {
    /// Outline text.
    pub outline: String,
    /// Illustration, when requested and produced.
    pub image: Option<ArtifactPayload>,
    /// Why the illustration is missing, when it was requested but failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_error: Option<String>,
}

/// Angle generation and outline expansion.
#[derive(Clone)]
pub struct SermonPipeline {
    completions: Arc<dyn CompletionVendor>,
    images: Arc<dyn ImageVendor>,
    models: ModelConfig,
    angle_attempts: u32,
    image_policy: ImageFailurePolicy,
    events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for SermonPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SermonPipeline")
            .field("angle_attempts", &self.angle_attempts)
            .field("image_policy", &self.image_policy)
            .finish_non_exhaustive()
    }
}

impl SermonPipeline {
    /// Creates a pipeline from ports and configuration.
    #[must_use]
    pub fn new(ports: &VendorPorts, config: &GenflowConfig) -> Self {
        Self {
            completions: ports.completions.clone(),
            images: ports.images.clone(),
            models: config.models.clone(),
            angle_attempts: config.angle_attempts,
            image_policy: config.sermon_image_policy,
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Overrides the illustration failure policy.
    #[must_use]
    pub fn with_image_policy(mut self, policy: ImageFailurePolicy) -> Self {
        self.image_policy = policy;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Generates 3 to 5 validated angles.
    ///
    /// Errors are returned unwrapped, so an exhausted budget surfaces as
    /// [`GenflowError::ValidationExhausted`].
    pub async fn generate_angles(&self, request: &SermonRequest) -> Result<AngleResponse, GenflowError> {
        request.validate()?;

        let retrier = ValidatedRetrier::<AngleSet>::new(angle_set_shape(), self.angle_attempts)?
            .with_event_sink(self.events.clone());
        let completion = CompletionRequest::new(&self.models.angles)
            .system(ANGLE_INSTRUCTIONS)
            .user(request.brief())
            .json_object();

        let validated = retrier
            .generate(self.completions.as_ref(), &completion)
            .instrument(info_span!("stage", stage = %StageName::AngleGeneration))
            .await?;

        info!(
            angles = validated.value.angles.len(),
            attempts_used = validated.attempts_used,
            "Generated sermon angles"
        );
        Ok(AngleResponse {
            angles: validated.value.angles,
            attempts_used: validated.attempts_used,
        })
    }

    /// Expands the chosen angle into an outline, optionally illustrated.
    pub async fn expand_outline(&self, request: &OutlineRequest) -> Result<OutlineResponse, GenflowError> {
        request.request.validate()?;
        if request.angle.title.trim().is_empty() {
            return Err(GenflowError::invalid_request("angle title must not be blank"));
        }

        let mut trail = StageTrail::new(self.events.clone());
        let outline = trail
            .run_stage(StageName::OutlineExpansion, self.outline_text(request))
            .await?;

        if !request.with_image {
            return Ok(OutlineResponse {
                outline,
                image: None,
                image_error: None,
            });
        }

        match trail
            .run_stage(StageName::Illustration, self.illustrate(&request.angle))
            .await
        {
            Ok(image) => Ok(OutlineResponse {
                outline,
                image: Some(image),
                image_error: None,
            }),
            Err(err) if self.image_policy == ImageFailurePolicy::Degrade => {
                warn!(error = %err, "Illustration failed, returning outline without image");
                Ok(OutlineResponse {
                    outline,
                    image: None,
                    image_error: Some(err.root_cause().to_string()),
                })
            }
            Err(err) => Err(err),
        }
    }

    async fn outline_text(&self, request: &OutlineRequest) -> Result<String, GenflowError> {
        let angle = &request.angle;
        let completion = CompletionRequest::new(&self.models.outline)
            .system(OUTLINE_INSTRUCTIONS)
            .user(format!(
                "{}\nAngle: {}\nSummary: {}\nJourney: {}",
                request.request.brief(),
                angle.title.trim(),
                angle.summary.trim(),
                angle.journey.trim()
            ));
        let outline = self.completions.complete(&completion).await?;
        let outline = outline.trim();
        if outline.is_empty() {
            return Err(VendorError::new(VendorOperation::Complete, "outline expansion returned no text").into());
        }
        Ok(outline.to_string())
    }

    async fn illustrate(&self, angle: &SermonAngle) -> Result<ArtifactPayload, GenflowError> {
        let prompt = format!(
            "Contemplative illustration for a sermon titled \"{}\": {}. No text.",
            angle.title.trim(),
            angle.summary.trim()
        );
        let results = self
            .images
            .generate_image(&ImageRequest::new(&self.models.illustration, prompt))
            .await?;
        let output_items = results.len();
        results
            .into_iter()
            .next()
            .map(ArtifactPayload::from)
            .ok_or_else(|| NoImageProducedError { output_items }.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_angle_shape_accepts_description_alias() {
        let value = json!({"angles": [
            {"title": "a", "description": "d", "journey": "j"},
            {"title": "b", "summary": "s", "journey": "j"},
            {"title": "c", "summary": "s", "journey": "j"},
        ]});
        assert!(angle_set_shape().validate(&value).is_ok());

        let set: AngleSet = serde_json::from_value(value).unwrap();
        assert_eq!(set.angles[0].summary, "d");
    }

    #[test]
    fn test_summary_wins_over_description() {
        let value = json!({"angles": [
            {"title": "a", "summary": "s", "description": "d", "journey": "j"},
            {"title": "b", "summary": null, "description": "d", "journey": "j"},
            {"title": "c", "summary": "s", "journey": "j"},
        ]});
        assert!(angle_set_shape().validate(&value).is_ok());

        let set: AngleSet = serde_json::from_value(value).unwrap();
        assert_eq!(set.angles[0].summary, "s");
        assert_eq!(set.angles[1].summary, "d");
        assert_eq!(set.angles[2].summary, "s");
    }

    #[test]
    fn test_angle_without_summary_is_rejected() {
        let err = serde_json::from_value::<SermonAngle>(json!({"title": "a", "journey": "j"}))
            .unwrap_err();
        assert!(err.to_string().contains("missing field `summary`"));
    }

    #[test]
    fn test_angle_shape_bounds() {
        let angle = json!({"title": "a", "summary": "s", "journey": "j"});
        let six = json!({"angles": vec![angle.clone(); 6]});
        let err = angle_set_shape().validate(&six).unwrap_err();
        assert_eq!(err.to_string(), "angles: expected at most 5 items, found 6");
    }

    #[test]
    fn test_brief_skips_blank_fields() {
        let request = SermonRequest::new("Hope")
            .with_scripture("Romans 5:1-5")
            .with_audience("  ");
        assert_eq!(request.brief(), "Topic: Hope\nScripture: Romans 5:1-5");
    }

    #[test]
    fn test_blank_topic_rejected() {
        let request = SermonRequest::new(" ").with_scripture("John 1");
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_angle_response_wire_shape() {
        let response = AngleResponse {
            angles: vec![],
            attempts_used: 2,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json, json!({"angles": [], "attemptsUsed": 2}));
    }

    #[test]
    fn test_outline_request_flattens_sermon_fields() {
        let request: OutlineRequest = serde_json::from_value(json!({
            "topic": "Hope",
            "scripture": "Romans 5",
            "angle": {"title": "t", "summary": "s", "journey": "j"},
            "with_image": true,
        }))
        .unwrap();
        assert_eq!(request.request.topic, "Hope");
        assert!(request.with_image);
    }
}

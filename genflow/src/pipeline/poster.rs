//! Poster pipeline: (typography reference, scene description) to composite image.
//!
//! Three strategies produce the same artifact kind by different routes; see
//! [`Strategy`]. Any stage failure ends the run with a [`PipelineStageError`]
//! and no artifact. There is no cross-strategy fallback.
//!
//! [`PipelineStageError`]: crate::errors::PipelineStageError

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use super::{ImageFailurePolicy, StageName, StageRecord, StageTrail, Strategy};
use crate::config::{GenflowConfig, ModelConfig};
use crate::core::{
    ArtifactKind, ArtifactPayload, ImageResult, JobKind, JobSpec, PipelineArtifact,
    DEFAULT_IMAGE_MIME,
};
use crate::errors::{
    GenflowError, MalformedSuccessError, NoImageProducedError, VendorError, VendorOperation,
};
use crate::events::{kinds, EventSink, NoOpEventSink};
use crate::poll::{Clock, PollEngine};
use crate::utils::generate_run_id;
use crate::vendor::{CompletionRequest, ImageRequest, ResponsesRequest, VendorPorts};

const ENHANCE_INSTRUCTIONS: &str = "Rewrite the scene description as a vivid, concrete image-edit \
instruction. Keep the existing lettering intact and legible. Reply with the instruction only.";

/// Caller input for one poster run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PosterRequest {
    /// Location of the typography image (URL or `data:` URL).
    pub typography_ref: String,
    /// Scene description.
    pub description: String,
}

impl PosterRequest {
    /// Creates a request.
    #[must_use]
    pub fn new(typography_ref: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            typography_ref: typography_ref.into(),
            description: description.into(),
        }
    }

    fn validate(&self, strategy: Strategy) -> Result<(), GenflowError> {
        if self.description.trim().is_empty() {
            return Err(GenflowError::invalid_request("description must not be blank"));
        }
        if strategy != Strategy::Generate && self.typography_ref.trim().is_empty() {
            return Err(GenflowError::invalid_request("typography_ref must not be blank"));
        }
        Ok(())
    }
}

/// Outcome of a traced run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Run identifier.
    pub run_id: Uuid,
    /// The strategy that actually ran.
    pub strategy: Strategy,
    /// True when an unknown strategy name fell back to `edit`.
    pub fell_back: bool,
    /// The single artifact produced.
    pub artifact: PipelineArtifact,
    /// Executed stages, in order.
    pub stages: Vec<StageRecord>,
    /// Total wall time, in milliseconds.
    pub duration_ms: f64,
}

impl PipelineReport {
    /// Returns the executed stage names, in order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<StageName> {
        self.stages.iter().map(|r| r.stage).collect()
    }
}

/// Orchestrates the poster strategies over a set of vendor ports.
#[derive(Clone)]
pub struct PosterPipeline {
    ports: VendorPorts,
    engine: PollEngine,
    models: ModelConfig,
    events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for PosterPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PosterPipeline")
            .field("engine", &self.engine)
            .field("models", &self.models)
            .finish_non_exhaustive()
    }
}

impl PosterPipeline {
    /// Creates a pipeline using `config` for models and the poll budget.
    #[must_use]
    pub fn new(ports: VendorPorts, config: &GenflowConfig) -> Self {
        let engine = PollEngine::new(ports.jobs.clone()).with_options(config.poll.clone());
        Self {
            ports,
            engine,
            models: config.models.clone(),
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Replaces the clock used while polling.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.engine = self.engine.with_clock(clock);
        self
    }

    /// Sets the event sink for the pipeline and its poll engine.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.engine = self.engine.with_event_sink(events.clone());
        self.events = events;
        self
    }

    /// Poster runs never degrade: any failed stage fails the run.
    #[must_use]
    pub fn image_failure_policy(&self) -> ImageFailurePolicy {
        ImageFailurePolicy::FailFast
    }

    /// Runs `strategy_name` and returns the composite image.
    pub async fn run(
        &self,
        strategy_name: &str,
        request: &PosterRequest,
    ) -> Result<PipelineArtifact, GenflowError> {
        self.run_traced(strategy_name, request)
            .await
            .map(|report| report.artifact)
    }

    /// Runs `strategy_name` and returns the artifact with its stage trail.
    pub async fn run_traced(
        &self,
        strategy_name: &str,
        request: &PosterRequest,
    ) -> Result<PipelineReport, GenflowError> {
        let (strategy, fell_back) = Strategy::resolve(strategy_name);
        request.validate(strategy)?;

        let run_id = generate_run_id();
        let started = Instant::now();
        self.events.try_emit(
            kinds::PIPELINE_STARTED,
            Some(json!({"run_id": run_id, "strategy": strategy, "fell_back": fell_back})),
        );

        let mut trail = StageTrail::new(self.events.clone());
        let result = async {
            match strategy {
                Strategy::Edit => self.run_edit(&mut trail, request).await,
                Strategy::Generate => self.run_generate(&mut trail, request).await,
                Strategy::Responses => self.run_responses(&mut trail, request).await,
            }
        }
        .instrument(info_span!("pipeline", run_id = %run_id, strategy = %strategy))
        .await;
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(artifact) => {
                info!(run_id = %run_id, strategy = %strategy, duration_ms, "Poster pipeline completed");
                self.events.try_emit(
                    kinds::PIPELINE_COMPLETED,
                    Some(json!({"run_id": run_id, "artifact_id": artifact.id, "duration_ms": duration_ms})),
                );
                Ok(PipelineReport {
                    run_id,
                    strategy,
                    fell_back,
                    artifact,
                    stages: trail.into_records(),
                    duration_ms,
                })
            }
            Err(err) => {
                warn!(run_id = %run_id, strategy = %strategy, error = %err, "Poster pipeline failed");
                self.events.try_emit(
                    kinds::PIPELINE_FAILED,
                    Some(json!({"run_id": run_id, "failure": err.failure_body()})),
                );
                Err(err)
            }
        }
    }

    /// Turns a composite image into a video through a video-synthesis job.
    pub async fn animate(
        &self,
        artifact: &PipelineArtifact,
        motion_prompt: &str,
    ) -> Result<PipelineArtifact, GenflowError> {
        if !matches!(artifact.kind, ArtifactKind::CompositeImage | ArtifactKind::ImageReference) {
            return Err(GenflowError::invalid_request(format!(
                "cannot animate a {} artifact",
                artifact.kind
            )));
        }
        if motion_prompt.trim().is_empty() {
            return Err(GenflowError::invalid_request("motion prompt must not be blank"));
        }

        let mut trail = StageTrail::new(self.events.clone());
        trail
            .run_stage(StageName::Animation, async {
                let spec = JobSpec::new(
                    JobKind::VideoSynthesis,
                    &self.models.video,
                    json!({
                        "prompt": motion_prompt,
                        "first_frame_image": artifact.payload.to_data_url(),
                    }),
                );
                let payload = self.run_job(&spec).await?;
                Ok(PipelineArtifact::new(
                    ArtifactKind::VideoReference,
                    payload,
                    StageName::Animation.as_str(),
                ))
            })
            .await
    }

    async fn run_edit(
        &self,
        trail: &mut StageTrail,
        request: &PosterRequest,
    ) -> Result<PipelineArtifact, GenflowError> {
        let typography = trail
            .run_stage(StageName::Typography, self.download_typography(&request.typography_ref))
            .await?;
        let enhanced = trail
            .run_stage(StageName::PromptEnhancement, self.enhance(&request.description))
            .await?;
        trail
            .run_stage(StageName::Composite, async {
                let spec = JobSpec::new(
                    JobKind::ImageEdit,
                    &self.models.image_edit,
                    json!({
                        "prompt": enhanced,
                        "input_image": typography.payload.to_data_url(),
                    }),
                );
                let payload = self.run_job(&spec).await?;
                Ok(PipelineArtifact::new(
                    ArtifactKind::CompositeImage,
                    payload,
                    StageName::Composite.as_str(),
                ))
            })
            .await
    }

    async fn run_generate(
        &self,
        trail: &mut StageTrail,
        request: &PosterRequest,
    ) -> Result<PipelineArtifact, GenflowError> {
        let prompt = trail
            .run_stage(StageName::PromptEnhancement, async {
                Ok(composition_prompt(&request.description))
            })
            .await?;
        let background = trail
            .run_stage(StageName::BackgroundImage, async {
                let image_request = ImageRequest::new(&self.models.text_to_image, &prompt).with_size("1024x1536");
                let results = self.ports.images.generate_image(&image_request).await?;
                let output_items = results.len();
                let first = results
                    .into_iter()
                    .next()
                    .ok_or(NoImageProducedError { output_items })?;
                Ok(PipelineArtifact::new(
                    ArtifactKind::ImageReference,
                    first.into(),
                    StageName::BackgroundImage.as_str(),
                ))
            })
            .await?;
        trail
            .run_stage(StageName::Composite, async {
                let payload = self.ensure_inline(background.payload).await?;
                Ok(PipelineArtifact::new(
                    ArtifactKind::CompositeImage,
                    payload,
                    StageName::Composite.as_str(),
                ))
            })
            .await
    }

    async fn run_responses(
        &self,
        trail: &mut StageTrail,
        request: &PosterRequest,
    ) -> Result<PipelineArtifact, GenflowError> {
        let typography = trail
            .run_stage(StageName::Typography, self.download_typography(&request.typography_ref))
            .await?;
        trail
            .run_stage(StageName::Composite, async {
                let responses_request = ResponsesRequest {
                    model_id: self.models.responses.clone(),
                    prompt: composition_prompt(&request.description),
                    image_data_url: Some(typography.payload.to_data_url()),
                };
                let items = self.ports.images.respond(&responses_request).await?;
                let image = items
                    .iter()
                    .find_map(|item| item.image_base64())
                    .ok_or(NoImageProducedError {
                        output_items: items.len(),
                    })?;
                let decoded = ImageResult::from_base64(image, Some(DEFAULT_IMAGE_MIME.to_string()))
                    .ok_or_else(|| VendorError::new(VendorOperation::Respond, "image result is not valid base64"))?;
                Ok(PipelineArtifact::new(
                    ArtifactKind::CompositeImage,
                    decoded.into(),
                    StageName::Composite.as_str(),
                ))
            })
            .await
    }

    async fn download_typography(&self, location: &str) -> Result<PipelineArtifact, GenflowError> {
        let asset = self.ports.assets.fetch_bytes(location.trim()).await?;
        if asset.bytes.is_empty() {
            return Err(VendorError::new(VendorOperation::Download, "typography download was empty").into());
        }
        let mime_type = asset.mime_type.unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string());
        Ok(PipelineArtifact::new(
            ArtifactKind::TypographySet,
            ArtifactPayload::inline(&asset.bytes, mime_type),
            StageName::Typography.as_str(),
        ))
    }

    async fn enhance(&self, description: &str) -> Result<String, GenflowError> {
        let request = CompletionRequest::new(&self.models.prompt_enhancement)
            .system(ENHANCE_INSTRUCTIONS)
            .user(description.trim());
        let enhanced = self.ports.completions.complete(&request).await?;
        let enhanced = enhanced.trim();
        if enhanced.is_empty() {
            return Err(VendorError::new(VendorOperation::Complete, "prompt enhancement returned no text").into());
        }
        Ok(enhanced.to_string())
    }

    async fn run_job(&self, spec: &JobSpec) -> Result<ArtifactPayload, GenflowError> {
        let handle = self.engine.run(spec).await?;
        let reference = handle.primary_output().ok_or_else(|| MalformedSuccessError {
            task_id: handle.id().to_string(),
            reason: "output is absent".to_string(),
            output: handle.output().cloned(),
        })?;
        Ok(ArtifactPayload::from_reference(&reference))
    }

    async fn ensure_inline(&self, payload: ArtifactPayload) -> Result<ArtifactPayload, GenflowError> {
        match payload {
            inline @ ArtifactPayload::Inline { .. } => Ok(inline),
            ArtifactPayload::Url { url } => {
                let asset = self.ports.assets.fetch_bytes(&url).await?;
                let mime_type = asset.mime_type.unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string());
                Ok(ArtifactPayload::inline(&asset.bytes, mime_type))
            }
        }
    }
}

/// Builds a self-contained composition prompt from the description alone.
#[must_use]
pub fn composition_prompt(description: &str) -> String {
    format!(
        "Poster composition. Scene: {}. Leave clear space in the upper third for a headline; \
         balanced lighting, high detail, no text or watermarks.",
        description.trim().trim_end_matches('.')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composition_prompt_is_deterministic() {
        assert_eq!(
            composition_prompt(" a sunset over mountains. "),
            composition_prompt("a sunset over mountains")
        );
        assert!(composition_prompt("a harbor").contains("Scene: a harbor."));
    }

    #[test]
    fn test_request_validation() {
        let blank = PosterRequest::new("https://x/typo.png", "   ");
        assert!(blank.validate(Strategy::Edit).is_err());

        let no_typography = PosterRequest::new("", "a harbor");
        assert!(no_typography.validate(Strategy::Edit).is_err());
        assert!(no_typography.validate(Strategy::Responses).is_err());
        assert!(no_typography.validate(Strategy::Generate).is_ok());
    }
}

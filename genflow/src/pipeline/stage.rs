//! Named pipeline stages and the trail that runs them in sequence.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info_span, Instrument};

use crate::errors::{GenflowError, PipelineStageError};
use crate::events::{kinds, EventSink};

/// A named unit of pipeline work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageName {
    /// Download the caller's typography reference.
    Typography,
    /// Rewrite or compose the scene description.
    PromptEnhancement,
    /// Generate a standalone image.
    BackgroundImage,
    /// Produce the final composed image.
    Composite,
    /// Turn an image into a video.
    Animation,
    /// Generate candidate sermon angles.
    AngleGeneration,
    /// Expand a chosen angle into an outline.
    OutlineExpansion,
    /// Illustrate an outline.
    Illustration,
}

impl StageName {
    /// Returns the stage's wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Typography => "typography",
            Self::PromptEnhancement => "prompt-enhancement",
            Self::BackgroundImage => "background-image",
            Self::Composite => "composite",
            Self::Animation => "animation",
            Self::AngleGeneration => "angle-generation",
            Self::OutlineExpansion => "outline-expansion",
            Self::Illustration => "illustration",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One executed stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    /// The stage.
    pub stage: StageName,
    /// Wall time spent, in milliseconds.
    pub duration_ms: f64,
    /// Whether the stage produced its output.
    pub succeeded: bool,
}

/// Runs stages strictly in sequence and records what ran.
///
/// Every stage executes inside a `stage` tracing span. A stage failure is
/// wrapped in [`PipelineStageError`] naming that stage.
pub struct StageTrail {
    events: Arc<dyn EventSink>,
    records: Vec<StageRecord>,
}

impl fmt::Debug for StageTrail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageTrail")
            .field("records", &self.records)
            .finish_non_exhaustive()
    }
}

impl StageTrail {
    /// Creates an empty trail reporting to `events`.
    #[must_use]
    pub fn new(events: Arc<dyn EventSink>) -> Self {
        Self {
            events,
            records: Vec::new(),
        }
    }

    /// Runs one stage to completion.
    pub async fn run_stage<T, F>(&mut self, stage: StageName, work: F) -> Result<T, GenflowError>
    where
        F: Future<Output = Result<T, GenflowError>>,
    {
        self.events.try_emit(
            kinds::STAGE_STARTED,
            Some(serde_json::json!({"stage": stage})),
        );
        let started = Instant::now();

        let result = work.instrument(info_span!("stage", stage = %stage)).await;
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.records.push(StageRecord {
            stage,
            duration_ms,
            succeeded: result.is_ok(),
        });

        match result {
            Ok(value) => {
                debug!(stage = %stage, duration_ms, "Stage completed");
                self.events.try_emit(
                    kinds::STAGE_COMPLETED,
                    Some(serde_json::json!({"stage": stage, "duration_ms": duration_ms})),
                );
                Ok(value)
            }
            Err(err) => {
                self.events.try_emit(
                    kinds::STAGE_FAILED,
                    Some(serde_json::json!({
                        "stage": stage,
                        "error": err.to_string(),
                        "duration_ms": duration_ms,
                    })),
                );
                Err(PipelineStageError::new(stage, err).into())
            }
        }
    }

    /// Returns the executed stages, in order.
    #[must_use]
    pub fn records(&self) -> &[StageRecord] {
        &self.records
    }

    /// Returns the executed stage names, in order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<StageName> {
        self.records.iter().map(|r| r.stage).collect()
    }

    /// Consumes the trail.
    #[must_use]
    pub fn into_records(self) -> Vec<StageRecord> {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_stage_names_render_kebab_case() {
        assert_eq!(StageName::PromptEnhancement.to_string(), "prompt-enhancement");
        assert_eq!(
            serde_json::to_value(StageName::BackgroundImage).unwrap(),
            serde_json::json!("background-image")
        );
    }

    #[tokio::test]
    async fn test_trail_records_in_order() {
        let sink = Arc::new(CollectingEventSink::new());
        let mut trail = StageTrail::new(sink.clone());

        let a = trail.run_stage(StageName::Typography, async { Ok(1) }).await.unwrap();
        let b = trail
            .run_stage(StageName::Composite, async move { Ok(a + 1) })
            .await
            .unwrap();

        assert_eq!(b, 2);
        assert_eq!(trail.stage_names(), vec![StageName::Typography, StageName::Composite]);
        assert_eq!(
            sink.kinds(),
            vec!["stage.started", "stage.completed", "stage.started", "stage.completed"]
        );
    }

    #[tokio::test]
    async fn test_failure_is_wrapped_with_stage() {
        let sink = Arc::new(CollectingEventSink::new());
        let mut trail = StageTrail::new(sink.clone());

        let err = trail
            .run_stage::<(), _>(StageName::PromptEnhancement, async {
                Err(GenflowError::invalid_request("boom"))
            })
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(StageName::PromptEnhancement));
        assert!(!trail.records()[0].succeeded);
        assert_eq!(sink.count("stage.failed"), 1);
    }
}

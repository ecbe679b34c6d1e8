//! Assertions for pipeline results.

use crate::core::{ArtifactKind, PipelineArtifact};
use crate::errors::GenflowError;
use crate::pipeline::StageName;

/// Asserts that the artifact has the expected kind.
pub fn assert_artifact_kind(artifact: &PipelineArtifact, expected: ArtifactKind) {
    assert_eq!(
        artifact.kind, expected,
        "Expected artifact kind {}, got {}",
        expected, artifact.kind
    );
}

/// Asserts that the artifact points at `url`.
pub fn assert_artifact_url(artifact: &PipelineArtifact, url: &str) {
    assert_eq!(
        artifact.payload.as_url(),
        Some(url),
        "Expected URL payload '{}', got {:?}",
        url,
        artifact.payload
    );
}

/// Asserts that the artifact carries its content inline.
pub fn assert_artifact_inline(artifact: &PipelineArtifact) {
    assert!(
        artifact.payload.is_inline(),
        "Expected inline payload, got {:?}",
        artifact.payload
    );
}

/// Asserts that the error is a stage failure of `stage`, returning the root cause.
pub fn assert_stage_failed(err: &GenflowError, stage: StageName) -> &GenflowError {
    assert_eq!(
        err.stage(),
        Some(stage),
        "Expected failure in stage '{}', got: {}",
        stage,
        err
    );
    err.root_cause()
}

//! Core domain model types for genflow.
//!
//! This module contains the value types shared by every layer:
//! - Canonical task status and vendor vocabulary normalization
//! - Job specifications and task handles
//! - Generation attempts
//! - Pipeline artifacts and normalized image results

mod artifact;
mod attempt;
mod status;
mod task;

pub use artifact::{ArtifactKind, ArtifactPayload, ImageResult, PipelineArtifact, DEFAULT_IMAGE_MIME};
pub use attempt::{AttemptOutcome, GenerationAttempt};
pub use status::TaskStatus;
pub use task::{JobKind, JobSpec, StatusSnapshot, SubmittedJob, TaskHandle};

//! Multi-stage generation pipelines.
//!
//! This module provides:
//! - Named stages run in strict sequence by a [`StageTrail`]
//! - Poster strategies (`edit`, `generate`, `responses`) behind one contract
//! - The sermon angle/outline pipeline with its image failure policies

mod poster;
mod sermon;
mod stage;
mod strategy;


pub use poster::{composition_prompt, PipelineReport, PosterPipeline, PosterRequest};
pub use sermon::{
    angle_set_shape, AngleResponse, AngleSet, ImageFailurePolicy, OutlineRequest, OutlineResponse,
    SermonAngle, SermonPipeline, SermonRequest, ANGLE_COUNT,
};
pub use stage::{StageName, StageRecord, StageTrail};
pub use strategy::Strategy;

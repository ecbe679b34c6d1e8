//! # Genflow
//!
//! Orchestration core for vendor-hosted generation jobs.
//!
//! Genflow provides:
//!
//! - **Job polling**: submit an asynchronous vendor job and poll it to a
//!   terminal state under a bounded budget ([`poll::PollEngine`])
//! - **Validated generation**: re-ask a text model until its JSON output
//!   satisfies a declared shape ([`contracts::ValidatedRetrier`])
//! - **Pipelines**: poster composition with three interchangeable
//!   strategies, and sermon angle/outline generation ([`pipeline`])
//! - **Vendor ports**: narrow async traits with HTTP adapters behind the
//!   `http` feature ([`vendor`])
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use genflow::prelude::*;
//!
//! let config = GenflowConfig::default().from_env_overlay()?;
//! let ports = genflow::vendor::http::http_ports(&config.endpoints)?;
//! let pipeline = PosterPipeline::new(ports, &config);
//!
//! let request = PosterRequest::new("https://x/typo.png", "a sunset over mountains");
//! let artifact = pipeline.run("edit", &request).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod contracts;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod poll;
pub mod testing;
pub mod utils;
pub mod vendor;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{GenflowConfig, ModelConfig, VendorEndpoints};
    pub use crate::contracts::{FieldType, Shape, Validated, ValidatedRetrier};
    pub use crate::core::{
        ArtifactKind, ArtifactPayload, JobKind, JobSpec, PipelineArtifact, TaskHandle, TaskStatus,
    };
    pub use crate::errors::{FailureBody, GenflowError, VendorError};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{
        ImageFailurePolicy, OutlineRequest, PosterPipeline, PosterRequest, SermonPipeline,
        SermonRequest, StageName, Strategy,
    };
    pub use crate::poll::{Clock, PollEngine, PollOptions, SystemClock};
    pub use crate::vendor::{
        AssetFetcher, CompletionVendor, ImageVendor, JobVendor, VendorPorts,
    };
}

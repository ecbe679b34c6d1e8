//! Lifecycle events for observability.
//!
//! The poll engine, the validated retrier and the pipelines report progress
//! through an [`EventSink`]. Event names are listed in [`kinds`].

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, RecordedEvent};

/// Event type names emitted by the core.
pub mod kinds {
    /// A job was accepted by the vendor.
    pub const JOB_SUBMITTED: &str = "job.submitted";
    /// A status fetch completed.
    pub const JOB_POLLED: &str = "job.polled";
    /// A job reached `succeeded` with usable output.
    pub const JOB_SUCCEEDED: &str = "job.succeeded";
    /// A job reached `failed` or `canceled`, or succeeded without output.
    pub const JOB_FAILED: &str = "job.failed";
    /// The poll budget ran out.
    pub const JOB_TIMED_OUT: &str = "job.timed_out";
    /// A generation attempt started.
    pub const GENERATION_ATTEMPT: &str = "generation.attempt";
    /// A generation attempt was rejected.
    pub const GENERATION_REJECTED: &str = "generation.rejected";
    /// A generation attempt was accepted.
    pub const GENERATION_VALIDATED: &str = "generation.validated";
    /// A pipeline stage started.
    pub const STAGE_STARTED: &str = "stage.started";
    /// A pipeline stage finished.
    pub const STAGE_COMPLETED: &str = "stage.completed";
    /// A pipeline stage failed.
    pub const STAGE_FAILED: &str = "stage.failed";
    /// A pipeline run started.
    pub const PIPELINE_STARTED: &str = "pipeline.started";
    /// A pipeline run produced its artifact.
    pub const PIPELINE_COMPLETED: &str = "pipeline.completed";
    /// A pipeline run failed.
    pub const PIPELINE_FAILED: &str = "pipeline.failed";
}

//! Error types for the genflow orchestration core.
//!
//! Every failure the core can produce is one of the structs below, wrapped
//! in [`GenflowError`]. Lower-level vendor and network failures are never
//! swallowed; they surface as one of these typed errors.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::core::TaskStatus;
use crate::pipeline::StageName;

/// The main error type for genflow operations.
#[derive(Debug, Clone, Error)]
pub enum GenflowError {
    /// The vendor rejected job creation.
    #[error("{0}")]
    Submission(#[from] SubmissionError),

    /// No terminal status was observed within the poll budget.
    #[error("{0}")]
    PollTimeout(#[from] PollTimeoutError),

    /// The vendor reported the job as failed or canceled.
    #[error("{0}")]
    JobFailed(#[from] JobFailedError),

    /// The vendor reported success without usable output.
    #[error("{0}")]
    MalformedSuccess(#[from] MalformedSuccessError),

    /// Structured output never satisfied its shape.
    #[error("{0}")]
    ValidationExhausted(#[from] ValidationExhaustedError),

    /// A named pipeline stage failed.
    #[error("{0}")]
    Stage(#[from] PipelineStageError),

    /// A vision-assisted call returned no generated image.
    #[error("{0}")]
    NoImageProduced(#[from] NoImageProducedError),

    /// A vendor call failed at the transport or protocol level.
    #[error("{0}")]
    Vendor(#[from] VendorError),

    /// The caller's request was refused before any vendor work.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl GenflowError {
    /// Creates an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Returns the HTTP-equivalent status a collaborator should report.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) => 400,
            Self::Config(_) => 500,
            Self::PollTimeout(_) => 504,
            Self::Stage(err) => err.cause.http_status(),
            Self::Submission(_)
            | Self::JobFailed(_)
            | Self::MalformedSuccess(_)
            | Self::ValidationExhausted(_)
            | Self::NoImageProduced(_)
            | Self::Vendor(_) => 502,
        }
    }

    /// Returns the failing stage, if the error came from a pipeline stage.
    #[must_use]
    pub fn stage(&self) -> Option<StageName> {
        match self {
            Self::Stage(err) => Some(err.stage),
            _ => None,
        }
    }

    /// Returns the innermost error, looking through stage wrappers.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::Stage(err) => err.cause.root_cause(),
            other => other,
        }
    }

    /// Renders the caller-facing failure structure.
    #[must_use]
    pub fn failure_body(&self) -> FailureBody {
        FailureBody {
            stage: self.stage().map(|s| s.to_string()),
            reason: self.root_cause().to_string(),
            status: self.http_status(),
        }
    }
}

/// Caller-facing failure description: `{stage, reason}` plus a status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureBody {
    /// The stage that failed, for pipeline errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    /// Single descriptive message.
    pub reason: String,
    /// HTTP-equivalent status.
    pub status: u16,
}

/// The vendor operation a [`VendorError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VendorOperation {
    /// Job creation.
    Submit,
    /// Job status fetch.
    Fetch,
    /// Single-shot text generation.
    Complete,
    /// Synchronous image generation.
    GenerateImage,
    /// Combined vision-and-generation call.
    Respond,
    /// Asset download.
    Download,
}

impl fmt::Display for VendorOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submit => write!(f, "submit"),
            Self::Fetch => write!(f, "fetch"),
            Self::Complete => write!(f, "complete"),
            Self::GenerateImage => write!(f, "generate_image"),
            Self::Respond => write!(f, "respond"),
            Self::Download => write!(f, "download"),
        }
    }
}

/// A transport or protocol failure reported by a vendor adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct VendorError {
    /// The operation that failed.
    pub operation: VendorOperation,
    /// HTTP status, when the failure was a non-2xx response.
    pub status_code: Option<u16>,
    /// Human-readable message.
    pub message: String,
    /// Parsed error envelope, when the vendor sent one.
    pub body: Option<serde_json::Value>,
}

impl VendorError {
    /// Creates a new vendor error.
    #[must_use]
    pub fn new(operation: VendorOperation, message: impl Into<String>) -> Self {
        Self {
            operation,
            status_code: None,
            message: message.into(),
            body: None,
        }
    }

    /// Sets the HTTP status code.
    #[must_use]
    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    /// Sets the vendor error envelope.
    #[must_use]
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

impl fmt::Display for VendorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "Vendor {} failed ({}): {}", self.operation, code, self.message),
            None => write!(f, "Vendor {} failed: {}", self.operation, self.message),
        }
    }
}

impl std::error::Error for VendorError {}

/// The vendor rejected a job creation request.
///
/// Not retried by the core; callers decide whether to resubmit.
#[derive(Debug, Clone, Error)]
#[error("Job submission rejected for model '{model_id}': {message}")]
pub struct SubmissionError {
    /// Model the job targeted.
    pub model_id: String,
    /// HTTP status, for non-2xx rejections.
    pub status_code: Option<u16>,
    /// Rejection message.
    pub message: String,
    /// Vendor error envelope, verbatim.
    pub vendor_error: Option<serde_json::Value>,
}

impl SubmissionError {
    /// Wraps a transport-level rejection.
    #[must_use]
    pub fn from_vendor(model_id: impl Into<String>, err: VendorError) -> Self {
        Self {
            model_id: model_id.into(),
            status_code: err.status_code,
            message: err.message,
            vendor_error: err.body,
        }
    }

    /// Builds a rejection from an error field embedded in a 2xx response.
    #[must_use]
    pub fn embedded(model_id: impl Into<String>, error: serde_json::Value) -> Self {
        let message = match &error {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Self {
            model_id: model_id.into(),
            status_code: None,
            message,
            vendor_error: Some(error),
        }
    }
}

/// The poll ceiling or wall-clock budget ran out before a terminal status.
///
/// Distinct from [`JobFailedError`]: the job may still finish vendor-side.
#[derive(Debug, Clone, Error)]
#[error("Task '{task_id}' unfinished after {polls} polls ({elapsed_ms} ms), last status: {last_status}")]
pub struct PollTimeoutError {
    /// Vendor task id.
    pub task_id: String,
    /// Status fetches performed.
    pub polls: u32,
    /// Time spent waiting, in milliseconds.
    pub elapsed_ms: u64,
    /// Last non-terminal status observed.
    pub last_status: TaskStatus,
}

/// The vendor reported `failed` or `canceled`.
#[derive(Debug, Clone, Error)]
#[error("Task '{task_id}' {status}: {vendor_error}")]
pub struct JobFailedError {
    /// Vendor task id.
    pub task_id: String,
    /// The terminal status (`failed` or `canceled`).
    pub status: TaskStatus,
    /// Vendor error payload, verbatim. `null` when none was sent.
    pub vendor_error: serde_json::Value,
}

/// The vendor reported `succeeded` with absent or unusable output.
#[derive(Debug, Clone, Error)]
#[error("Task '{task_id}' succeeded without usable output: {reason}")]
pub struct MalformedSuccessError {
    /// Vendor task id.
    pub task_id: String,
    /// What was wrong with the output.
    pub reason: String,
    /// The output as received.
    pub output: Option<serde_json::Value>,
}

/// Structured output never satisfied its shape within the attempt budget.
#[derive(Debug, Clone, Error)]
#[error("Validation exhausted after {attempts} attempts: {last_failure}")]
pub struct ValidationExhaustedError {
    /// Attempts made; always equal to the budget.
    pub attempts: u32,
    /// Reason the final attempt was rejected.
    pub last_failure: String,
}

impl Serialize for ValidationExhaustedError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("ValidationExhaustedError", 3)?;
        state.serialize_field("error", "validation exhausted")?;
        state.serialize_field("attempts", &self.attempts)?;
        state.serialize_field("last_failure", &self.last_failure)?;
        state.end()
    }
}

/// A named pipeline stage failed.
#[derive(Debug, Clone, Error)]
#[error("Stage '{stage}' failed: {cause}")]
pub struct PipelineStageError {
    /// The stage that failed.
    pub stage: StageName,
    /// The underlying error.
    #[source]
    pub cause: Box<GenflowError>,
}

impl PipelineStageError {
    /// Creates a new stage error.
    #[must_use]
    pub fn new(stage: StageName, cause: GenflowError) -> Self {
        Self {
            stage,
            cause: Box::new(cause),
        }
    }
}

/// A vision-assisted generation call produced zero image results.
#[derive(Debug, Clone, Error)]
#[error("Vision generation returned no image ({output_items} output items)")]
pub struct NoImageProducedError {
    /// Number of output items the vendor returned.
    pub output_items: usize,
}

//! Vendor job specifications and the task handle that tracks them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::TaskStatus;

/// The kind of asynchronous work a vendor job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Image edit seeded with an input image.
    ImageEdit,
    /// Text-to-image synthesis.
    TextToImage,
    /// Image-to-video or text-to-video synthesis.
    VideoSynthesis,
    /// Long-running text completion.
    Completion,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImageEdit => write!(f, "image_edit"),
            Self::TextToImage => write!(f, "text_to_image"),
            Self::VideoSynthesis => write!(f, "video_synthesis"),
            Self::Completion => write!(f, "completion"),
        }
    }
}

/// A request to create one vendor job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    /// What the job does.
    pub kind: JobKind,
    /// Vendor model identifier (e.g. `owner/name` or `owner/name:version`).
    pub model_id: String,
    /// Model-specific input record.
    pub input: serde_json::Value,
}

impl JobSpec {
    /// Creates a new job spec.
    #[must_use]
    pub fn new(kind: JobKind, model_id: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            kind,
            model_id: model_id.into(),
            input,
        }
    }
}

/// One observation of a task's state, already normalized.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Canonical status.
    pub status: TaskStatus,
    /// Output payload, meaningful only when `status` is `succeeded`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    /// Vendor error payload, kept verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
}

impl StatusSnapshot {
    /// Creates a snapshot with only a status.
    #[must_use]
    pub fn new(status: TaskStatus) -> Self {
        Self {
            status,
            output: None,
            error: None,
        }
    }

    /// Creates a `succeeded` snapshot carrying output.
    #[must_use]
    pub fn succeeded(output: serde_json::Value) -> Self {
        Self {
            status: TaskStatus::Succeeded,
            output: Some(output),
            error: None,
        }
    }

    /// Creates a `failed` snapshot carrying the vendor error.
    #[must_use]
    pub fn failed(error: serde_json::Value) -> Self {
        Self {
            status: TaskStatus::Failed,
            output: None,
            error: Some(error),
        }
    }
}

/// Response to a job creation request.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedJob {
    /// Vendor-assigned identifier.
    pub id: String,
    /// State reported by the creation response itself.
    pub initial: StatusSnapshot,
    /// Explicit status URL, when the vendor supplies one.
    pub status_url: Option<String>,
}

/// A single vendor-side asynchronous job.
///
/// Handles are created by [`crate::poll::PollEngine::submit`] and only
/// change when a fresh status snapshot is applied. A handle that reached a
/// terminal status ignores every later snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskHandle {
    id: String,
    kind: JobKind,
    model_id: String,
    status: TaskStatus,
    output: Option<serde_json::Value>,
    error: Option<serde_json::Value>,
    status_url: Option<String>,
    submitted_at: DateTime<Utc>,
    polls: u32,
}

impl TaskHandle {
    /// Builds a handle from a creation response.
    #[must_use]
    pub fn from_submission(spec: &JobSpec, submitted: SubmittedJob) -> Self {
        let SubmittedJob {
            id,
            initial,
            status_url,
        } = submitted;
        Self {
            id,
            kind: spec.kind,
            model_id: spec.model_id.clone(),
            status: initial.status,
            output: initial.output,
            error: initial.error,
            status_url,
            submitted_at: Utc::now(),
            polls: 0,
        }
    }

    /// Returns the vendor-assigned identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the job kind.
    #[must_use]
    pub fn kind(&self) -> JobKind {
        self.kind
    }

    /// Returns the model the job runs on.
    #[must_use]
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Returns the current canonical status.
    #[must_use]
    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns the raw output payload, if any.
    #[must_use]
    pub fn output(&self) -> Option<&serde_json::Value> {
        self.output.as_ref()
    }

    /// Returns the vendor error payload, if any.
    #[must_use]
    pub fn error(&self) -> Option<&serde_json::Value> {
        self.error.as_ref()
    }

    /// Returns the vendor status URL, if one was supplied.
    #[must_use]
    pub fn status_url(&self) -> Option<&str> {
        self.status_url.as_deref()
    }

    /// Returns when the job was submitted.
    #[must_use]
    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    /// Returns the number of status fetches applied so far.
    #[must_use]
    pub fn polls(&self) -> u32 {
        self.polls
    }

    /// Returns true if the handle is in a terminal status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Returns the primary output reference.
    ///
    /// A string output is returned as is, a list yields its first element
    /// and a record yields its first `url`-like field.
    #[must_use]
    pub fn primary_output(&self) -> Option<String> {
        self.output.as_ref().and_then(primary_reference)
    }

    /// Applies a fetched snapshot. Returns false if the snapshot was ignored.
    pub(crate) fn apply(&mut self, snapshot: StatusSnapshot) -> bool {
        self.polls += 1;
        if !self.status.can_transition_to(snapshot.status) {
            return false;
        }
        self.status = snapshot.status;
        self.output = snapshot.output;
        self.error = snapshot.error;
        true
    }
}

const REFERENCE_KEYS: [&str; 5] = ["url", "uri", "image", "video", "output"];

fn primary_reference(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        serde_json::Value::Array(items) => items.first().and_then(primary_reference),
        serde_json::Value::Object(map) => REFERENCE_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(primary_reference)),
        _ => None,
    }
}

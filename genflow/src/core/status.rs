//! Canonical task status and vendor vocabulary normalization.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The lifecycle status of a vendor-hosted task.
///
/// Vendors report status with their own words (`starting`, `processing`,
/// `SUCCEEDED`, ...). Those words are folded into this set at the adapter
/// boundary with [`TaskStatus::normalize`] and never travel further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Accepted by the vendor but not yet started.
    Pending,
    /// Work is in progress.
    Running,
    /// Finished with output.
    Succeeded,
    /// Finished with an error.
    Failed,
    /// Stopped before completion.
    Canceled,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Canceled => write!(f, "canceled"),
        }
    }
}

impl TaskStatus {
    /// Maps a vendor status word onto the canonical set.
    ///
    /// Matching ignores case and surrounding whitespace. Returns `None` for
    /// words outside the known vocabulary.
    #[must_use]
    pub fn normalize(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "starting" | "pending" => Some(Self::Pending),
            "processing" | "running" => Some(Self::Running),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            "canceled" => Some(Self::Canceled),
            _ => None,
        }
    }

    /// Returns true if no further transition can occur.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }

    /// Returns true if the status reports a vendor-side failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Canceled)
    }

    /// Returns true if moving from `self` to `next` is a legal transition.
    ///
    /// Terminal states admit no transition. `running` falling back to
    /// `pending` is tolerated since some vendors requeue work.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (Self::Pending, _) => true,
            (Self::Running, Self::Pending | Self::Running) => true,
            (Self::Running, n) => n.is_terminal(),
            _ => false,
        }
    }
}

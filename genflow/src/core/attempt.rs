//! Record of a single structured-generation attempt.

use serde::Serialize;

use crate::contracts::ValidationError;

/// How one attempt ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// The candidate satisfied the shape.
    Accepted,
    /// The raw text was not parseable.
    Unparseable {
        /// Parser message.
        reason: String,
    },
    /// The candidate parsed but broke the shape.
    Rejected {
        /// Field-level reason.
        reason: String,
    },
}

impl AttemptOutcome {
    /// Returns true if the attempt produced an accepted value.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Returns the failure reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Accepted => None,
            Self::Unparseable { reason } | Self::Rejected { reason } => Some(reason),
        }
    }
}

/// One iteration of a validated generation loop.
///
/// Lives only inside the loop; nothing keeps it after the validation
/// decision is made.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationAttempt {
    /// 1-based attempt number.
    pub number: u32,
    /// Unparsed model output.
    pub raw_text: String,
    /// Parsed candidate, if the text was parseable.
    pub parsed: Option<serde_json::Value>,
    /// Validation decision.
    pub outcome: AttemptOutcome,
}

impl GenerationAttempt {
    /// Records an attempt whose text could not be parsed.
    #[must_use]
    pub fn unparseable(number: u32, raw_text: String, reason: impl Into<String>) -> Self {
        Self {
            number,
            raw_text,
            parsed: None,
            outcome: AttemptOutcome::Unparseable {
                reason: reason.into(),
            },
        }
    }

    /// Records an attempt whose candidate was checked against the shape.
    #[must_use]
    pub fn checked(
        number: u32,
        raw_text: String,
        parsed: serde_json::Value,
        result: Result<(), ValidationError>,
    ) -> Self {
        let outcome = match result {
            Ok(()) => AttemptOutcome::Accepted,
            Err(err) => AttemptOutcome::Rejected {
                reason: err.to_string(),
            },
        };
        Self {
            number,
            raw_text,
            parsed: Some(parsed),
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unparseable_attempt() {
        let attempt = GenerationAttempt::unparseable(1, "nope".to_string(), "expected value");
        assert!(attempt.parsed.is_none());
        assert!(!attempt.outcome.is_accepted());
        assert_eq!(attempt.outcome.reason(), Some("expected value"));
    }

    #[test]
    fn test_checked_attempt() {
        let accepted = GenerationAttempt::checked(2, "{}".to_string(), serde_json::json!({}), Ok(()));
        assert!(accepted.outcome.is_accepted());

        let rejected = GenerationAttempt::checked(
            3,
            "{}".to_string(),
            serde_json::json!({}),
            Err(ValidationError::for_field("angles", "required field is missing")),
        );
        assert_eq!(
            rejected.outcome.reason(),
            Some("angles: required field is missing")
        );
    }
}

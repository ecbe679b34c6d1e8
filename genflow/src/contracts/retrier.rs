//! Generate-validate-retry loop for structured model output.

use serde::de::DeserializeOwned;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{strip_code_fence, ShapeCheck};
use crate::core::GenerationAttempt;
use crate::errors::{GenflowError, ValidationExhaustedError, VendorError};
use crate::events::{kinds, EventSink, NoOpEventSink};
use crate::vendor::{CompletionRequest, CompletionVendor};

/// A value that passed its shape, plus how many attempts it took.
#[derive(Debug, Clone, PartialEq)]
pub struct Validated<T> {
    /// The accepted value.
    pub value: T,
    /// Attempts made, including the accepted one.
    pub attempts_used: u32,
}

/// Issues a generation call, checks the output against a shape and retries
/// on malformed output up to a fixed attempt budget.
///
/// Each retry asks again with the identical request; the model is not told
/// why the previous answer was rejected. Transport failures from the call
/// itself are not retried and propagate immediately.
pub struct ValidatedRetrier<T> {
    shape: Arc<dyn ShapeCheck>,
    max_attempts: u32,
    events: Arc<dyn EventSink>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for ValidatedRetrier<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatedRetrier")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl<T> ValidatedRetrier<T>
where
    T: DeserializeOwned,
{
    /// Creates a retrier. A zero attempt budget is rejected.
    pub fn new(shape: impl ShapeCheck + 'static, max_attempts: u32) -> Result<Self, GenflowError> {
        if max_attempts == 0 {
            return Err(GenflowError::invalid_request("max_attempts must be >= 1"));
        }
        Ok(Self {
            shape: Arc::new(shape),
            max_attempts,
            events: Arc::new(NoOpEventSink),
            _marker: PhantomData,
        })
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Returns the attempt budget.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Runs the loop against a completion vendor.
    pub async fn generate(
        &self,
        vendor: &dyn CompletionVendor,
        request: &CompletionRequest,
    ) -> Result<Validated<T>, GenflowError> {
        self.generate_with(|| vendor.complete(request)).await
    }

    /// Runs the loop with an arbitrary generation call.
    ///
    /// `call` must be safe to repeat: it is invoked once per attempt.
    pub async fn generate_with<F, Fut>(&self, mut call: F) -> Result<Validated<T>, GenflowError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<String, VendorError>>,
    {
        let mut last_failure = String::new();

        for number in 1..=self.max_attempts {
            self.events.try_emit(
                kinds::GENERATION_ATTEMPT,
                Some(serde_json::json!({"attempt": number, "max_attempts": self.max_attempts})),
            );

            let raw = call().await?;
            let (attempt, value) = self.evaluate(number, raw);

            if let Some(value) = value {
                debug!(attempt = number, "Generated output accepted");
                self.events.try_emit(
                    kinds::GENERATION_VALIDATED,
                    Some(serde_json::json!({"attempts_used": number})),
                );
                return Ok(Validated {
                    value,
                    attempts_used: number,
                });
            }

            let reason = attempt.outcome.reason().unwrap_or_default().to_string();
            debug!(
                attempt = number,
                max_attempts = self.max_attempts,
                reason = %reason,
                raw_len = attempt.raw_text.len(),
                "Generated output rejected"
            );
            self.events.try_emit(
                kinds::GENERATION_REJECTED,
                Some(serde_json::json!({"attempt": number, "reason": reason})),
            );
            last_failure = reason;
        }

        warn!(
            attempts = self.max_attempts,
            last_failure = %last_failure,
            "Validation exhausted"
        );
        Err(ValidationExhaustedError {
            attempts: self.max_attempts,
            last_failure,
        }
        .into())
    }

    fn evaluate(&self, number: u32, raw: String) -> (GenerationAttempt, Option<T>) {
        let parsed: serde_json::Value = match serde_json::from_str(strip_code_fence(&raw)) {
            Ok(parsed) => parsed,
            Err(err) => {
                let reason = format!("output is not valid JSON: {err}");
                return (GenerationAttempt::unparseable(number, raw, reason), None);
            }
        };

        if let Err(err) = self.shape.check(&parsed) {
            return (GenerationAttempt::checked(number, raw, parsed, Err(err)), None);
        }

        match serde_json::from_value::<T>(parsed.clone()) {
            Ok(value) => (GenerationAttempt::checked(number, raw, parsed, Ok(())), Some(value)),
            Err(err) => {
                let err = super::ValidationError::new(format!(
                    "output does not match the typed contract: {err}"
                ));
                (GenerationAttempt::checked(number, raw, parsed, Err(err)), None)
            }
        }
    }
}

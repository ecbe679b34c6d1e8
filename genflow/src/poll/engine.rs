//! Create-then-poll driver for asynchronous vendor jobs.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{Clock, SystemClock};
use crate::core::{JobSpec, TaskHandle, TaskStatus};
use crate::errors::{
    GenflowError, JobFailedError, MalformedSuccessError, PollTimeoutError, SubmissionError,
};
use crate::events::{kinds, EventSink, NoOpEventSink};
use crate::vendor::JobVendor;

/// Polling budget for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOptions {
    /// Wait between status fetches, in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Maximum number of status fetches.
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
    /// Wall-clock budget, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_max_polls() -> u32 {
    60
}

fn default_timeout_ms() -> u64 {
    120_000
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_polls: default_max_polls(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl PollOptions {
    /// Creates the default budget.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the poll interval.
    #[must_use]
    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    /// Sets the poll ceiling.
    #[must_use]
    pub fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = max_polls;
        self
    }

    /// Sets the wall-clock budget.
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Gets the interval as a Duration.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Gets the timeout as a Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Rejects budgets that could never finish or never poll.
    pub fn validate(&self) -> Result<(), GenflowError> {
        if self.interval_ms == 0 {
            return Err(GenflowError::Config("poll interval_ms must be > 0".to_string()));
        }
        if self.max_polls == 0 {
            return Err(GenflowError::Config("poll max_polls must be > 0".to_string()));
        }
        if self.timeout_ms == 0 {
            return Err(GenflowError::Config("poll timeout_ms must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Drives vendor jobs from submission to a terminal status.
///
/// The engine holds no per-job state; every [`TaskHandle`] is owned by the
/// caller, so one engine can serve any number of concurrent runs.
#[derive(Clone)]
pub struct PollEngine {
    vendor: Arc<dyn JobVendor>,
    clock: Arc<dyn Clock>,
    options: PollOptions,
    events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for PollEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollEngine")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl PollEngine {
    /// Creates an engine on the system clock with default options.
    #[must_use]
    pub fn new(vendor: Arc<dyn JobVendor>) -> Self {
        Self {
            vendor,
            clock: Arc::new(SystemClock::new()),
            options: PollOptions::default(),
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the default poll budget.
    #[must_use]
    pub fn with_options(mut self, options: PollOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Returns the default poll budget.
    #[must_use]
    pub fn options(&self) -> &PollOptions {
        &self.options
    }

    /// Sends one creation request. Never retried here.
    pub async fn submit(&self, spec: &JobSpec) -> Result<TaskHandle, GenflowError> {
        let submitted = self
            .vendor
            .submit(spec)
            .await
            .map_err(|err| SubmissionError::from_vendor(&spec.model_id, err))?;

        if let Some(error) = submitted.initial.error.as_ref().filter(|e| !e.is_null()) {
            warn!(model_id = %spec.model_id, error = %error, "Creation response carried an error");
            return Err(SubmissionError::embedded(&spec.model_id, error.clone()).into());
        }
        if submitted.id.trim().is_empty() && !submitted.initial.status.is_terminal() {
            return Err(SubmissionError {
                model_id: spec.model_id.clone(),
                status_code: None,
                message: "creation response carried no task id".to_string(),
                vendor_error: None,
            }
            .into());
        }

        let handle = TaskHandle::from_submission(spec, submitted);
        info!(
            task_id = %handle.id(),
            model_id = %spec.model_id,
            kind = %spec.kind,
            status = %handle.status(),
            "Submitted job"
        );
        self.events.try_emit(
            kinds::JOB_SUBMITTED,
            Some(serde_json::json!({
                "task_id": handle.id(),
                "model_id": spec.model_id,
                "kind": spec.kind,
                "status": handle.status(),
            })),
        );
        Ok(handle)
    }

    /// Polls with the engine's default budget.
    pub async fn await_completion(&self, handle: TaskHandle) -> Result<TaskHandle, GenflowError> {
        let options = self.options.clone();
        self.await_with(handle, &options).await
    }

    /// Polls until the handle is terminal or the budget runs out.
    ///
    /// Returns the handle only when it `succeeded` with a usable output.
    /// A terminal status is never followed by another fetch, and a handle
    /// that is already terminal is resolved without fetching at all.
    pub async fn await_with(
        &self,
        mut handle: TaskHandle,
        options: &PollOptions,
    ) -> Result<TaskHandle, GenflowError> {
        options.validate()?;
        let started = self.clock.now();
        let mut polls: u32 = 0;

        loop {
            match handle.status() {
                TaskStatus::Succeeded => return self.resolve_success(handle),
                TaskStatus::Failed | TaskStatus::Canceled => return Err(self.resolve_failure(&handle)),
                TaskStatus::Pending | TaskStatus::Running => {}
            }

            let elapsed = self.clock.now().saturating_sub(started);
            if polls >= options.max_polls || elapsed >= options.timeout() {
                return Err(self.timed_out(&handle, polls, elapsed));
            }

            // The last wait is cut short so no fetch lands past the deadline.
            let wait = options.interval().min(options.timeout().saturating_sub(elapsed));
            self.clock.sleep(wait).await;
            let snapshot = self.vendor.fetch(handle.id()).await?;
            polls += 1;

            let previous = handle.status();
            if !handle.apply(snapshot.clone()) {
                warn!(
                    task_id = %handle.id(),
                    from = %previous,
                    to = %snapshot.status,
                    "Ignored illegal status transition"
                );
            }
            debug!(task_id = %handle.id(), polls, status = %handle.status(), "Polled task");
            self.events.try_emit(
                kinds::JOB_POLLED,
                Some(serde_json::json!({
                    "task_id": handle.id(),
                    "poll": polls,
                    "status": handle.status(),
                })),
            );
        }
    }

    /// Submits `spec` and waits for it with the default budget.
    pub async fn run(&self, spec: &JobSpec) -> Result<TaskHandle, GenflowError> {
        let handle = self.submit(spec).await?;
        self.await_completion(handle).await
    }

    fn resolve_success(&self, handle: TaskHandle) -> Result<TaskHandle, GenflowError> {
        if handle.primary_output().is_none() {
            let reason = match handle.output() {
                None | Some(serde_json::Value::Null) => "output is absent",
                Some(_) => "output has no usable reference",
            };
            warn!(task_id = %handle.id(), reason, "Job succeeded without usable output");
            self.events.try_emit(
                kinds::JOB_FAILED,
                Some(serde_json::json!({"task_id": handle.id(), "reason": reason})),
            );
            return Err(MalformedSuccessError {
                task_id: handle.id().to_string(),
                reason: reason.to_string(),
                output: handle.output().cloned(),
            }
            .into());
        }

        info!(task_id = %handle.id(), polls = handle.polls(), "Job succeeded");
        self.events.try_emit(
            kinds::JOB_SUCCEEDED,
            Some(serde_json::json!({"task_id": handle.id(), "polls": handle.polls()})),
        );
        Ok(handle)
    }

    fn resolve_failure(&self, handle: &TaskHandle) -> GenflowError {
        let vendor_error = handle.error().cloned().unwrap_or(serde_json::Value::Null);
        warn!(task_id = %handle.id(), status = %handle.status(), error = %vendor_error, "Job failed");
        self.events.try_emit(
            kinds::JOB_FAILED,
            Some(serde_json::json!({
                "task_id": handle.id(),
                "status": handle.status(),
                "error": vendor_error,
            })),
        );
        JobFailedError {
            task_id: handle.id().to_string(),
            status: handle.status(),
            vendor_error,
        }
        .into()
    }

    fn timed_out(&self, handle: &TaskHandle, polls: u32, elapsed: Duration) -> GenflowError {
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        warn!(task_id = %handle.id(), polls, elapsed_ms, status = %handle.status(), "Poll budget exhausted");
        self.events.try_emit(
            kinds::JOB_TIMED_OUT,
            Some(serde_json::json!({
                "task_id": handle.id(),
                "polls": polls,
                "elapsed_ms": elapsed_ms,
            })),
        );
        PollTimeoutError {
            task_id: handle.id().to_string(),
            polls,
            elapsed_ms,
            last_status: handle.status(),
        }
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{JobKind, StatusSnapshot, SubmittedJob};
    use crate::errors::{VendorError, VendorOperation};
    use crate::events::CollectingEventSink;
    use crate::poll::ManualClock;
    use crate::vendor::MockJobVendor;
    use mockall::Sequence;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn spec() -> JobSpec {
        JobSpec::new(JobKind::ImageEdit, "owner/model", json!({"prompt": "p"}))
    }

    fn submitted(status: TaskStatus) -> SubmittedJob {
        SubmittedJob {
            id: "task-1".to_string(),
            initial: StatusSnapshot::new(status),
            status_url: None,
        }
    }

    fn engine(vendor: MockJobVendor, clock: Arc<ManualClock>) -> PollEngine {
        PollEngine::new(Arc::new(vendor)).with_clock(clock)
    }

    #[test]
    fn test_poll_options_defaults_and_validation() {
        let options = PollOptions::default();
        assert_eq!(options.interval(), Duration::from_secs(1));
        assert_eq!(options.max_polls, 60);
        assert_eq!(options.timeout(), Duration::from_secs(120));
        assert!(options.validate().is_ok());

        assert!(PollOptions::new().with_max_polls(0).validate().is_err());
        assert!(PollOptions::new().with_interval_ms(0).validate().is_err());
        assert!(PollOptions::new().with_timeout_ms(0).validate().is_err());

        let parsed: PollOptions = serde_json::from_str(r#"{"max_polls": 5}"#).unwrap();
        assert_eq!(parsed.max_polls, 5);
        assert_eq!(parsed.interval_ms, 1000);
    }

    #[tokio::test]
    async fn test_submit_rejection_is_submission_error() {
        let mut vendor = MockJobVendor::new();
        vendor.expect_submit().times(1).returning(|_| {
            Err(VendorError::new(VendorOperation::Submit, "invalid input")
                .with_status(422)
                .with_body(json!({"detail": "invalid input"})))
        });
        vendor.expect_fetch().never();

        let err = engine(vendor, Arc::new(ManualClock::new()))
            .submit(&spec())
            .await
            .unwrap_err();
        match err {
            GenflowError::Submission(e) => {
                assert_eq!(e.status_code, Some(422));
                assert_eq!(e.vendor_error, Some(json!({"detail": "invalid input"})));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_submit_embedded_error_is_submission_error() {
        let mut vendor = MockJobVendor::new();
        vendor.expect_submit().times(1).returning(|_| {
            Ok(SubmittedJob {
                id: "task-1".to_string(),
                initial: StatusSnapshot {
                    status: TaskStatus::Pending,
                    output: None,
                    error: Some(json!("model not found")),
                },
                status_url: None,
            })
        });

        let err = engine(vendor, Arc::new(ManualClock::new()))
            .submit(&spec())
            .await
            .unwrap_err();
        assert!(matches!(err, GenflowError::Submission(_)));
        assert!(err.to_string().contains("model not found"));
    }

    #[tokio::test]
    async fn test_initial_terminal_status_needs_no_fetch() {
        let mut vendor = MockJobVendor::new();
        vendor.expect_submit().times(1).returning(|_| {
            Ok(SubmittedJob {
                id: "task-1".to_string(),
                initial: StatusSnapshot::succeeded(json!("https://x/final.png")),
                status_url: None,
            })
        });
        vendor.expect_fetch().never();

        let clock = Arc::new(ManualClock::new());
        let handle = engine(vendor, clock.clone()).run(&spec()).await.unwrap();

        assert_eq!(handle.primary_output().as_deref(), Some("https://x/final.png"));
        assert_eq!(clock.sleep_count(), 0);
    }

    #[tokio::test]
    async fn test_no_extra_poll_after_terminal_status() {
        let mut vendor = MockJobVendor::new();
        let mut seq = Sequence::new();
        vendor
            .expect_submit()
            .times(1)
            .returning(|_| Ok(submitted(TaskStatus::Pending)));
        vendor
            .expect_fetch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(StatusSnapshot::new(TaskStatus::Running)));
        vendor
            .expect_fetch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(StatusSnapshot::succeeded(json!(["https://x/a.png", "https://x/b.png"]))));

        let sink = Arc::new(CollectingEventSink::new());
        let handle = engine(vendor, Arc::new(ManualClock::new()))
            .with_event_sink(sink.clone())
            .run(&spec())
            .await
            .unwrap();

        assert_eq!(handle.status(), TaskStatus::Succeeded);
        assert_eq!(handle.polls(), 2);
        assert_eq!(handle.primary_output().as_deref(), Some("https://x/a.png"));
        assert_eq!(
            sink.kinds(),
            vec!["job.submitted", "job.polled", "job.polled", "job.succeeded"]
        );
    }

    #[tokio::test]
    async fn test_always_running_times_out_at_ceiling() {
        let mut vendor = MockJobVendor::new();
        vendor
            .expect_submit()
            .times(1)
            .returning(|_| Ok(submitted(TaskStatus::Pending)));
        vendor
            .expect_fetch()
            .times(7)
            .returning(|_| Ok(StatusSnapshot::new(TaskStatus::Running)));

        let clock = Arc::new(ManualClock::new());
        let engine = engine(vendor, clock.clone())
            .with_options(PollOptions::new().with_max_polls(7).with_interval_ms(2000));
        let err = engine.run(&spec()).await.unwrap_err();

        match err {
            GenflowError::PollTimeout(e) => {
                assert_eq!(e.polls, 7);
                assert_eq!(e.last_status, TaskStatus::Running);
                assert_eq!(e.elapsed_ms, 14_000);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(2); 7]);
    }

    #[tokio::test]
    async fn test_wall_clock_budget_is_tighter_than_ceiling() {
        let mut vendor = MockJobVendor::new();
        vendor
            .expect_submit()
            .times(1)
            .returning(|_| Ok(submitted(TaskStatus::Pending)));
        vendor
            .expect_fetch()
            .times(4)
            .returning(|_| Ok(StatusSnapshot::new(TaskStatus::Pending)));

        let clock = Arc::new(ManualClock::new());
        let engine = engine(vendor, clock.clone())
            .with_options(PollOptions::new().with_timeout_ms(3500));
        let err = engine.run(&spec()).await.unwrap_err();

        match err {
            GenflowError::PollTimeout(e) => {
                assert_eq!(e.polls, 4);
                assert_eq!(e.last_status, TaskStatus::Pending);
                assert_eq!(e.elapsed_ms, 3500);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(clock.sleeps().last(), Some(&Duration::from_millis(500)));
    }

    #[tokio::test]
    async fn test_no_fetch_lands_past_the_deadline() {
        let mut vendor = MockJobVendor::new();
        vendor
            .expect_submit()
            .times(1)
            .returning(|_| Ok(submitted(TaskStatus::Pending)));
        vendor
            .expect_fetch()
            .times(2)
            .returning(|_| Ok(StatusSnapshot::new(TaskStatus::Running)));

        let clock = Arc::new(ManualClock::new());
        let engine = engine(vendor, clock.clone()).with_options(
            PollOptions::new()
                .with_interval_ms(10_000)
                .with_timeout_ms(15_000),
        );
        let err = engine.run(&spec()).await.unwrap_err();

        match err {
            GenflowError::PollTimeout(e) => {
                assert_eq!(e.polls, 2);
                assert_eq!(e.elapsed_ms, 15_000);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_secs(10), Duration::from_secs(5)]
        );
    }

    #[tokio::test]
    async fn test_failed_and_canceled_carry_vendor_error() {
        for status in [TaskStatus::Failed, TaskStatus::Canceled] {
            let mut vendor = MockJobVendor::new();
            vendor
                .expect_submit()
                .returning(|_| Ok(submitted(TaskStatus::Pending)));
            vendor.expect_fetch().times(1).returning(move |_| {
                Ok(StatusSnapshot {
                    status,
                    output: None,
                    error: Some(json!({"code": "E_NSFW", "detail": "flagged"})),
                })
            });

            let err = engine(vendor, Arc::new(ManualClock::new()))
                .run(&spec())
                .await
                .unwrap_err();
            match err {
                GenflowError::JobFailed(e) => {
                    assert_eq!(e.status, status);
                    assert_eq!(e.vendor_error, json!({"code": "E_NSFW", "detail": "flagged"}));
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[tokio::test]
    async fn test_success_without_output_is_malformed() {
        let mut vendor = MockJobVendor::new();
        vendor
            .expect_submit()
            .returning(|_| Ok(submitted(TaskStatus::Running)));
        vendor
            .expect_fetch()
            .times(1)
            .returning(|_| Ok(StatusSnapshot::succeeded(json!({"seed": 42}))));

        let err = engine(vendor, Arc::new(ManualClock::new()))
            .run(&spec())
            .await
            .unwrap_err();
        match err {
            GenflowError::MalformedSuccess(e) => {
                assert_eq!(e.reason, "output has no usable reference");
                assert_eq!(e.output, Some(json!({"seed": 42})));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_failure_surfaces_as_vendor_error() {
        let mut vendor = MockJobVendor::new();
        vendor
            .expect_submit()
            .returning(|_| Ok(submitted(TaskStatus::Pending)));
        vendor
            .expect_fetch()
            .times(1)
            .returning(|_| Err(VendorError::new(VendorOperation::Fetch, "connection reset")));

        let err = engine(vendor, Arc::new(ManualClock::new()))
            .run(&spec())
            .await
            .unwrap_err();
        assert!(matches!(err, GenflowError::Vendor(ref e) if e.operation == VendorOperation::Fetch));
    }

    #[tokio::test]
    async fn test_invalid_options_rejected_before_polling() {
        let mut vendor = MockJobVendor::new();
        vendor.expect_fetch().never();

        let handle = TaskHandle::from_submission(&spec(), submitted(TaskStatus::Pending));
        let result = engine(vendor, Arc::new(ManualClock::new()))
            .await_with(handle, &PollOptions::new().with_max_polls(0))
            .await;
        tokio_test::assert_err!(result);
    }
}

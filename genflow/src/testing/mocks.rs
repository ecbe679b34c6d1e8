//! Scripted vendor doubles.
//!
//! Each double replays a fixed script and records what it was asked, so
//! tests can drive the poll engine, the retrier and the pipelines without a
//! network.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

use crate::core::{ImageResult, JobSpec, StatusSnapshot, SubmittedJob, TaskStatus};
use crate::errors::{VendorError, VendorOperation};
use crate::vendor::{
    Asset, AssetFetcher, CompletionRequest, CompletionVendor, ImageRequest, ImageVendor, JobVendor,
    ResponseItem, ResponsesRequest,
};

/// A job vendor that replays status snapshots.
///
/// Once the script is exhausted the last snapshot repeats forever; with no
/// script at all every fetch reports `running`.
#[derive(Debug)]
pub struct ScriptedJobVendor {
    submission: Mutex<Result<SubmittedJob, VendorError>>,
    script: Mutex<VecDeque<Result<StatusSnapshot, VendorError>>>,
    last: Mutex<StatusSnapshot>,
    submissions: Mutex<Vec<JobSpec>>,
    fetches: Mutex<usize>,
}

impl Default for ScriptedJobVendor {
    fn default() -> Self {
        Self {
            submission: Mutex::new(Ok(SubmittedJob {
                id: "job-1".to_string(),
                initial: StatusSnapshot::new(TaskStatus::Pending),
                status_url: None,
            })),
            script: Mutex::new(VecDeque::new()),
            last: Mutex::new(StatusSnapshot::new(TaskStatus::Running)),
            submissions: Mutex::new(Vec::new()),
            fetches: Mutex::new(0),
        }
    }
}

impl ScriptedJobVendor {
    /// Creates a vendor that accepts jobs as `pending` and reports `running`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A vendor whose creation response is already `succeeded` with `output`.
    #[must_use]
    pub fn succeeding_immediately(output: serde_json::Value) -> Self {
        Self::new().on_submit(StatusSnapshot::succeeded(output))
    }

    /// Sets the state reported by the creation response.
    #[must_use]
    pub fn on_submit(self, initial: StatusSnapshot) -> Self {
        *self.submission.lock() = Ok(SubmittedJob {
            id: "job-1".to_string(),
            initial,
            status_url: None,
        });
        self
    }

    /// Makes job creation fail.
    #[must_use]
    pub fn reject_submit(self, err: VendorError) -> Self {
        *self.submission.lock() = Err(err);
        self
    }

    /// Appends a snapshot to the fetch script.
    #[must_use]
    pub fn then(self, snapshot: StatusSnapshot) -> Self {
        self.script.lock().push_back(Ok(snapshot));
        self
    }

    /// Appends a fetch failure to the fetch script.
    #[must_use]
    pub fn then_error(self, err: VendorError) -> Self {
        self.script.lock().push_back(Err(err));
        self
    }

    /// Returns every submitted spec, in order.
    #[must_use]
    pub fn submissions(&self) -> Vec<JobSpec> {
        self.submissions.lock().clone()
    }

    /// Returns the number of fetches served.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        *self.fetches.lock()
    }
}

#[async_trait]
impl JobVendor for ScriptedJobVendor {
    async fn submit(&self, spec: &JobSpec) -> Result<SubmittedJob, VendorError> {
        self.submissions.lock().push(spec.clone());
        self.submission.lock().clone()
    }

    async fn fetch(&self, _task_id: &str) -> Result<StatusSnapshot, VendorError> {
        *self.fetches.lock() += 1;
        match self.script.lock().pop_front() {
            Some(Ok(snapshot)) => {
                *self.last.lock() = snapshot.clone();
                Ok(snapshot)
            }
            Some(Err(err)) => Err(err),
            None => Ok(self.last.lock().clone()),
        }
    }
}

/// A completion vendor that replays raw texts; the last one repeats.
#[derive(Debug, Default)]
pub struct ScriptedCompletionVendor {
    script: Mutex<VecDeque<Result<String, VendorError>>>,
    last: Mutex<Option<String>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletionVendor {
    /// Creates a vendor with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a vendor that always answers `text`.
    #[must_use]
    pub fn always(text: impl Into<String>) -> Self {
        Self::new().then(text)
    }

    /// Appends a response.
    #[must_use]
    pub fn then(self, text: impl Into<String>) -> Self {
        self.script.lock().push_back(Ok(text.into()));
        self
    }

    /// Appends a failure.
    #[must_use]
    pub fn then_error(self, err: VendorError) -> Self {
        self.script.lock().push_back(Err(err));
        self
    }

    /// Returns every request received, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    /// Returns the number of calls served.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl CompletionVendor for ScriptedCompletionVendor {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, VendorError> {
        self.requests.lock().push(request.clone());
        match self.script.lock().pop_front() {
            Some(Ok(text)) => {
                *self.last.lock() = Some(text.clone());
                Ok(text)
            }
            Some(Err(err)) => Err(err),
            None => self
                .last
                .lock()
                .clone()
                .ok_or_else(|| VendorError::new(VendorOperation::Complete, "completion script is empty")),
        }
    }
}

/// An image vendor with fixed answers.
#[derive(Debug)]
pub struct StubImageVendor {
    images: Mutex<Result<Vec<ImageResult>, VendorError>>,
    items: Mutex<Result<Vec<ResponseItem>, VendorError>>,
    image_requests: Mutex<Vec<ImageRequest>>,
    responses_requests: Mutex<Vec<ResponsesRequest>>,
}

impl Default for StubImageVendor {
    fn default() -> Self {
        Self {
            images: Mutex::new(Ok(Vec::new())),
            items: Mutex::new(Ok(Vec::new())),
            image_requests: Mutex::new(Vec::new()),
            responses_requests: Mutex::new(Vec::new()),
        }
    }
}

impl StubImageVendor {
    /// Creates a vendor that produces nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the images returned by `generate_image`.
    #[must_use]
    pub fn with_images(self, images: Vec<ImageResult>) -> Self {
        *self.images.lock() = Ok(images);
        self
    }

    /// Makes `generate_image` fail.
    #[must_use]
    pub fn failing_images(self, err: VendorError) -> Self {
        *self.images.lock() = Err(err);
        self
    }

    /// Sets the items returned by `respond`.
    #[must_use]
    pub fn with_items(self, items: Vec<ResponseItem>) -> Self {
        *self.items.lock() = Ok(items);
        self
    }

    /// Returns every `generate_image` request, in order.
    #[must_use]
    pub fn image_requests(&self) -> Vec<ImageRequest> {
        self.image_requests.lock().clone()
    }

    /// Returns every `respond` request, in order.
    #[must_use]
    pub fn responses_requests(&self) -> Vec<ResponsesRequest> {
        self.responses_requests.lock().clone()
    }
}

#[async_trait]
impl ImageVendor for StubImageVendor {
    async fn generate_image(&self, request: &ImageRequest) -> Result<Vec<ImageResult>, VendorError> {
        self.image_requests.lock().push(request.clone());
        self.images.lock().clone()
    }

    async fn respond(&self, request: &ResponsesRequest) -> Result<Vec<ResponseItem>, VendorError> {
        self.responses_requests.lock().push(request.clone());
        self.items.lock().clone()
    }
}

/// An asset fetcher serving fixed bytes per location.
#[derive(Debug, Default)]
pub struct StubAssetFetcher {
    assets: Mutex<HashMap<String, Asset>>,
    fetched: Mutex<Vec<String>>,
}

impl StubAssetFetcher {
    /// Creates a fetcher with no assets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `bytes` at `location`.
    #[must_use]
    pub fn with_asset(self, location: impl Into<String>, bytes: &[u8], mime_type: &str) -> Self {
        self.assets
            .lock()
            .insert(location.into(), Asset::new(bytes.to_vec(), Some(mime_type.to_string())));
        self
    }

    /// Returns every location requested, in order.
    #[must_use]
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().clone()
    }
}

#[async_trait]
impl AssetFetcher for StubAssetFetcher {
    async fn fetch_bytes(&self, location: &str) -> Result<Asset, VendorError> {
        self.fetched.lock().push(location.to_string());
        self.assets
            .lock()
            .get(location)
            .cloned()
            .ok_or_else(|| VendorError::new(VendorOperation::Download, format!("no asset at {location}")).with_status(404))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::JobKind;
    use serde_json::json;

    #[tokio::test]
    async fn test_scripted_job_vendor_repeats_last_snapshot() {
        let vendor = ScriptedJobVendor::new().then(StatusSnapshot::new(TaskStatus::Running));
        let spec = JobSpec::new(JobKind::ImageEdit, "m", json!({}));

        let submitted = vendor.submit(&spec).await.unwrap();
        assert_eq!(submitted.initial.status, TaskStatus::Pending);

        for _ in 0..3 {
            assert_eq!(vendor.fetch("job-1").await.unwrap().status, TaskStatus::Running);
        }
        assert_eq!(vendor.fetch_count(), 3);
        assert_eq!(vendor.submissions().len(), 1);
    }

    #[tokio::test]
    async fn test_scripted_completion_vendor() {
        let vendor = ScriptedCompletionVendor::new().then("one").then("two");
        let request = CompletionRequest::new("m").user("q");

        assert_eq!(vendor.complete(&request).await.unwrap(), "one");
        assert_eq!(vendor.complete(&request).await.unwrap(), "two");
        assert_eq!(vendor.complete(&request).await.unwrap(), "two");
        assert_eq!(vendor.call_count(), 3);

        let empty = ScriptedCompletionVendor::new();
        assert!(empty.complete(&request).await.is_err());
    }

    #[tokio::test]
    async fn test_stub_asset_fetcher() {
        let fetcher = StubAssetFetcher::new().with_asset("https://x/a.png", b"png", "image/png");
        assert_eq!(fetcher.fetch_bytes("https://x/a.png").await.unwrap().bytes, b"png");

        let err = fetcher.fetch_bytes("https://x/missing.png").await.unwrap_err();
        assert_eq!(err.status_code, Some(404));
    }
}

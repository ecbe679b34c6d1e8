//! Testing utilities for genflow callers.
//!
//! This module provides:
//! - Scripted vendors that replay fixed responses and record requests
//! - Canned payloads
//! - Assertions for pipeline results

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_artifact_inline, assert_artifact_kind, assert_artifact_url, assert_stage_failed,
};
pub use fixtures::{angle_json, angle_record, angle_set, PNG_SIGNATURE};
pub use mocks::{
    ScriptedCompletionVendor, ScriptedJobVendor, StubAssetFetcher, StubImageVendor,
};

//! Structured-output contracts.
//!
//! This module provides:
//! - Declared shapes with field-level validation errors
//! - Code-fence stripping for model output
//! - The generic validate-and-retry loop

mod fence;
mod retrier;
mod shape;

pub use fence::strip_code_fence;
pub use retrier::{Validated, ValidatedRetrier};
pub use shape::{FieldRule, FieldType, Shape, ShapeCheck, ValidationError};

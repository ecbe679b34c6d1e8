//! Canned payloads for tests.

use serde_json::{json, Value};

/// The 8-byte PNG signature, enough to stand in for image bytes.
pub const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// One well-formed angle record.
#[must_use]
pub fn angle_record(index: usize) -> Value {
    json!({
        "title": format!("Angle {index}"),
        "summary": format!("What angle {index} claims"),
        "journey": format!("Where angle {index} takes the listener"),
    })
}

/// An angle set with `count` well-formed records.
#[must_use]
pub fn angle_set(count: usize) -> Value {
    json!({"angles": (1..=count).map(angle_record).collect::<Vec<_>>()})
}

/// [`angle_set`] rendered as model output text.
#[must_use]
pub fn angle_json(count: usize) -> String {
    angle_set(count).to_string()
}

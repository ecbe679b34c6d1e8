//! Small shared helpers: identifiers, timestamps, environment and encoding.

mod encoding;

use chrono::Utc;
use uuid::Uuid;

pub use encoding::{
    decode_base64, encode_base64, media_type, sha256_hex, split_data_url, to_data_url, truncate_text,
};

/// Generates a new random UUID v4.
#[must_use]
pub fn generate_uuid() -> Uuid {
    Uuid::new_v4()
}

/// Generates a new time-ordered UUID v7, used for run identifiers.
#[must_use]
pub fn generate_run_id() -> Uuid {
    Uuid::now_v7()
}

/// Returns the current UTC time as an ISO 8601 string with microseconds.
#[must_use]
pub fn iso_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}

/// Reads an environment variable, treating blank values as unset.
#[must_use]
pub fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

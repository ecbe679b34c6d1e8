//! Base64 and `data:` URL helpers for inline payloads.

use base64::{engine::general_purpose::STANDARD, Engine};
use sha2::{Digest, Sha256};

/// Encodes bytes as standard base64.
#[must_use]
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decodes standard base64, returning `None` on malformed input.
#[must_use]
pub fn decode_base64(encoded: &str) -> Option<Vec<u8>> {
    STANDARD.decode(encoded.trim().as_bytes()).ok()
}

/// Renders bytes as a `data:` URL.
#[must_use]
pub fn to_data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, encode_base64(bytes))
}

/// Splits a base64 `data:` URL into its mime type and encoded body.
///
/// Only the `;base64` form is recognized.
#[must_use]
pub fn split_data_url(value: &str) -> Option<(String, String)> {
    let rest = value.trim().strip_prefix("data:")?;
    let (header, body) = rest.split_once(',')?;
    let mime = header.strip_suffix(";base64")?;
    let mime = if mime.is_empty() { "application/octet-stream" } else { mime };
    Some((mime.to_string(), body.to_string()))
}

/// Reduces a `Content-Type` value to its bare media type.
///
/// Parameters such as `charset` are dropped; a blank type yields `None`.
#[must_use]
pub fn media_type(content_type: &str) -> Option<String> {
    let bare = content_type
        .split_once(';')
        .map_or(content_type, |(head, _)| head)
        .trim();
    (!bare.is_empty()).then(|| bare.to_ascii_lowercase())
}

/// Returns the lowercase hex sha256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Truncates text to at most `max_chars` characters, marking the cut.
#[must_use]
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_drops_parameters() {
        assert_eq!(media_type("image/png; charset=binary").as_deref(), Some("image/png"));
        assert_eq!(media_type(" Image/JPEG ").as_deref(), Some("image/jpeg"));
        assert_eq!(media_type(" ; q=1"), None);
    }

    #[test]
    fn test_data_url_round_trip() {
        let url = to_data_url("image/png", b"\x89PNG");
        assert!(url.starts_with("data:image/png;base64,"));

        let (mime, body) = split_data_url(&url).unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(decode_base64(&body).unwrap(), b"\x89PNG");
    }

    #[test]
    fn test_split_data_url_rejects_plain_urls() {
        assert!(split_data_url("https://x/typo.png").is_none());
        assert!(split_data_url("data:text/plain,hello").is_none());
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("abcdefgh", 3), "abc...");
    }
}

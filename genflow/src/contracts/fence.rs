//! Removal of a markdown code-fence wrapper around model output.

use regex::Regex;
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static OUTER_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A\s*```[A-Za-z0-9_+\-]*[ \t]*\r?\n(.*?)\r?\n?[ \t]*```\s*\z")
        .expect("fence pattern is valid")
});

/// Strips one outer code fence, if the whole text is wrapped in one.
///
/// Only a single level is removed; fences nested inside the body are left
/// untouched. Text that is not fully wrapped is returned trimmed.
#[must_use]
pub fn strip_code_fence(raw: &str) -> &str {
    match OUTER_FENCE.captures(raw).and_then(|caps| caps.get(1)) {
        Some(body) => body.as_str().trim(),
        None => raw.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(strip_code_fence(r#"  {"a": 1} "#), r#"{"a": 1}"#);
    }

    #[test]
    fn test_json_fence_is_removed() {
        let raw = "```json\n{\"angles\": []}\n```";
        assert_eq!(strip_code_fence(raw), "{\"angles\": []}");
    }

    #[test]
    fn test_bare_fence_is_removed() {
        let raw = "\n```\r\n[1, 2]\r\n```\n";
        assert_eq!(strip_code_fence(raw), "[1, 2]");
    }

    #[test]
    fn test_only_one_level_is_removed() {
        let raw = "```\n```json\n{}\n```\n```";
        assert_eq!(strip_code_fence(raw), "```json\n{}\n```");
    }

    #[test]
    fn test_unterminated_fence_is_left_alone() {
        let raw = "```json\n{\"a\": 1}";
        assert_eq!(strip_code_fence(raw), raw);
    }

    #[test]
    fn test_prose_around_fence_is_left_alone() {
        let raw = "Here you go:\n```json\n{}\n```";
        assert_eq!(strip_code_fence(raw), raw);
    }
}

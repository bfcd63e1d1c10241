//! Credential and permission redaction for provider error text.
//!
//! Provider SDKs and HTTP errors routinely echo request details back. Any
//! message matching one of the markers below is replaced wholesale with
//! [`REDACTED_NOTICE`]; partial masking is not attempted.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

/// Replacement text for messages that matched a sensitive marker.
pub const REDACTED_NOTICE: &str =
    "provider request failed (details hidden: check the API key and permission settings)";

static SENSITIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        api[\s_-]?key
        | [?&]key=
        | x-goog-api-key
        | permission
        | \b403\b
        | unauthori[sz]ed
        | \bbearer\s+\S+
        | AIza[0-9A-Za-z_\-]{10,}
        ",
    )
    .expect("static redaction pattern is valid")
});

/// Returns `true` when `message` contains a credential or permission marker.
pub fn is_sensitive(message: &str) -> bool {
    SENSITIVE.is_match(message)
}

/// Returns `message` unchanged, or [`REDACTED_NOTICE`] if it looks sensitive.
///
/// ```rust
/// use kanva_telemetry::{redact_sensitive, REDACTED_NOTICE};
///
/// assert_eq!(redact_sensitive("connection reset"), "connection reset");
/// assert_eq!(redact_sensitive("HTTP 403 PERMISSION_DENIED"), REDACTED_NOTICE);
/// ```
pub fn redact_sensitive(message: &str) -> Cow<'_, str> {
    if is_sensitive(message) { Cow::Borrowed(REDACTED_NOTICE) } else { Cow::Borrowed(message) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_through_ordinary_errors() {
        for msg in ["connection reset by peer", "operation timed out after 30s", "bad JSON at line 3"]
        {
            assert_eq!(redact_sensitive(msg), msg);
        }
    }

    #[test]
    fn hides_credential_markers() {
        let samples = [
            "API key not valid. Please pass a valid API key.",
            "missing api_key parameter",
            "request to https://host/v1?key=abc failed",
            "status 403 Forbidden",
            "PERMISSION_DENIED: caller lacks permission",
            "401 Unauthorized",
            "Authorization: Bearer sk-abc123",
            "leaked AIzaSyA1234567890abcdefghijklmnopqrstu",
        ];
        for msg in samples {
            assert_eq!(redact_sensitive(msg), REDACTED_NOTICE, "not redacted: {msg}");
        }
    }

    #[test]
    fn does_not_match_unrelated_numbers() {
        assert!(!is_sensitive("processed 4030 chunks"));
        assert!(!is_sensitive("keyboard layout"));
    }
}

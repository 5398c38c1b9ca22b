//! Error types for generation, history storage and sharing.

use std::time::Duration;

/// Errors that can occur while generating, storing or exporting images.
#[derive(Debug, thiserror::Error)]
pub enum StudioError {
    /// The request was rejected before anything was sent (e.g. empty prompt).
    #[error("{0}")]
    Validation(String),

    /// A generation is already outstanding.
    #[error("a generation is already in progress")]
    Busy,

    /// API key missing or invalid.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limit exceeded.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// Content was blocked by safety filters.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// Invalid request parameters for the selected backend.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The response succeeded but carried no usable image payload.
    #[error("{0}")]
    ResponseFormat(String),

    /// Failed to decode base64 data.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// The storage backend refused a write because it would exceed its quota.
    #[error("storage quota exceeded writing {key}: {needed} bytes needed, {quota} allowed")]
    StorageQuota {
        key: String,
        needed: u64,
        quota: u64,
    },

    /// The platform has no native share facility.
    #[error("sharing is not supported on this platform")]
    ShareUnsupported,

    /// The share invocation itself failed.
    #[error("share failed: {0}")]
    Share(String),

    /// No history record with the given id.
    #[error("no history entry with id {0}")]
    NotFound(String),

    /// I/O error (e.g., saving file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Provider not available (feature not enabled).
    #[error("provider not available: {0}")]
    ProviderNotAvailable(String),
}

impl StudioError {
    /// Returns true if a storage backend rejected the write for lack of space.
    pub fn is_quota(&self) -> bool {
        matches!(self, Self::StorageQuota { .. })
    }
}

/// Result type alias for studio operations.
pub type Result<T> = std::result::Result<T, StudioError>;

const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Trims a remote error body to something fit for a user-facing message.
///
/// Extracts `error.message` / `message` from JSON bodies, redacts anything that
/// looks like an API key and caps the length.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let extracted = serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| text.trim().to_string());

    let redacted = extracted
        .split_whitespace()
        .map(|word| {
            let looks_like_key = (word.starts_with("AIza") || word.starts_with("sk-"))
                && word.len() > 20;
            if looks_like_key {
                "[REDACTED]"
            } else {
                word
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    if redacted.chars().count() > MAX_ERROR_MESSAGE_LEN {
        let truncated: String = redacted.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
        format!("{truncated}...")
    } else {
        redacted
    }
}

/// Reads a `Retry-After` header expressed in whole seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_quota() {
        let err = StudioError::StorageQuota {
            key: "genstudio_history".into(),
            needed: 10,
            quota: 5,
        };
        assert!(err.is_quota());
        assert!(!StudioError::ShareUnsupported.is_quota());
        assert!(!StudioError::Validation("x".into()).is_quota());
    }

    #[test]
    fn test_error_display() {
        let err = StudioError::Api {
            status: 404,
            message: "Not found".into(),
        };
        assert_eq!(err.to_string(), "API error: 404 - Not found");

        let err = StudioError::Validation("Please enter a prompt first".into());
        assert_eq!(err.to_string(), "Please enter a prompt first");

        let err = StudioError::ContentBlocked("Safety filter triggered".into());
        assert_eq!(err.to_string(), "content blocked: Safety filter triggered");
    }

    #[test]
    fn test_sanitize_extracts_json_message() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid"}}"#;
        assert_eq!(sanitize_error_message(body), "API key not valid");

        let body = r#"{"id": "abc", "name": "bad_request", "message": "height must be a multiple of 64"}"#;
        assert_eq!(
            sanitize_error_message(body),
            "height must be a multiple of 64"
        );
    }

    #[test]
    fn test_sanitize_redacts_keys_and_truncates() {
        let msg = sanitize_error_message("bad key AIzaSyA1234567890abcdefghijk supplied");
        assert_eq!(msg, "bad key [REDACTED] supplied");

        let long = "x".repeat(2_000);
        let msg = sanitize_error_message(&long);
        assert_eq!(msg.chars().count(), MAX_ERROR_MESSAGE_LEN + 3);
        assert!(msg.ends_with("..."));
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = reqwest::header::HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);
        headers.insert(reqwest::header::RETRY_AFTER, "30".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), Some(30));
    }
}

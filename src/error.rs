//! Error types for media loading
//!
//! Every failure in this crate is scoped to a single resource key. The enum is
//! `Clone` so that all waiters on one in-flight load observe the same error.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for media fetch and cache operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// The bearer credential was missing or rejected (HTTP 401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The caller may not read this resource (HTTP 403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The resource does not exist (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Server-side transient failure (HTTP 429 or 5xx)
    #[error("Transient failure (HTTP {status})")]
    Transient { status: u16 },

    /// A single attempt exceeded its time bound
    #[error("Attempt timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Network-level failure before a response was received
    #[error("Network error: {0}")]
    Network(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Anything that does not fit the taxonomy above
    #[error("Error: {0}")]
    Unknown(String),
}

/// Result type alias for media operations
pub type Result<T> = std::result::Result<T, MediaError>;

/// Coarse failure taxonomy surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Unauthorized,
    Forbidden,
    NotFound,
    Transient,
    Unknown,
}

impl MediaError {
    /// Classify an HTTP status code returned by the media endpoint
    pub fn from_status(status: u16, path: &str) -> Self {
        match status {
            401 => MediaError::Unauthorized(path.to_string()),
            403 => MediaError::Forbidden(path.to_string()),
            404 => MediaError::NotFound(path.to_string()),
            429 | 500..=599 => MediaError::Transient { status },
            other => MediaError::Unknown(format!("unexpected HTTP {} for {}", other, path)),
        }
    }

    /// Whether the retry policy may attempt the request again
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            MediaError::Transient { .. } | MediaError::Timeout { .. } | MediaError::Network(_)
        )
    }

    /// Map onto the five-way taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            MediaError::Unauthorized(_) => ErrorKind::Unauthorized,
            MediaError::Forbidden(_) => ErrorKind::Forbidden,
            MediaError::NotFound(_) => ErrorKind::NotFound,
            MediaError::Transient { .. } | MediaError::Timeout { .. } | MediaError::Network(_) => {
                ErrorKind::Transient
            }
            MediaError::Config(_) | MediaError::Unknown(_) => ErrorKind::Unknown,
        }
    }
}

impl From<reqwest::Error> for MediaError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return MediaError::from_status(status.as_u16(), e.url().map(|u| u.path()).unwrap_or(""));
        }
        if e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() {
            MediaError::Network(e.to_string())
        } else {
            MediaError::Unknown(e.to_string())
        }
    }
}

impl From<serde_json::Error> for MediaError {
    fn from(e: serde_json::Error) -> Self {
        MediaError::Config(e.to_string())
    }
}

impl From<String> for MediaError {
    fn from(s: String) -> Self {
        MediaError::Unknown(s)
    }
}

impl From<&str> for MediaError {
    fn from(s: &str) -> Self {
        MediaError::Unknown(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = MediaError::NotFound("images/a.jpg".to_string());
        assert_eq!(error.to_string(), "Not found: images/a.jpg");

        let timeout = MediaError::Timeout { timeout_ms: 500 };
        assert!(timeout.to_string().contains("500ms"));

        let transient = MediaError::Transient { status: 503 };
        assert!(transient.to_string().contains("503"));
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(MediaError::from_status(401, "p"), MediaError::Unauthorized(_)));
        assert!(matches!(MediaError::from_status(403, "p"), MediaError::Forbidden(_)));
        assert!(matches!(MediaError::from_status(404, "p"), MediaError::NotFound(_)));
        assert_eq!(MediaError::from_status(429, "p"), MediaError::Transient { status: 429 });
        assert_eq!(MediaError::from_status(502, "p"), MediaError::Transient { status: 502 });
        assert!(matches!(MediaError::from_status(418, "p"), MediaError::Unknown(_)));
    }

    #[test]
    fn test_retriable_and_kind() {
        assert!(MediaError::Transient { status: 503 }.is_retriable());
        assert!(MediaError::Timeout { timeout_ms: 1 }.is_retriable());
        assert!(MediaError::Network("reset".into()).is_retriable());
        assert!(!MediaError::NotFound("x".into()).is_retriable());
        assert!(!MediaError::Unauthorized("x".into()).is_retriable());

        assert_eq!(MediaError::Timeout { timeout_ms: 1 }.kind(), ErrorKind::Transient);
        assert_eq!(MediaError::Config("bad".into()).kind(), ErrorKind::Unknown);
        assert_eq!(MediaError::Forbidden("x".into()).kind(), ErrorKind::Forbidden);
    }

    #[test]
    fn test_error_conversion() {
        let error: MediaError = "test error".into();
        assert!(matches!(error, MediaError::Unknown(_)));

        let error: MediaError = "test error".to_string().into();
        assert!(matches!(error, MediaError::Unknown(_)));
    }
}

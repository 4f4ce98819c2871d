//! Upstream lookup error types.

use std::sync::Arc;

/// HTTP status the reputation service returns when it is overloaded.
pub const STATUS_OVERLOADED: u16 = 503;

/// Errors from the reputation lookup service.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UpstreamError {
    /// No API key configured.
    #[error("missing API key: REPUTE_API_KEY not set")]
    MissingApiKey,

    /// The service is temporarily overloaded (HTTP 503).
    #[error("service overloaded: {message}")]
    Overloaded { message: String },

    /// Any other non-success HTTP response.
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Network error.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Response body did not have the expected shape.
    #[error("parse error: {0}")]
    Parse(String),
}

impl UpstreamError {
    /// Build the error for a non-success status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if status == STATUS_OVERLOADED {
            UpstreamError::Overloaded { message }
        } else {
            UpstreamError::Http { status, message }
        }
    }

    /// HTTP status code, when the failure came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::Overloaded { .. } => Some(STATUS_OVERLOADED),
            UpstreamError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the same request may succeed if retried later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, UpstreamError::Overloaded { .. })
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { UpstreamError::Timeout } else { UpstreamError::Network(Arc::new(err)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = UpstreamError::MissingApiKey;
        assert!(err.to_string().contains("API key"));

        let err = UpstreamError::Http { status: 400, message: "bad request".to_string() };
        assert_eq!(err.to_string(), "HTTP error 400: bad request");
    }

    #[test]
    fn test_from_status() {
        let err = UpstreamError::from_status(503, "model is overloaded");
        assert!(err.is_retryable());
        assert_eq!(err.status(), Some(503));

        let err = UpstreamError::from_status(429, "quota");
        assert!(!err.is_retryable());
        assert_eq!(err.status(), Some(429));
    }

    #[test]
    fn test_transport_errors_not_retryable() {
        assert!(!UpstreamError::Timeout.is_retryable());
        assert!(!UpstreamError::Parse("eof".into()).is_retryable());
        assert_eq!(UpstreamError::Timeout.status(), None);
    }
}

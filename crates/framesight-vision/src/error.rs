//! Vision client error types.

use thiserror::Error;

use crate::types::ApiErrorBody;

pub type VisionResult<T> = Result<T, VisionError>;

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Backend overloaded: {0}")]
    Overloaded(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl VisionError {
    /// Map a non-success HTTP status and its body to an error.
    ///
    /// The backend's `error.message` is used when the body carries one.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<ApiErrorBody>(body)
            .map(|b| b.error.message)
            .unwrap_or_else(|_| {
                if body.trim().is_empty() {
                    format!("backend returned status {}", status)
                } else {
                    body.trim().to_string()
                }
            });

        match status {
            400 => VisionError::InvalidRequest(message),
            401 => VisionError::Authentication(message),
            403 => VisionError::Permission(message),
            404 => VisionError::NotFound(message),
            429 => VisionError::RateLimited(message),
            529 => VisionError::Overloaded(message),
            _ => VisionError::Api(message),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn stream(msg: impl Into<String>) -> Self {
        Self::Stream(msg.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            VisionError::RateLimited(_)
                | VisionError::Overloaded(_)
                | VisionError::Api(_)
                | VisionError::Network(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(VisionError::from_status(400, ""), VisionError::InvalidRequest(_)));
        assert!(matches!(VisionError::from_status(401, ""), VisionError::Authentication(_)));
        assert!(matches!(VisionError::from_status(403, ""), VisionError::Permission(_)));
        assert!(matches!(VisionError::from_status(404, ""), VisionError::NotFound(_)));
        assert!(matches!(VisionError::from_status(429, ""), VisionError::RateLimited(_)));
        assert!(matches!(VisionError::from_status(500, ""), VisionError::Api(_)));
        assert!(matches!(VisionError::from_status(502, ""), VisionError::Api(_)));
        assert!(matches!(VisionError::from_status(529, ""), VisionError::Overloaded(_)));
    }

    #[test]
    fn test_message_from_body() {
        let body = r#"{"type":"error","error":{"type":"rate_limit_error","message":"slow down"}}"#;
        match VisionError::from_status(429, body) {
            VisionError::RateLimited(msg) => assert_eq!(msg, "slow down"),
            other => panic!("unexpected error: {:?}", other),
        }

        match VisionError::from_status(500, "") {
            VisionError::Api(msg) => assert!(msg.contains("500")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_retryable() {
        assert!(VisionError::RateLimited("x".into()).is_retryable());
        assert!(VisionError::Overloaded("x".into()).is_retryable());
        assert!(VisionError::Api("x".into()).is_retryable());
        assert!(!VisionError::Authentication("x".into()).is_retryable());
        assert!(!VisionError::InvalidRequest("x".into()).is_retryable());
    }
}

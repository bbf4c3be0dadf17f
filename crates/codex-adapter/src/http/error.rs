/*
[INPUT]:  Error sources (keys, encoding, HTTP, API, WebSocket transport)
[OUTPUT]: Structured error types with retry and auth hints
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or improving error messages
*/

use reqwest::StatusCode;
use thiserror::Error;

/// Main error type for the Codex adapter
#[derive(Error, Debug)]
pub enum CodexError {
    /// Secret key is malformed (bad hex, wrong length, inconsistent public half)
    #[error("Invalid secret key: {0}")]
    InvalidKey(String),

    /// Payload could not be turned into the canonical byte string
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Operation requires an active transport
    #[error("WebSocket not connected")]
    NotConnected,

    /// Server rejected our signature
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Network level failure on the streaming transport
    #[error("Transport error: {0}")]
    Transport(String),

    /// Signed endpoint called without credentials
    #[error("API keys are empty, call set_credentials first")]
    MissingCredentials,

    /// Caller supplied an unusable argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response
    #[error("API error (code {code}): {message}")]
    Api { code: i32, message: String },

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CodexError {
    /// Check if the error is retryable by the caller
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CodexError::Http(_) | CodexError::Transport(_) | CodexError::NotConnected
        ) || matches!(self, CodexError::Api { code, .. } if *code >= 500 || *code == 429)
    }

    /// Check if error indicates authentication failure
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            CodexError::Authentication { .. }
                | CodexError::InvalidKey(_)
                | CodexError::MissingCredentials
        ) || matches!(self, CodexError::Api { code, .. } if *code == 401 || *code == 403)
    }

    /// Create an API error from status code and message
    pub fn api_error(status: StatusCode, message: impl Into<String>) -> Self {
        CodexError::Api {
            code: status.as_u16() as i32,
            message: message.into(),
        }
    }
}

/// Result type alias for Codex operations
pub type Result<T> = std::result::Result<T, CodexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryable() {
        assert!(CodexError::Transport("reset".into()).is_retryable());
        assert!(CodexError::api_error(StatusCode::BAD_GATEWAY, "upstream").is_retryable());
        assert!(CodexError::api_error(StatusCode::TOO_MANY_REQUESTS, "slow down").is_retryable());

        assert!(!CodexError::MissingCredentials.is_retryable());
        assert!(!CodexError::api_error(StatusCode::BAD_REQUEST, "bad").is_retryable());
    }

    #[test]
    fn test_error_is_auth_error() {
        assert!(CodexError::InvalidKey("short".into()).is_auth_error());
        assert!(
            CodexError::Authentication {
                message: "rejected".into()
            }
            .is_auth_error()
        );
        assert!(CodexError::api_error(StatusCode::UNAUTHORIZED, "nope").is_auth_error());
        assert!(!CodexError::NotConnected.is_auth_error());
    }

    #[test]
    fn test_api_error_creation() {
        let err = CodexError::api_error(StatusCode::BAD_REQUEST, "Invalid market");
        match err {
            CodexError::Api { code, message } => {
                assert_eq!(code, 400);
                assert_eq!(message, "Invalid market");
            }
            _ => panic!("Expected Api error variant"),
        }
    }
}

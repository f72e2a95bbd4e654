//! Error types for ragrelay
//!
//! Every failure the retrieval and generation calls can produce is a
//! [`RagError`]. The retry layer uses [`RagError::is_transient`] to decide
//! whether resubmitting an operation is worthwhile.

use reqwest::StatusCode;
use thiserror::Error;

/// Main error type for the retrieval-augmented generation pipeline
#[derive(Error, Debug)]
pub enum RagError {
    /// A required endpoint or credential is missing. Raised before any
    /// network call is attempted.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Timeout, connection reset, 5xx or rate limiting
    #[error("Transient network error: {message}")]
    Transient { message: String },

    /// Non-success HTTP status that resubmitting will not fix (400, 401, 403...)
    #[error("HTTP {status}: {body}")]
    Api { status: u16, body: String },

    /// Response body is missing fields the contract requires
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Completion service returned no choices or an empty completion
    #[error("Generation failed: {0}")]
    Generation(String),

    /// Caller cancelled the operation, or its deadline passed
    #[error("Operation cancelled")]
    Cancelled,

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, RagError>;

impl RagError {
    /// Whether a failed operation is likely to succeed on resubmission
    pub fn is_transient(&self) -> bool {
        matches!(self, RagError::Transient { .. })
    }

    /// Classify a non-success HTTP response.
    ///
    /// 408, 429 and every 5xx are transient; anything else is a hard API error.
    pub fn from_status(status: StatusCode, body: String) -> Self {
        if status == StatusCode::REQUEST_TIMEOUT
            || status == StatusCode::TOO_MANY_REQUESTS
            || status.is_server_error()
        {
            RagError::Transient {
                message: format!("HTTP {}: {}", status.as_u16(), body),
            }
        } else {
            RagError::Api {
                status: status.as_u16(),
                body,
            }
        }
    }
}

impl From<reqwest::Error> for RagError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return RagError::MalformedResponse(err.to_string());
        }
        if let Some(status) = err.status() {
            return RagError::from_status(status, err.to_string());
        }
        if err.is_builder() {
            return RagError::Config(err.to_string());
        }
        // timeouts, refused connections, resets mid-body
        RagError::Transient {
            message: err.to_string(),
        }
    }
}

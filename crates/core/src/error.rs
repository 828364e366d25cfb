//! Errors raised while talking to the recommendation backend.

use thiserror::Error;

/// Failure modes of a single backend call.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
    /// The request never produced a response (connection refused, DNS, reset).
    #[error("network failure: {0}")]
    Network(String),

    /// The request did not complete within the configured bound.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// The server answered with a non-success status.
    #[error("server rejected request ({status}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// `error` field of the body, or the raw body when absent.
        message: String,
    },

    /// The body did not match the expected JSON shape.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ApiError {
    /// Message suitable for an inline form error.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Rejected { message, .. } if !message.is_empty() => message.clone(),
            ApiError::Rejected { status, .. } => format!("Request rejected ({status})"),
            ApiError::Network(_) => "Could not reach the server".to_string(),
            ApiError::Timeout(_) => "The server took too long to answer".to_string(),
            ApiError::Malformed(_) => "Unexpected response from the server".to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Malformed(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Malformed(err.to_string())
    }
}

/// Result alias for backend calls.
pub type ApiResult<T> = Result<T, ApiError>;

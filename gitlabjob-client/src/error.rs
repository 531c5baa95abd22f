//! Error types for the GitLab client

use gitlabjob_core::IdError;
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to GitLab
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed before a response arrived
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Transport failure raised by a non-HTTP gateway
    #[error("Transport failure: {0}")]
    Transport(String),

    /// API returned an error status code
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Response body was not the expected JSON shape
    #[error("Failed to parse response (status {status}): {message}")]
    ParseError { status: u16, message: String },

    /// An id in a response or argument could not be used
    #[error(transparent)]
    InvalidIdentifier(#[from] IdError),
}

impl ClientError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    pub fn parse_error(status: u16, message: impl Into<String>) -> Self {
        Self::ParseError {
            status,
            message: message.into(),
        }
    }

    /// Whether the request never got an answer from the service
    ///
    /// Transport failures abort a run; every other error is reported and
    /// the run moves on.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::RequestFailed(_) | Self::Transport(_))
    }

    /// HTTP status attached to the error, if a response was received
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ApiError { status, .. } | Self::ParseError { status, .. } => Some(*status),
            Self::RequestFailed(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_and_classification() {
        let err = ClientError::api_error(404, "404 Not found");
        assert!(err.is_not_found());
        assert!(!err.is_transport());
        assert_eq!(err.status(), Some(404));

        let err = ClientError::parse_error(502, "expected value");
        assert_eq!(err.status(), Some(502));

        let err = ClientError::Transport("connection refused".to_string());
        assert!(err.is_transport());
        assert_eq!(err.status(), None);
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for Photo Frame Kiosk

use thiserror::Error;

/// Result type alias
pub type PfkResult<T> = Result<T, PfkError>;

/// Main error type
#[derive(Error, Debug)]
pub enum PfkError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Cannot connect: {0}")]
    Network(String),

    #[error("Cannot connect: request timed out")]
    Timeout,

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("{0}")]
    Other(String),
}

impl PfkError {
    /// Transport-level failures. Nothing retries these automatically; the
    /// flag only tells the caller a later, user-initiated attempt may work.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PfkError::Network(_) | PfkError::Timeout)
    }

    pub fn is_auth_error(&self) -> bool {
        matches!(self, PfkError::AuthFailed(_))
    }
}

impl From<reqwest::Error> for PfkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PfkError::Timeout
        } else if let Some(status) = err.status() {
            PfkError::Server {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else if err.is_builder() {
            PfkError::InvalidUrl(err.to_string())
        } else {
            PfkError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable() {
        assert!(PfkError::Network("connection reset".into()).is_retryable());
        assert!(PfkError::Timeout.is_retryable());

        assert!(!PfkError::AuthFailed("bad password".into()).is_retryable());
        assert!(!PfkError::NotFound("/photos".into()).is_retryable());
        assert!(!PfkError::Server { status: 500, message: String::new() }.is_retryable());
    }

    #[test]
    fn test_is_auth_error() {
        assert!(PfkError::AuthFailed("401".into()).is_auth_error());

        assert!(!PfkError::Network("timeout".into()).is_auth_error());
        assert!(!PfkError::Timeout.is_auth_error());
    }

    #[test]
    fn test_auth_and_transport_messages_differ() {
        let auth = PfkError::AuthFailed("check username and password".into()).to_string();
        let timeout = PfkError::Timeout.to_string();
        assert!(auth.starts_with("Authentication failed"));
        assert!(timeout.starts_with("Cannot connect"));
        assert_ne!(auth, timeout);
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PfkError = io_err.into();
        assert!(matches!(err, PfkError::Io(_)));
    }
}

//! Error types for the server and client.

use digitool_core::{CoreError, ErrorKind};
use std::time::Duration;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors raised by the server or the client.
#[derive(Error, Debug)]
pub enum ServerError {
    /// A frame could not be decoded.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A frame exceeded the size limit.
    #[error("request of {size} bytes exceeds the {limit} byte limit")]
    RequestTooLarge {
        /// Bytes received before giving up.
        size: usize,
        /// Configured limit.
        limit: usize,
    },

    /// A request did not finish in time.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The server answered with an error.
    #[error("{kind:?} error from server: {message}")]
    Remote {
        /// Error class reported by the server.
        kind: Option<ErrorKind>,
        /// Error message reported by the server.
        message: String,
    },

    /// The peer broke the framing protocol.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Core engine error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Returns true if the caller sent something the server refuses.
    pub fn is_client_error(&self) -> bool {
        match self {
            ServerError::InvalidRequest(_) | ServerError::RequestTooLarge { .. } => true,
            ServerError::Remote { kind, .. } => {
                matches!(kind, Some(ErrorKind::Validation | ErrorKind::NotFound))
            }
            ServerError::Core(err) => {
                matches!(err.kind(), ErrorKind::Validation | ErrorKind::NotFound)
            }
            _ => false,
        }
    }

    /// Returns true if the server failed on a well-formed request.
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error() && !matches!(self, ServerError::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        assert!(ServerError::InvalidRequest("bad".into()).is_client_error());
        assert!(ServerError::RequestTooLarge { size: 9, limit: 8 }.is_client_error());
        assert!(ServerError::Internal("oops".into()).is_server_error());
        assert!(ServerError::Timeout(Duration::from_secs(1)).is_server_error());
        assert!(!ServerError::Config("x".into()).is_server_error());

        let remote = ServerError::Remote {
            kind: Some(ErrorKind::NotFound),
            message: "missing".into(),
        };
        assert!(remote.is_client_error());
    }

    #[test]
    fn error_display() {
        let err = ServerError::RequestTooLarge {
            size: 2048,
            limit: 1024,
        };
        let msg = err.to_string();
        assert!(msg.contains("2048"));
        assert!(msg.contains("1024"));
    }
}

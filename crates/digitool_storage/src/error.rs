//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A namespace or artifact name is not a plain path component.
    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),

    /// The namespace an artifact was written into does not exist.
    #[error("namespace does not exist: {0}")]
    MissingNamespace(String),

    /// A write was refused by an injected failure (in-memory backend only).
    #[error("write rejected: {0}")]
    WriteRejected(String),
}

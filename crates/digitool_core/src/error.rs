//! Error types for DigitoolDB core.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in DigitoolDB core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] digitool_storage::StorageError),

    /// I/O error outside of a storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A database, collection or field name is not a valid identifier.
    #[error("invalid {what} name: {name:?} (expected letters, digits and underscore)")]
    InvalidName {
        /// What kind of name was rejected.
        what: &'static str,
        /// The rejected name.
        name: String,
    },

    /// A document cannot be stored as given.
    #[error("invalid document: {message}")]
    InvalidDocument {
        /// Description of the problem.
        message: String,
    },

    /// A query document is malformed or uses an unknown operator.
    #[error("invalid query: {message}")]
    InvalidQuery {
        /// Description of the problem.
        message: String,
    },

    /// An update document is malformed or uses an unknown operator.
    #[error("invalid update: {message}")]
    InvalidUpdate {
        /// Description of the problem.
        message: String,
    },

    /// A request could not be decoded.
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// Description of the problem.
        message: String,
    },

    /// A document with this `_id` already exists in the collection.
    #[error("duplicate _id {id:?} in collection {collection}")]
    DuplicateId {
        /// The collection.
        collection: String,
        /// The conflicting id.
        id: String,
    },

    /// Database not found.
    #[error("database not found: {name}")]
    DatabaseNotFound {
        /// Name of the database.
        name: String,
    },

    /// Collection not found.
    #[error("collection not found: {database}.{name}")]
    CollectionNotFound {
        /// Name of the database.
        database: String,
        /// Name of the collection.
        name: String,
    },

    /// The handle refers to a database or collection that was dropped.
    #[error("{what} {name} was dropped")]
    Dropped {
        /// "database" or "collection".
        what: &'static str,
        /// Qualified name of the dropped object.
        name: String,
    },

    /// The document artifact of a collection cannot be decoded.
    #[error("corrupt collection {name}: {message}")]
    CorruptCollection {
        /// Qualified collection name.
        name: String,
        /// Description of the corruption.
        message: String,
    },

    /// A persisted index or index catalog cannot be decoded.
    ///
    /// Recovered internally by rebuilding; never returned by public
    /// collection operations.
    #[error("index corruption: {message}")]
    IndexCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// The data directory is owned by another process.
    #[error("data directory locked: another process has exclusive access")]
    DataDirLocked,
}

/// Coarse classification of a [`CoreError`] for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed names, documents, queries, updates or requests.
    Validation,
    /// The referenced database or collection does not exist.
    NotFound,
    /// Reading or persisting an artifact failed.
    StorageFault,
    /// A persisted index failed to parse.
    IndexCorruption,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::StorageFault => "storage_fault",
            ErrorKind::IndexCorruption => "index_corruption",
        };
        f.write_str(s)
    }
}

impl CoreError {
    /// Returns the kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::InvalidName { .. }
            | CoreError::InvalidDocument { .. }
            | CoreError::InvalidQuery { .. }
            | CoreError::InvalidUpdate { .. }
            | CoreError::InvalidRequest { .. }
            | CoreError::DuplicateId { .. } => ErrorKind::Validation,
            CoreError::DatabaseNotFound { .. }
            | CoreError::CollectionNotFound { .. }
            | CoreError::Dropped { .. } => ErrorKind::NotFound,
            CoreError::Storage(_)
            | CoreError::Io(_)
            | CoreError::CorruptCollection { .. }
            | CoreError::DataDirLocked => ErrorKind::StorageFault,
            CoreError::IndexCorruption { .. } => ErrorKind::IndexCorruption,
        }
    }

    /// Creates an invalid name error.
    pub fn invalid_name(what: &'static str, name: impl Into<String>) -> Self {
        Self::InvalidName {
            what,
            name: name.into(),
        }
    }

    /// Creates an invalid document error.
    pub fn invalid_document(message: impl Into<String>) -> Self {
        Self::InvalidDocument {
            message: message.into(),
        }
    }

    /// Creates an invalid query error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }

    /// Creates an invalid update error.
    pub fn invalid_update(message: impl Into<String>) -> Self {
        Self::InvalidUpdate {
            message: message.into(),
        }
    }

    /// Creates an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates a corrupt collection error.
    pub fn corrupt_collection(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CorruptCollection {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates an index corruption error.
    pub fn index_corruption(message: impl Into<String>) -> Self {
        Self::IndexCorruption {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        assert_eq!(
            CoreError::invalid_query("bad").kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            CoreError::DatabaseNotFound { name: "x".into() }.kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            CoreError::Io(io::Error::other("disk")).kind(),
            ErrorKind::StorageFault
        );
        assert_eq!(
            CoreError::index_corruption("bad magic").kind(),
            ErrorKind::IndexCorruption
        );
    }

    #[test]
    fn error_display() {
        let err = CoreError::DuplicateId {
            collection: "shop.users".into(),
            id: "u1".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("u1"));
        assert!(msg.contains("shop.users"));
        assert_eq!(ErrorKind::StorageFault.to_string(), "storage_fault");
    }
}

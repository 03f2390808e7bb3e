//! Storage backend trait definition.

use crate::error::{StorageError, StorageResult};

/// A namespaced artifact store for DigitoolDB.
///
/// Storage backends hold **opaque artifacts**. A namespace groups the
/// artifacts of one database; an artifact name identifies one file within
/// it. DigitoolDB owns all format interpretation.
///
/// # Invariants
///
/// - `write` replaces the artifact atomically: a concurrent or subsequent
///   `read` returns either the complete old bytes or the complete new bytes
/// - `write` into a namespace that does not exist fails with
///   [`StorageError::MissingNamespace`]; namespaces are never created
///   implicitly
/// - Listings are sorted and never include in-flight temporary files
/// - Backends must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::FileBackend`] - For persistent storage
pub trait StorageBackend: Send + Sync + std::fmt::Debug {
    /// Reads a whole artifact.
    ///
    /// Returns `None` if the artifact (or its namespace) does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or an I/O error occurs.
    fn read(&self, namespace: &str, name: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Atomically creates or replaces an artifact.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace is missing, the key is invalid,
    /// or the write cannot be completed. On error the previous content
    /// of the artifact is left intact.
    fn write(&self, namespace: &str, name: &str, data: &[u8]) -> StorageResult<()>;

    /// Removes an artifact.
    ///
    /// Returns `true` if the artifact existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or an I/O error occurs.
    fn remove(&self, namespace: &str, name: &str) -> StorageResult<bool>;

    /// Lists artifact names within a namespace, sorted.
    ///
    /// A missing namespace lists as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or an I/O error occurs.
    fn list(&self, namespace: &str) -> StorageResult<Vec<String>>;

    /// Creates a namespace.
    ///
    /// Returns `true` if it was created, `false` if it already existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or an I/O error occurs.
    fn create_namespace(&self, namespace: &str) -> StorageResult<bool>;

    /// Removes a namespace together with every artifact in it.
    ///
    /// Returns `true` if the namespace existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or an I/O error occurs.
    fn remove_namespace(&self, namespace: &str) -> StorageResult<bool>;

    /// Returns whether a namespace exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or an I/O error occurs.
    fn namespace_exists(&self, namespace: &str) -> StorageResult<bool>;

    /// Lists all namespaces, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn list_namespaces(&self) -> StorageResult<Vec<String>>;
}

/// Checks that a namespace or artifact name is a single, visible path
/// component.
///
/// # Errors
///
/// Returns [`StorageError::InvalidKey`] for empty names, names containing
/// path separators or NUL, and names starting with a dot (which covers
/// `.` and `..` as well as temporary files).
pub fn validate_component(component: &str) -> StorageResult<()> {
    let invalid = component.is_empty()
        || component.starts_with('.')
        || component.contains(['/', '\\', '\0']);
    if invalid {
        return Err(StorageError::InvalidKey(component.to_string()));
    }
    Ok(())
}

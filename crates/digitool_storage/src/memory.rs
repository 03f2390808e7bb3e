//! In-memory storage backend for testing.

use crate::backend::{validate_component, StorageBackend};
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

type Namespaces = BTreeMap<String, BTreeMap<String, Vec<u8>>>;

/// An in-memory storage backend.
///
/// This backend stores all artifacts in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral stores that don't need persistence
///
/// Writes can be made to fail on demand with
/// [`InMemoryBackend::fail_writes`], which lets tests exercise storage
/// fault handling without a full disk.
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use digitool_storage::{StorageBackend, InMemoryBackend};
///
/// let backend = InMemoryBackend::new();
/// backend.create_namespace("shop").unwrap();
/// backend.write("shop", "users.json", b"[]").unwrap();
/// assert_eq!(backend.list("shop").unwrap(), vec!["users.json"]);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    namespaces: RwLock<Namespaces>,
    fail_writes: AtomicBool,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `write` fail (or succeed again).
    ///
    /// Reads, removals and namespace operations are unaffected.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Returns the total number of artifacts across all namespaces.
    #[must_use]
    pub fn artifact_count(&self) -> usize {
        self.namespaces.read().values().map(BTreeMap::len).sum()
    }
}

impl StorageBackend for InMemoryBackend {
    fn read(&self, namespace: &str, name: &str) -> StorageResult<Option<Vec<u8>>> {
        validate_component(namespace)?;
        validate_component(name)?;
        Ok(self
            .namespaces
            .read()
            .get(namespace)
            .and_then(|artifacts| artifacts.get(name))
            .cloned())
    }

    fn write(&self, namespace: &str, name: &str, data: &[u8]) -> StorageResult<()> {
        validate_component(namespace)?;
        validate_component(name)?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::WriteRejected(format!("{namespace}/{name}")));
        }

        let mut namespaces = self.namespaces.write();
        let artifacts = namespaces
            .get_mut(namespace)
            .ok_or_else(|| StorageError::MissingNamespace(namespace.to_string()))?;
        artifacts.insert(name.to_string(), data.to_vec());
        Ok(())
    }

    fn remove(&self, namespace: &str, name: &str) -> StorageResult<bool> {
        validate_component(namespace)?;
        validate_component(name)?;
        Ok(self
            .namespaces
            .write()
            .get_mut(namespace)
            .is_some_and(|artifacts| artifacts.remove(name).is_some()))
    }

    fn list(&self, namespace: &str) -> StorageResult<Vec<String>> {
        validate_component(namespace)?;
        Ok(self
            .namespaces
            .read()
            .get(namespace)
            .map(|artifacts| artifacts.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn create_namespace(&self, namespace: &str) -> StorageResult<bool> {
        validate_component(namespace)?;
        let mut namespaces = self.namespaces.write();
        if namespaces.contains_key(namespace) {
            return Ok(false);
        }
        namespaces.insert(namespace.to_string(), BTreeMap::new());
        Ok(true)
    }

    fn remove_namespace(&self, namespace: &str) -> StorageResult<bool> {
        validate_component(namespace)?;
        Ok(self.namespaces.write().remove(namespace).is_some())
    }

    fn namespace_exists(&self, namespace: &str) -> StorageResult<bool> {
        validate_component(namespace)?;
        Ok(self.namespaces.read().contains_key(namespace))
    }

    fn list_namespaces(&self) -> StorageResult<Vec<String>> {
        Ok(self.namespaces.read().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_read_remove() {
        let backend = InMemoryBackend::new();
        backend.create_namespace("shop").unwrap();

        backend.write("shop", "users.json", b"[]").unwrap();
        assert_eq!(backend.read("shop", "users.json").unwrap(), Some(b"[]".to_vec()));
        assert_eq!(backend.artifact_count(), 1);

        assert!(backend.remove("shop", "users.json").unwrap());
        assert!(!backend.remove("shop", "users.json").unwrap());
        assert_eq!(backend.read("shop", "users.json").unwrap(), None);
    }

    #[test]
    fn write_requires_namespace() {
        let backend = InMemoryBackend::new();
        let result = backend.write("shop", "users.json", b"[]");
        assert!(matches!(result, Err(StorageError::MissingNamespace(_))));
    }

    #[test]
    fn injected_write_failures() {
        let backend = InMemoryBackend::new();
        backend.create_namespace("shop").unwrap();
        backend.write("shop", "users.json", b"old").unwrap();

        backend.fail_writes(true);
        let result = backend.write("shop", "users.json", b"new");
        assert!(matches!(result, Err(StorageError::WriteRejected(_))));
        assert_eq!(backend.read("shop", "users.json").unwrap(), Some(b"old".to_vec()));

        backend.fail_writes(false);
        backend.write("shop", "users.json", b"new").unwrap();
        assert_eq!(backend.read("shop", "users.json").unwrap(), Some(b"new".to_vec()));
    }

    #[test]
    fn namespaces() {
        let backend = InMemoryBackend::new();
        assert!(backend.create_namespace("shop").unwrap());
        assert!(!backend.create_namespace("shop").unwrap());
        backend.create_namespace("blog").unwrap();

        assert_eq!(backend.list_namespaces().unwrap(), vec!["blog", "shop"]);
        assert!(backend.remove_namespace("shop").unwrap());
        assert!(!backend.namespace_exists("shop").unwrap());
        assert!(backend.list("shop").unwrap().is_empty());
    }
}

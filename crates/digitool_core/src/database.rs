//! Databases: named namespaces of collections.

use crate::collection::Collection;
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::layout;
use crate::naming::validate_collection_name;
use digitool_storage::StorageBackend;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// A database: a set of collections stored in one namespace.
///
/// Collection handles are cached; asking twice for the same name returns
/// the same `Arc<Collection>`. The cache mutex is always taken before any
/// collection lock.
pub struct Database {
    name: String,
    backend: Arc<dyn StorageBackend>,
    config: Config,
    collections: Mutex<HashMap<String, Arc<Collection>>>,
    dropped: AtomicBool,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("dropped", &self.dropped.load(Ordering::Acquire))
            .finish()
    }
}

impl Database {
    pub(crate) fn new(name: &str, backend: Arc<dyn StorageBackend>, config: Config) -> Self {
        Self {
            name: name.to_string(),
            backend,
            config,
            collections: Mutex::new(HashMap::new()),
            dropped: AtomicBool::new(false),
        }
    }

    /// Returns the database name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true once the database was dropped.
    #[must_use]
    pub fn is_dropped(&self) -> bool {
        self.dropped.load(Ordering::Acquire)
    }

    fn ensure_live(&self) -> CoreResult<()> {
        if self.is_dropped() {
            return Err(CoreError::Dropped {
                what: "database",
                name: self.name.clone(),
            });
        }
        Ok(())
    }

    fn collection_exists(&self, name: &str) -> CoreResult<bool> {
        Ok(self
            .backend
            .read(&self.name, &layout::documents_artifact(name))?
            .is_some())
    }

    /// Opens a collection, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidName`] for invalid names, or a storage
    /// error if the collection cannot be read or created.
    pub fn collection(&self, name: &str) -> CoreResult<Arc<Collection>> {
        validate_collection_name(name)?;
        let mut collections = self.collections.lock();
        self.ensure_live()?;
        self.open_cached(&mut collections, name, true)
            .map(|(collection, _)| collection)
    }

    /// Opens an existing collection.
    ///
    /// Returns `None` if it does not exist; never creates anything.
    pub fn get_collection(&self, name: &str) -> CoreResult<Option<Arc<Collection>>> {
        validate_collection_name(name)?;
        let mut collections = self.collections.lock();
        self.ensure_live()?;

        if !collections.contains_key(name) && !self.collection_exists(name)? {
            return Ok(None);
        }
        self.open_cached(&mut collections, name, false)
            .map(|(collection, _)| Some(collection))
    }

    /// Creates a collection. Returns false if it already existed.
    pub fn create_collection(&self, name: &str) -> CoreResult<bool> {
        validate_collection_name(name)?;
        let mut collections = self.collections.lock();
        self.ensure_live()?;
        self.open_cached(&mut collections, name, true)
            .map(|(_, created)| created)
    }

    /// Returns the cached handle or opens one. The flag tells whether the
    /// collection was created by this call.
    fn open_cached(
        &self,
        collections: &mut HashMap<String, Arc<Collection>>,
        name: &str,
        create: bool,
    ) -> CoreResult<(Arc<Collection>, bool)> {
        if let Some(collection) = collections.get(name) {
            return Ok((collection.clone(), false));
        }

        let created = create && !self.collection_exists(name)?;
        let collection = Arc::new(Collection::open(
            self.backend.clone(),
            &self.config,
            &self.name,
            name,
            create,
        )?);
        if created {
            info!(database = %self.name, collection = name, "created collection");
        }
        collections.insert(name.to_string(), collection.clone());
        Ok((collection, created))
    }

    /// Drops a collection with its documents, catalog and index artifacts.
    ///
    /// Returns whether it existed. The cached handle, if any, is
    /// invalidated.
    pub fn drop_collection(&self, name: &str) -> CoreResult<bool> {
        validate_collection_name(name)?;
        let mut collections = self.collections.lock();
        self.ensure_live()?;

        if let Some(collection) = collections.remove(name) {
            collection.invalidate();
        }

        let mut existed = false;
        for artifact in self.backend.list(&self.name)? {
            if layout::belongs_to(name, &artifact) {
                existed |= self.backend.remove(&self.name, &artifact)?;
            }
        }

        if existed {
            info!(database = %self.name, collection = name, "dropped collection");
        }
        Ok(existed)
    }

    /// Lists collection names in sorted order.
    pub fn list_collections(&self) -> CoreResult<Vec<String>> {
        self.ensure_live()?;
        let names = self
            .backend
            .list(&self.name)?
            .iter()
            .filter_map(|artifact| layout::collection_of_documents(artifact))
            .map(str::to_string)
            .collect();
        debug!(database = %self.name, "listed collections");
        Ok(names)
    }

    /// Invalidates this handle and every cached collection handle.
    pub(crate) fn invalidate(&self) {
        let mut collections = self.collections.lock();
        for (_, collection) in collections.drain() {
            collection.invalidate();
        }
        self.dropped.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use digitool_storage::InMemoryBackend;
    use serde_json::json;

    fn database() -> Database {
        let backend = Arc::new(InMemoryBackend::new());
        backend.create_namespace("shop").unwrap();
        Database::new("shop", backend, Config::default())
    }

    #[test]
    fn collection_handles_are_shared() {
        let db = database();
        let a = db.collection("users").unwrap();
        let b = db.collection("users").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn get_collection_never_creates() {
        let db = database();
        assert!(db.get_collection("users").unwrap().is_none());
        assert!(db.list_collections().unwrap().is_empty());
        db.collection("users").unwrap();
        assert!(db.get_collection("users").unwrap().is_some());
    }

    #[test]
    fn create_and_list() {
        let db = database();
        assert!(db.create_collection("users").unwrap());
        assert!(!db.create_collection("users").unwrap());
        db.collection("orders").unwrap();
        assert_eq!(db.list_collections().unwrap(), ["orders", "users"]);
        assert!(matches!(
            db.collection("bad name"),
            Err(CoreError::InvalidName { .. })
        ));
    }

    #[test]
    fn drop_collection_removes_artifacts_and_invalidates() {
        let db = database();
        let users = db.collection("users").unwrap();
        users.insert(json!({"age": 1}).as_object().unwrap().clone()).unwrap();
        users.create_index("age").unwrap();
        db.collection("users_old").unwrap();

        assert!(db.drop_collection("users").unwrap());
        assert!(!db.drop_collection("users").unwrap());
        assert!(users.find(&json!({})).is_err());
        assert_eq!(db.list_collections().unwrap(), ["users_old"]);

        let fresh = db.collection("users").unwrap();
        assert!(fresh.is_empty().unwrap());
        assert!(fresh.list_indices().unwrap().is_empty());
    }

    #[test]
    fn invalidate_cascades() {
        let db = database();
        let users = db.collection("users").unwrap();
        db.invalidate();
        assert!(users.is_dropped());
        assert!(matches!(
            db.collection("users"),
            Err(CoreError::Dropped { what: "database", .. })
        ));
    }
}

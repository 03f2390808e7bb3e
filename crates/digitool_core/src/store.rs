//! The store: root of a data directory and namespace of databases.

use crate::config::Config;
use crate::database::Database;
use crate::dir::DataDir;
use crate::error::{CoreError, CoreResult};
use crate::naming::validate_database_name;
use digitool_storage::{FileBackend, InMemoryBackend, StorageBackend};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// A DigitoolDB store.
///
/// Owns the data directory lock, the storage backend and the cache of
/// database handles. Lock order is store cache, then database cache, then
/// collection.
///
/// # Example
///
/// ```rust,ignore
/// use digitool_core::Store;
/// use serde_json::json;
///
/// let store = Store::open("./data")?;
/// let users = store.database("shop")?.collection("users")?;
/// users.insert(json!({"name": "Alice"}).as_object().unwrap().clone())?;
/// ```
pub struct Store {
    backend: Arc<dyn StorageBackend>,
    config: Config,
    databases: Mutex<HashMap<String, Arc<Database>>>,
    dir: Option<DataDir>,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.dir.as_ref().map(DataDir::path))
            .field("config", &self.config)
            .finish()
    }
}

impl Store {
    /// Opens a store on a data directory with the default configuration.
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Opens a store on a data directory.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DataDirLocked`] if another process owns the
    /// directory, or an I/O error if it cannot be created.
    pub fn open_with_config(path: impl AsRef<Path>, config: Config) -> CoreResult<Self> {
        let dir = DataDir::open(path.as_ref(), config.create_if_missing)?;
        let backend = FileBackend::open(dir.path(), config.sync_writes)?;
        info!(path = %dir.path().display(), "opened store");
        Ok(Self {
            backend: Arc::new(backend),
            config,
            databases: Mutex::new(HashMap::new()),
            dir: Some(dir),
        })
    }

    /// Creates a store over an arbitrary backend.
    pub fn with_backend(backend: Arc<dyn StorageBackend>, config: Config) -> Self {
        Self {
            backend,
            config,
            databases: Mutex::new(HashMap::new()),
            dir: None,
        }
    }

    /// Creates a store that keeps everything in memory.
    #[must_use]
    pub fn open_in_memory() -> Self {
        Self::with_backend(Arc::new(InMemoryBackend::new()), Config::default())
    }

    /// Returns the data directory, if the store is file-backed.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(DataDir::path)
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Creates a database. Returns false if it already existed.
    pub fn create_database(&self, name: &str) -> CoreResult<bool> {
        validate_database_name(name)?;
        let _databases = self.databases.lock();
        let created = self.backend.create_namespace(name)?;
        if created {
            info!(database = name, "created database");
        }
        Ok(created)
    }

    /// Opens a database, creating it if needed.
    ///
    /// Repeated calls return the same handle until the database is dropped.
    pub fn database(&self, name: &str) -> CoreResult<Arc<Database>> {
        validate_database_name(name)?;
        let mut databases = self.databases.lock();
        if let Some(database) = databases.get(name) {
            return Ok(database.clone());
        }

        if self.backend.create_namespace(name)? {
            info!(database = name, "created database");
        }
        let database = Arc::new(Database::new(
            name,
            self.backend.clone(),
            self.config.clone(),
        ));
        databases.insert(name.to_string(), database.clone());
        Ok(database)
    }

    /// Opens an existing database. Never creates anything.
    pub fn get_database(&self, name: &str) -> CoreResult<Option<Arc<Database>>> {
        validate_database_name(name)?;
        let mut databases = self.databases.lock();
        if let Some(database) = databases.get(name) {
            return Ok(Some(database.clone()));
        }
        if !self.backend.namespace_exists(name)? {
            return Ok(None);
        }

        let database = Arc::new(Database::new(
            name,
            self.backend.clone(),
            self.config.clone(),
        ));
        databases.insert(name.to_string(), database.clone());
        Ok(Some(database))
    }

    /// Drops a database with all its collections.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DatabaseNotFound`] if it does not exist.
    pub fn drop_database(&self, name: &str) -> CoreResult<()> {
        validate_database_name(name)?;
        let mut databases = self.databases.lock();
        if let Some(database) = databases.remove(name) {
            database.invalidate();
        }
        if !self.backend.remove_namespace(name)? {
            return Err(CoreError::DatabaseNotFound {
                name: name.to_string(),
            });
        }
        info!(database = name, "dropped database");
        Ok(())
    }

    /// Lists database names in sorted order.
    pub fn list_databases(&self) -> CoreResult<Vec<String>> {
        Ok(self.backend.list_namespaces()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn database_lifecycle() {
        let store = Store::open_in_memory();
        assert!(store.create_database("shop").unwrap());
        assert!(!store.create_database("shop").unwrap());
        store.database("blog").unwrap();
        assert_eq!(store.list_databases().unwrap(), ["blog", "shop"]);

        store.drop_database("shop").unwrap();
        assert_eq!(store.list_databases().unwrap(), ["blog"]);
        assert!(matches!(
            store.drop_database("shop"),
            Err(CoreError::DatabaseNotFound { .. })
        ));
    }

    #[test]
    fn get_database_never_creates() {
        let store = Store::open_in_memory();
        assert!(store.get_database("shop").unwrap().is_none());
        assert!(store.list_databases().unwrap().is_empty());
    }

    #[test]
    fn invalid_names_are_rejected() {
        let store = Store::open_in_memory();
        for name in ["", "a.b", "../x", "LOCK file"] {
            assert!(matches!(
                store.database(name),
                Err(CoreError::InvalidName { what: "database", .. })
            ));
        }
    }

    #[test]
    fn dropping_database_invalidates_handles() {
        let store = Store::open_in_memory();
        let db = store.database("shop").unwrap();
        let users = db.collection("users").unwrap();
        store.drop_database("shop").unwrap();

        assert!(matches!(
            users.find(&json!({})),
            Err(CoreError::Dropped { .. })
        ));
        assert!(matches!(
            db.list_collections(),
            Err(CoreError::Dropped { .. })
        ));

        let fresh = store.database("shop").unwrap();
        assert!(fresh.list_collections().unwrap().is_empty());
    }

    #[test]
    fn file_store_persists_and_locks() {
        let temp = tempdir().unwrap();
        {
            let store = Store::open(temp.path()).unwrap();
            assert!(matches!(
                Store::open(temp.path()),
                Err(CoreError::DataDirLocked)
            ));
            let users = store.database("shop").unwrap().collection("users").unwrap();
            users
                .insert(json!({"_id": "a", "n": 1}).as_object().unwrap().clone())
                .unwrap();
        }

        let store = Store::open(temp.path()).unwrap();
        assert_eq!(store.list_databases().unwrap(), ["shop"]);
        let users = store.database("shop").unwrap().collection("users").unwrap();
        assert!(users.get("a").unwrap().is_some());
        assert!(temp.path().join("shop").join("users.json").is_file());
    }
}

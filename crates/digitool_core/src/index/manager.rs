//! Index set of one collection.

use crate::document::{Document, DocumentId};
use crate::error::CoreResult;
use crate::index::catalog::{Catalog, Fingerprint};
use crate::index::persistence::{load_index, persist_index};
use crate::index::FieldIndex;
use crate::layout;
use digitool_storage::StorageBackend;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Why an index was rebuilt from documents when its collection opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryReason {
    /// The index artifact was missing.
    MissingArtifact,
    /// The index artifact failed to parse or held another field.
    CorruptArtifact(String),
    /// The catalog fingerprint did not match the documents.
    StaleCatalog,
    /// The catalog was missing; the field was found from its artifact.
    MissingCatalog,
    /// The catalog failed to parse.
    CorruptCatalog(String),
}

impl RecoveryReason {
    /// Returns true if the rebuild was caused by unreadable data.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            RecoveryReason::CorruptArtifact(_) | RecoveryReason::CorruptCatalog(_)
        )
    }
}

impl fmt::Display for RecoveryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryReason::MissingArtifact => f.write_str("index artifact missing"),
            RecoveryReason::CorruptArtifact(msg) => write!(f, "index artifact corrupt: {msg}"),
            RecoveryReason::StaleCatalog => f.write_str("index catalog stale"),
            RecoveryReason::MissingCatalog => f.write_str("index catalog missing"),
            RecoveryReason::CorruptCatalog(msg) => write!(f, "index catalog corrupt: {msg}"),
        }
    }
}

/// An index rebuilt while opening its collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredIndex {
    /// Indexed field.
    pub field: String,
    /// Why it was rebuilt.
    pub reason: RecoveryReason,
}

/// Owns the indexes of one collection and keeps them in step with its
/// documents.
///
/// Mutations mark the touched indexes dirty; [`IndexManager::sync`] writes
/// them out followed by the catalog.
pub struct IndexManager {
    backend: Arc<dyn StorageBackend>,
    database: String,
    collection: String,
    indexes: BTreeMap<String, FieldIndex>,
    dirty: BTreeSet<String>,
    recovered: Vec<RecoveredIndex>,
}

impl fmt::Debug for IndexManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexManager")
            .field("database", &self.database)
            .field("collection", &self.collection)
            .field("fields", &self.indexes.keys().collect::<Vec<_>>())
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl IndexManager {
    /// Creates a manager with no indexes.
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        database: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            database: database.into(),
            collection: collection.into(),
            indexes: BTreeMap::new(),
            dirty: BTreeSet::new(),
            recovered: Vec::new(),
        }
    }

    /// Loads the persisted indexes of a collection.
    ///
    /// Any index that is missing, unreadable or possibly stale with respect
    /// to `documents` is rebuilt and re-persisted. Only I/O failures while
    /// reading are returned.
    pub fn open(
        backend: Arc<dyn StorageBackend>,
        database: &str,
        collection: &str,
        documents: &[Document],
        fingerprint: &Fingerprint,
    ) -> CoreResult<Self> {
        let mut manager = Self::new(backend, database, collection);

        let catalog_name = layout::catalog_artifact(collection);
        let (fields, catalog_problem) = match manager.backend.read(database, &catalog_name)? {
            Some(bytes) => match Catalog::decode(&bytes) {
                Ok(catalog) if &catalog.fingerprint == fingerprint => (catalog.fields, None),
                Ok(catalog) => (catalog.fields, Some(RecoveryReason::StaleCatalog)),
                Err(err) => (
                    manager.discover_fields()?,
                    Some(RecoveryReason::CorruptCatalog(err.to_string())),
                ),
            },
            None => (manager.discover_fields()?, Some(RecoveryReason::MissingCatalog)),
        };

        for field in fields {
            let reason = match &catalog_problem {
                Some(reason) => reason.clone(),
                None => match manager.load(&field)? {
                    Ok(index) => {
                        manager.indexes.insert(field, index);
                        continue;
                    }
                    Err(reason) => reason,
                },
            };

            if reason.is_corruption() {
                warn!(
                    database,
                    collection,
                    field = %field,
                    %reason,
                    "rebuilding index from documents"
                );
            } else {
                debug!(
                    database,
                    collection,
                    field = %field,
                    %reason,
                    "rebuilding index from documents"
                );
            }
            let index = FieldIndex::build(field.clone(), documents);
            manager.recovered.push(RecoveredIndex {
                field: field.clone(),
                reason,
            });
            manager.dirty.insert(field.clone());
            manager.indexes.insert(field, index);
        }

        if !manager.dirty.is_empty() {
            if let Err(err) = manager.sync(fingerprint) {
                warn!(database, collection, error = %err, "failed to persist rebuilt indexes");
            }
        }

        Ok(manager)
    }

    /// Reads one index artifact. The inner error says why it is unusable.
    fn load(&self, field: &str) -> CoreResult<Result<FieldIndex, RecoveryReason>> {
        let name = layout::index_artifact(&self.collection, field);
        let Some(bytes) = self.backend.read(&self.database, &name)? else {
            return Ok(Err(RecoveryReason::MissingArtifact));
        };
        Ok(match load_index(&bytes, field) {
            Ok(index) => Ok(index),
            Err(err) => Err(RecoveryReason::CorruptArtifact(err.to_string())),
        })
    }

    /// Finds indexed fields from the index artifacts present.
    fn discover_fields(&self) -> CoreResult<BTreeSet<String>> {
        Ok(self
            .backend
            .list(&self.database)?
            .iter()
            .filter_map(|name| layout::field_of_index(&self.collection, name))
            .map(str::to_string)
            .collect())
    }

    /// Returns the index on `field`, building, persisting and registering
    /// it if needed.
    ///
    /// Returns true if the index was created. If persisting fails the new
    /// index is discarded.
    pub fn ensure_index(
        &mut self,
        field: &str,
        documents: &[Document],
        fingerprint: &Fingerprint,
    ) -> CoreResult<bool> {
        if self.indexes.contains_key(field) {
            return Ok(false);
        }

        self.indexes
            .insert(field.to_string(), FieldIndex::build(field, documents));
        self.dirty.insert(field.to_string());

        if let Err(err) = self.sync(fingerprint) {
            self.indexes.remove(field);
            self.dirty.remove(field);
            return Err(err);
        }

        info!(
            database = %self.database,
            collection = %self.collection,
            field,
            "created index"
        );
        Ok(true)
    }

    /// Removes the index on `field` and its artifact.
    ///
    /// The catalog is rewritten without `field` before the artifact is
    /// removed, and is kept even when it lists no fields. A leftover
    /// artifact is then ignored on open, since artifacts are only scanned
    /// for when no catalog exists.
    ///
    /// Returns whether an index existed.
    pub fn drop_index(&mut self, field: &str, fingerprint: &Fingerprint) -> CoreResult<bool> {
        let Some(index) = self.indexes.remove(field) else {
            return Ok(false);
        };
        let was_dirty = self.dirty.remove(field);

        let persisted = if self.indexes.is_empty() {
            self.write_catalog(fingerprint)
        } else {
            self.sync(fingerprint)
        };
        if let Err(err) = persisted {
            self.indexes.insert(field.to_string(), index);
            if was_dirty {
                self.dirty.insert(field.to_string());
            }
            return Err(err);
        }

        let artifact = layout::index_artifact(&self.collection, field);
        if let Err(err) = self.backend.remove(&self.database, &artifact) {
            warn!(
                database = %self.database,
                collection = %self.collection,
                field,
                error = %err,
                "failed to remove index artifact"
            );
        }

        info!(
            database = %self.database,
            collection = %self.collection,
            field,
            "dropped index"
        );
        Ok(true)
    }

    /// Returns the indexed fields.
    #[must_use]
    pub fn list_indexed_fields(&self) -> BTreeSet<String> {
        self.indexes.keys().cloned().collect()
    }

    /// Returns true if `field` is indexed.
    #[must_use]
    pub fn is_indexed(&self, field: &str) -> bool {
        self.indexes.contains_key(field)
    }

    /// Returns the index on `field`, if any.
    #[must_use]
    pub fn index(&self, field: &str) -> Option<&FieldIndex> {
        self.indexes.get(field)
    }

    /// Looks up `value` in the index on `field`.
    ///
    /// Returns `None` if `field` is not indexed, which is distinct from an
    /// indexed field with no matching documents.
    #[must_use]
    pub fn find_ids_by_index(&self, field: &str, value: &Value) -> Option<BTreeSet<DocumentId>> {
        self.indexes.get(field).map(|index| index.lookup(value))
    }

    /// Indexes a newly inserted document.
    pub fn apply_insert(&mut self, document: &Document) {
        for (field, index) in &mut self.indexes {
            if let Some(value) = document.get(field) {
                index.record_insert(document.id(), value);
                self.dirty.insert(field.clone());
            }
        }
    }

    /// Moves a document from its old to its new image.
    pub fn apply_update(&mut self, old: &Document, new: &Document) {
        for (field, index) in &mut self.indexes {
            if index.record_update(new.id(), old.get(field), new.get(field)) {
                self.dirty.insert(field.clone());
            }
        }
    }

    /// Removes a deleted document using its last image.
    pub fn apply_delete(&mut self, document: &Document) {
        for (field, index) in &mut self.indexes {
            if let Some(value) = document.get(field) {
                if index.record_remove(document.id(), value) {
                    self.dirty.insert(field.clone());
                }
            }
        }
    }

    /// Rebuilds every index from `documents` and marks them dirty.
    pub fn rebuild(&mut self, documents: &[Document]) {
        for (field, index) in &mut self.indexes {
            *index = FieldIndex::build(field.clone(), documents);
            self.dirty.insert(field.clone());
        }
    }

    /// Persists dirty indexes, then the catalog.
    ///
    /// On failure the unwritten indexes stay dirty and the catalog keeps its
    /// previous fingerprint, so the next open rebuilds them.
    pub fn sync(&mut self, fingerprint: &Fingerprint) -> CoreResult<()> {
        if self.indexes.is_empty() {
            return Ok(());
        }

        let pending: Vec<String> = self.dirty.iter().cloned().collect();
        for field in pending {
            let Some(index) = self.indexes.get(&field) else {
                self.dirty.remove(&field);
                continue;
            };
            let name = layout::index_artifact(&self.collection, &field);
            self.backend
                .write(&self.database, &name, &persist_index(index)?)?;
            self.dirty.remove(&field);
        }

        self.write_catalog(fingerprint)
    }

    fn write_catalog(&self, fingerprint: &Fingerprint) -> CoreResult<()> {
        let catalog = Catalog::new(self.list_indexed_fields(), fingerprint.clone());
        self.backend.write(
            &self.database,
            &layout::catalog_artifact(&self.collection),
            &catalog.encode()?,
        )?;
        Ok(())
    }

    /// Returns true if some index has unpersisted changes.
    #[must_use]
    pub fn has_pending_changes(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Returns the indexes rebuilt when the collection opened.
    #[must_use]
    pub fn recovered(&self) -> &[RecoveredIndex] {
        &self.recovered
    }
}

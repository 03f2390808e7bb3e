//! Collections: named, persisted sequences of documents.
//!
//! Every mutation rewrites the whole documents artifact, then brings the
//! indexes up to date. In-memory state is only replaced once the artifact
//! write succeeded, so a storage fault leaves the collection as it was.

mod codec;

use crate::config::Config;
use crate::document::{Document, DocumentId, Fields, ID_FIELD};
use crate::error::{CoreError, CoreResult};
use crate::index::{Fingerprint, IndexManager, RecoveredIndex};
use crate::layout;
use crate::naming::validate_field_name;
use crate::query::{Filter, Update};
use codec::{decode_documents, encode_documents};
use digitool_storage::StorageBackend;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Counters of one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionStats {
    /// Number of documents.
    pub documents: usize,
    /// One entry per index, sorted by field.
    pub indexes: Vec<IndexStats>,
}

/// Counters of one index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// Indexed field.
    pub field: String,
    /// Distinct keys.
    pub keys: usize,
    /// Indexed documents.
    pub entries: usize,
}

struct CollectionState {
    documents: Vec<Document>,
    positions: HashMap<DocumentId, usize>,
    indexes: IndexManager,
    fingerprint: Fingerprint,
}

impl CollectionState {
    fn reindex_positions(&mut self) {
        self.positions = self
            .documents
            .iter()
            .enumerate()
            .map(|(position, doc)| (doc.id().clone(), position))
            .collect();
    }

    /// Positions of matching documents in storage order.
    fn matching(&self, filter: &Filter) -> Vec<usize> {
        let indexes = &self.indexes;
        let probe = filter.probe(|field| field == ID_FIELD || indexes.is_indexed(field));

        let candidates: Vec<usize> = match probe {
            Some((ID_FIELD, value)) => value
                .as_str()
                .and_then(|id| self.positions.get(id))
                .copied()
                .into_iter()
                .collect(),
            Some((field, value)) => {
                let ids = indexes.find_ids_by_index(field, value).unwrap_or_default();
                let mut positions: Vec<usize> = ids
                    .iter()
                    .filter_map(|id| self.positions.get(id).copied())
                    .collect();
                positions.sort_unstable();
                positions
            }
            None => (0..self.documents.len()).collect(),
        };

        candidates
            .into_iter()
            .filter(|&position| filter.matches(&self.documents[position]))
            .collect()
    }
}

/// A collection of documents within a database.
///
/// Handles are shared: the owning [`crate::Database`] hands out the same
/// `Arc<Collection>` for a name until the collection is dropped, after
/// which every operation on the old handle fails with
/// [`CoreError::Dropped`].
///
/// # Concurrency
///
/// Mutations hold the write lock across read, persist and reindex;
/// reads hold the read lock and never see a half-applied change.
pub struct Collection {
    database: String,
    name: String,
    backend: Arc<dyn StorageBackend>,
    pretty_json: bool,
    state: RwLock<CollectionState>,
    dropped: AtomicBool,
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("database", &self.database)
            .field("name", &self.name)
            .field("dropped", &self.dropped.load(Ordering::Acquire))
            .finish()
    }
}

impl Collection {
    /// Opens a collection, creating an empty documents artifact if `create`
    /// is set and none exists.
    ///
    /// The database namespace must already exist.
    pub(crate) fn open(
        backend: Arc<dyn StorageBackend>,
        config: &Config,
        database: &str,
        name: &str,
        create: bool,
    ) -> CoreResult<Self> {
        let artifact = layout::documents_artifact(name);
        let qualified = format!("{database}.{name}");

        let (documents, bytes) = match backend.read(database, &artifact)? {
            Some(bytes) => (decode_documents(&qualified, &bytes)?, bytes),
            None if create => {
                let bytes = encode_documents(&[], config.pretty_json)?;
                backend.write(database, &artifact, &bytes)?;
                (Vec::new(), bytes)
            }
            None => {
                return Err(CoreError::CollectionNotFound {
                    database: database.to_string(),
                    name: name.to_string(),
                })
            }
        };

        let fingerprint = Fingerprint::of(&bytes);
        let indexes = IndexManager::open(backend.clone(), database, name, &documents, &fingerprint)?;

        let mut state = CollectionState {
            documents,
            positions: HashMap::new(),
            indexes,
            fingerprint,
        };
        state.reindex_positions();

        debug!(
            database,
            collection = name,
            documents = state.documents.len(),
            "opened collection"
        );

        Ok(Self {
            database: database.to_string(),
            name: name.to_string(),
            backend,
            pretty_json: config.pretty_json,
            state: RwLock::new(state),
            dropped: AtomicBool::new(false),
        })
    }

    /// Returns the collection name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the name of the owning database.
    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Returns `database.collection`.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.database, self.name)
    }

    /// Returns true once the collection (or its database) was dropped.
    #[must_use]
    pub fn is_dropped(&self) -> bool {
        self.dropped.load(Ordering::Acquire)
    }

    fn ensure_live(&self) -> CoreResult<()> {
        if self.is_dropped() {
            return Err(CoreError::Dropped {
                what: "collection",
                name: self.qualified_name(),
            });
        }
        Ok(())
    }

    /// Writes the documents artifact and returns its fingerprint.
    fn persist(&self, documents: &[&Document]) -> CoreResult<Fingerprint> {
        let bytes = encode_documents(documents, self.pretty_json)?;
        self.backend.write(
            &self.database,
            &layout::documents_artifact(&self.name),
            &bytes,
        )?;
        Ok(Fingerprint::of(&bytes))
    }

    /// Persists dirty indexes. Failures are logged; the documents are
    /// already durable and the next open rebuilds what is missing.
    fn sync_indexes(&self, state: &mut CollectionState) {
        if let Err(err) = state.indexes.sync(&state.fingerprint) {
            warn!(
                database = %self.database,
                collection = %self.name,
                error = %err,
                "failed to persist indexes; they will be rebuilt on next open"
            );
        }
    }

    /// Inserts a document and returns its id.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidDocument`] if `_id` is not a non-empty string
    /// - [`CoreError::DuplicateId`] if the id is taken
    /// - a storage error if the artifact cannot be written
    pub fn insert(&self, fields: Fields) -> CoreResult<DocumentId> {
        Document::validate_new(&fields)?;

        let mut guard = self.state.write();
        self.ensure_live()?;
        let state = &mut *guard;

        let document = Document::new(fields);
        if state.positions.contains_key(document.id()) {
            return Err(CoreError::DuplicateId {
                collection: self.qualified_name(),
                id: document.id().to_string(),
            });
        }

        let mut view: Vec<&Document> = state.documents.iter().collect();
        view.push(&document);
        let fingerprint = self.persist(&view)?;

        let id = document.id().clone();
        state.indexes.apply_insert(&document);
        state.positions.insert(id.clone(), state.documents.len());
        state.documents.push(document);
        state.fingerprint = fingerprint;
        self.sync_indexes(state);

        debug!(database = %self.database, collection = %self.name, id = %id, "inserted document");
        Ok(id)
    }

    /// Returns the documents matching `query`, in storage order.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidQuery`] for malformed queries.
    pub fn find(&self, query: &Value) -> CoreResult<Vec<Document>> {
        let filter = Filter::parse(query)?;
        let state = self.state.read();
        self.ensure_live()?;

        Ok(state
            .matching(&filter)
            .into_iter()
            .map(|position| state.documents[position].clone())
            .collect())
    }

    /// Returns the number of documents matching `query`.
    pub fn count(&self, query: &Value) -> CoreResult<usize> {
        let filter = Filter::parse(query)?;
        let state = self.state.read();
        self.ensure_live()?;
        Ok(state.matching(&filter).len())
    }

    /// Returns the document with the given id.
    pub fn get(&self, id: &str) -> CoreResult<Option<Document>> {
        let state = self.state.read();
        self.ensure_live()?;
        Ok(state
            .positions
            .get(id)
            .map(|&position| state.documents[position].clone()))
    }

    /// Returns the number of documents.
    pub fn len(&self) -> CoreResult<usize> {
        let state = self.state.read();
        self.ensure_live()?;
        Ok(state.documents.len())
    }

    /// Returns true if the collection holds no documents.
    pub fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Returns document and index counters.
    pub fn stats(&self) -> CoreResult<CollectionStats> {
        let state = self.state.read();
        self.ensure_live()?;
        let indexes = state
            .indexes
            .list_indexed_fields()
            .into_iter()
            .filter_map(|field| {
                let index = state.indexes.index(&field)?;
                Some(IndexStats {
                    keys: index.key_count(),
                    entries: index.len(),
                    field,
                })
            })
            .collect();
        Ok(CollectionStats {
            documents: state.documents.len(),
            indexes,
        })
    }

    /// Applies `update` to every document matching `query`.
    ///
    /// Returns the number of matched documents; each of them is touched
    /// even if its fields end up unchanged.
    ///
    /// # Errors
    ///
    /// Returns a validation error for malformed queries or updates, or a
    /// storage error if the artifact cannot be written. Nothing changes
    /// on error.
    pub fn update(&self, query: &Value, update: &Value) -> CoreResult<usize> {
        let filter = Filter::parse(query)?;
        let update = Update::parse(update)?;

        let mut guard = self.state.write();
        self.ensure_live()?;
        let state = &mut *guard;

        let positions = state.matching(&filter);
        if positions.is_empty() {
            return Ok(0);
        }

        let mut updated = Vec::with_capacity(positions.len());
        for &position in &positions {
            let mut document = state.documents[position].clone();
            update.apply(&mut document)?;
            updated.push((position, document));
        }

        let mut view: Vec<&Document> = state.documents.iter().collect();
        for (position, document) in &updated {
            view[*position] = document;
        }
        let fingerprint = self.persist(&view)?;

        for (position, document) in updated {
            let old = std::mem::replace(&mut state.documents[position], document);
            state.indexes.apply_update(&old, &state.documents[position]);
        }
        state.fingerprint = fingerprint;
        self.sync_indexes(state);

        debug!(
            database = %self.database,
            collection = %self.name,
            count = positions.len(),
            "updated documents"
        );
        Ok(positions.len())
    }

    /// Deletes every document matching `query`; the empty query deletes
    /// all of them.
    ///
    /// Returns the number of deleted documents.
    pub fn delete(&self, query: &Value) -> CoreResult<usize> {
        let filter = Filter::parse(query)?;

        let mut guard = self.state.write();
        self.ensure_live()?;
        let state = &mut *guard;

        let positions = state.matching(&filter);
        if positions.is_empty() {
            return Ok(0);
        }

        let view: Vec<&Document> = state
            .documents
            .iter()
            .enumerate()
            .filter(|(position, _)| positions.binary_search(position).is_err())
            .map(|(_, document)| document)
            .collect();
        let fingerprint = self.persist(&view)?;

        let documents = std::mem::take(&mut state.documents);
        let mut kept = Vec::with_capacity(documents.len() - positions.len());
        for (position, document) in documents.into_iter().enumerate() {
            if positions.binary_search(&position).is_ok() {
                state.indexes.apply_delete(&document);
            } else {
                kept.push(document);
            }
        }
        state.documents = kept;
        state.reindex_positions();
        state.fingerprint = fingerprint;
        self.sync_indexes(state);

        debug!(
            database = %self.database,
            collection = %self.name,
            count = positions.len(),
            "deleted documents"
        );
        Ok(positions.len())
    }

    /// Creates an index on `field`. Returns true if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidName`] if `field` is not an identifier.
    pub fn create_index(&self, field: &str) -> CoreResult<bool> {
        validate_field_name(field)?;
        let mut guard = self.state.write();
        self.ensure_live()?;
        let state = &mut *guard;
        state
            .indexes
            .ensure_index(field, &state.documents, &state.fingerprint)
    }

    /// Drops the index on `field`. Returns whether one existed.
    pub fn drop_index(&self, field: &str) -> CoreResult<bool> {
        validate_field_name(field)?;
        let mut guard = self.state.write();
        self.ensure_live()?;
        let state = &mut *guard;
        state.indexes.drop_index(field, &state.fingerprint)
    }

    /// Returns the indexed fields.
    pub fn list_indices(&self) -> CoreResult<BTreeSet<String>> {
        let state = self.state.read();
        self.ensure_live()?;
        Ok(state.indexes.list_indexed_fields())
    }

    /// Returns the indexes that were rebuilt when this handle was opened.
    pub fn recovered_indexes(&self) -> CoreResult<Vec<RecoveredIndex>> {
        let state = self.state.read();
        self.ensure_live()?;
        Ok(state.indexes.recovered().to_vec())
    }

    /// Rebuilds every index from the documents and persists them.
    pub fn rebuild_indexes(&self) -> CoreResult<()> {
        let mut guard = self.state.write();
        self.ensure_live()?;
        let state = &mut *guard;
        state.indexes.rebuild(&state.documents);
        state.indexes.sync(&state.fingerprint)
    }

    /// Marks the handle dropped. Waits for in-flight operations.
    pub(crate) fn invalidate(&self) {
        let _guard = self.state.write();
        self.dropped.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use digitool_storage::InMemoryBackend;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn setup() -> (Arc<InMemoryBackend>, Collection) {
        let backend = Arc::new(InMemoryBackend::new());
        backend.create_namespace("shop").unwrap();
        let collection =
            Collection::open(backend.clone(), &Config::default(), "shop", "users", true).unwrap();
        (backend, collection)
    }

    fn reopen(backend: &Arc<InMemoryBackend>) -> Collection {
        Collection::open(backend.clone(), &Config::default(), "shop", "users", false).unwrap()
    }

    #[test]
    fn open_missing_without_create_fails() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.create_namespace("shop").unwrap();
        let err = Collection::open(backend, &Config::default(), "shop", "users", false);
        assert!(matches!(err, Err(CoreError::CollectionNotFound { .. })));
    }

    #[test]
    fn insert_and_get() {
        let (_, coll) = setup();
        let id = coll.insert(fields(json!({"name": "Alice"}))).unwrap();
        let doc = coll.get(id.as_str()).unwrap().unwrap();
        assert_eq!(doc.get("name"), Some(&json!("Alice")));
        assert_eq!(coll.len().unwrap(), 1);
    }

    #[test]
    fn duplicate_id_rejected() {
        let (_, coll) = setup();
        coll.insert(fields(json!({"_id": "u1"}))).unwrap();
        let err = coll.insert(fields(json!({"_id": "u1"}))).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateId { .. }));
        assert_eq!(coll.len().unwrap(), 1);
    }

    #[test]
    fn state_survives_reopen() {
        let (backend, coll) = setup();
        coll.insert(fields(json!({"_id": "a", "age": 30}))).unwrap();
        coll.insert(fields(json!({"_id": "b", "age": 25}))).unwrap();
        coll.create_index("age").unwrap();
        coll.update(&json!({"_id": "b"}), &json!({"$inc": {"age": 1}}))
            .unwrap();

        let reopened = reopen(&backend);
        assert!(reopened.recovered_indexes().unwrap().is_empty());
        let found = reopened.find(&json!({"age": 26})).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id().as_str(), "b");
    }

    #[test]
    fn index_probe_uses_id_positions() {
        let (_, coll) = setup();
        coll.insert(fields(json!({"_id": "a", "x": 1}))).unwrap();
        coll.insert(fields(json!({"_id": "b", "x": 1}))).unwrap();

        assert_eq!(coll.find(&json!({"_id": "b"})).unwrap().len(), 1);
        assert!(coll.find(&json!({"_id": "b", "x": 2})).unwrap().is_empty());
        assert!(coll.find(&json!({"_id": 7})).unwrap().is_empty());
    }

    #[test]
    fn delete_empty_query_removes_everything() {
        let (_, coll) = setup();
        for i in 0..3 {
            coll.insert(fields(json!({"i": i}))).unwrap();
        }
        assert_eq!(coll.delete(&json!({})).unwrap(), 3);
        assert!(coll.is_empty().unwrap());
    }

    #[test]
    fn delete_keeps_order_and_positions() {
        let (_, coll) = setup();
        for id in ["a", "b", "c", "d"] {
            coll.insert(fields(json!({"_id": id, "even": id == "b" || id == "d"})))
                .unwrap();
        }
        assert_eq!(coll.delete(&json!({"even": true})).unwrap(), 2);

        let ids: Vec<String> = coll
            .find(&json!({}))
            .unwrap()
            .iter()
            .map(|d| d.id().to_string())
            .collect();
        assert_eq!(ids, ["a", "c"]);
        assert!(coll.get("c").unwrap().is_some());
        assert!(coll.get("d").unwrap().is_none());
    }

    #[test]
    fn storage_fault_leaves_state_unchanged() {
        let (backend, coll) = setup();
        coll.insert(fields(json!({"_id": "a", "n": 1}))).unwrap();
        coll.create_index("n").unwrap();

        backend.fail_writes(true);
        assert!(coll.insert(fields(json!({"_id": "b"}))).is_err());
        assert!(coll.update(&json!({}), &json!({"$set": {"n": 2}})).is_err());
        assert!(coll.delete(&json!({})).is_err());
        backend.fail_writes(false);

        assert_eq!(coll.len().unwrap(), 1);
        assert_eq!(coll.find(&json!({"n": 1})).unwrap().len(), 1);
        assert!(coll.get("b").unwrap().is_none());
    }

    #[test]
    fn failed_update_changes_nothing() {
        let (_, coll) = setup();
        coll.insert(fields(json!({"_id": "b", "n": 1}))).unwrap();
        coll.insert(fields(json!({"_id": "a", "n": 1.7e308}))).unwrap();

        let err = coll
            .update(&json!({}), &json!({"$inc": {"n": 1.7e308}}))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidUpdate { .. }));
        assert_eq!(coll.get("b").unwrap().unwrap().get("n"), Some(&json!(1)));

        let err = coll.update(&json!({}), &json!({"$bogus": {}})).unwrap_err();
        assert!(matches!(err, CoreError::InvalidUpdate { .. }));
    }

    #[test]
    fn index_operations() {
        let (_, coll) = setup();
        assert!(coll.create_index("age").unwrap());
        assert!(!coll.create_index("age").unwrap());
        assert!(matches!(
            coll.create_index("a.b"),
            Err(CoreError::InvalidName { .. })
        ));
        assert_eq!(
            coll.list_indices().unwrap(),
            BTreeSet::from(["age".to_string()])
        );
        assert!(coll.drop_index("age").unwrap());
        assert!(!coll.drop_index("age").unwrap());
        assert!(coll.list_indices().unwrap().is_empty());
    }

    #[test]
    fn stats_count_documents_and_keys() {
        let (_, coll) = setup();
        for age in [30, 30, 25] {
            coll.insert(fields(json!({ "age": age }))).unwrap();
        }
        coll.insert(fields(json!({"name": "x"}))).unwrap();
        coll.create_index("age").unwrap();

        let stats = coll.stats().unwrap();
        assert_eq!(stats.documents, 4);
        assert_eq!(
            stats.indexes,
            vec![IndexStats {
                field: "age".into(),
                keys: 2,
                entries: 3,
            }]
        );
    }

    #[test]
    fn dropped_handle_fails() {
        let (_, coll) = setup();
        coll.invalidate();
        assert!(matches!(
            coll.find(&json!({})),
            Err(CoreError::Dropped { .. })
        ));
        assert!(matches!(
            coll.insert(Fields::new()),
            Err(CoreError::Dropped { .. })
        ));
    }

    #[test]
    fn corrupt_documents_artifact() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.create_namespace("shop").unwrap();
        backend.write("shop", "users.json", b"not json").unwrap();
        let err =
            Collection::open(backend, &Config::default(), "shop", "users", false).unwrap_err();
        assert!(matches!(err, CoreError::CorruptCollection { .. }));
    }
}

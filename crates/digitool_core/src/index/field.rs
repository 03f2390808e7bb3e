//! Single-field secondary index.

use crate::document::{Document, DocumentId};
use crate::index::IndexKey;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

/// Equality index over one document field.
///
/// Maps the [`IndexKey`] of a field value to the ids of the documents
/// currently holding that value. Documents without the field are not
/// indexed at all, so `null` and "absent" stay distinct.
///
/// # Invariants
///
/// - every indexed id appears in exactly one bucket
/// - no bucket is empty
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldIndex {
    /// Indexed field name.
    field: String,
    /// Key to document IDs mapping.
    entries: HashMap<IndexKey, BTreeSet<DocumentId>>,
    /// Total number of indexed ids.
    count: usize,
}

impl FieldIndex {
    /// Creates an empty index on `field`.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            entries: HashMap::new(),
            count: 0,
        }
    }

    /// Builds an index by scanning `documents`.
    pub fn build<'a, I>(field: impl Into<String>, documents: I) -> Self
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let mut index = Self::new(field);
        for document in documents {
            if let Some(value) = document.get(&index.field) {
                index.record_insert(document.id(), value);
            }
        }
        index
    }

    /// Restores an index from persisted buckets.
    pub(crate) fn from_entries<I>(field: impl Into<String>, entries: I) -> Self
    where
        I: IntoIterator<Item = (IndexKey, Vec<DocumentId>)>,
    {
        let mut index = Self::new(field);
        for (key, ids) in entries {
            for id in ids {
                index.insert_key(key.clone(), id);
            }
        }
        index
    }

    /// Returns the indexed field.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Returns the ids holding `value`, or an empty set.
    #[must_use]
    pub fn lookup(&self, value: &Value) -> BTreeSet<DocumentId> {
        self.entries
            .get(&IndexKey::of(value))
            .cloned()
            .unwrap_or_default()
    }

    /// Records that document `id` now holds `value`.
    pub fn record_insert(&mut self, id: &DocumentId, value: &Value) {
        self.insert_key(IndexKey::of(value), id.clone());
    }

    /// Records that document `id` no longer holds `value`.
    ///
    /// Returns whether the id was indexed under that value.
    pub fn record_remove(&mut self, id: &DocumentId, value: &Value) -> bool {
        let key = IndexKey::of(value);
        let Some(ids) = self.entries.get_mut(&key) else {
            return false;
        };
        if !ids.remove(id) {
            return false;
        }
        self.count -= 1;
        if ids.is_empty() {
            self.entries.remove(&key);
        }
        true
    }

    /// Moves document `id` from `old` to `new`. Either side may be absent.
    ///
    /// Returns whether the index changed; equal keys are a no-op.
    pub fn record_update(
        &mut self,
        id: &DocumentId,
        old: Option<&Value>,
        new: Option<&Value>,
    ) -> bool {
        match (old, new) {
            (None, None) => false,
            (Some(old), Some(new)) if IndexKey::of(old) == IndexKey::of(new) => false,
            (old, new) => {
                if let Some(old) = old {
                    self.record_remove(id, old);
                }
                if let Some(new) = new {
                    self.record_insert(id, new);
                }
                true
            }
        }
    }

    /// Returns the number of indexed ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns true if no document is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns the number of distinct keys.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.entries.len()
    }

    /// Iterates over the buckets in no particular order.
    pub fn entries(&self) -> impl Iterator<Item = (&IndexKey, &BTreeSet<DocumentId>)> {
        self.entries.iter()
    }

    fn insert_key(&mut self, key: IndexKey, id: DocumentId) {
        if self.entries.entry(key).or_default().insert(id) {
            self.count += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => Document::new(map),
            _ => panic!("not an object"),
        }
    }

    fn id(s: &str) -> DocumentId {
        DocumentId::from(s)
    }

    #[test]
    fn build_skips_documents_without_field() {
        let docs = vec![
            doc(json!({"_id": "a", "age": 30})),
            doc(json!({"_id": "b", "age": 30.0})),
            doc(json!({"_id": "c", "age": null})),
            doc(json!({"_id": "d"})),
        ];
        let index = FieldIndex::build("age", &docs);

        assert_eq!(index.len(), 3);
        assert_eq!(index.key_count(), 2);
        assert_eq!(
            index.lookup(&json!(30)),
            [id("a"), id("b")].into_iter().collect()
        );
        assert_eq!(index.lookup(&json!(null)), [id("c")].into_iter().collect());
    }

    #[test]
    fn lookup_missing_is_empty() {
        let index = FieldIndex::new("age");
        assert!(index.lookup(&json!(1)).is_empty());
        assert!(index.is_empty());
    }

    #[test]
    fn remove_last_member_deletes_bucket() {
        let mut index = FieldIndex::new("age");
        index.record_insert(&id("a"), &json!(1));
        index.record_insert(&id("b"), &json!(1));

        assert!(index.record_remove(&id("a"), &json!(1)));
        assert_eq!(index.key_count(), 1);
        assert!(index.record_remove(&id("b"), &json!(1)));
        assert_eq!(index.key_count(), 0);
        assert!(!index.record_remove(&id("b"), &json!(1)));
    }

    #[test]
    fn update_moves_between_buckets() {
        let mut index = FieldIndex::new("age");
        index.record_insert(&id("a"), &json!(30));

        assert!(!index.record_update(&id("a"), Some(&json!(30)), Some(&json!(30.0))));
        assert!(index.record_update(&id("a"), Some(&json!(30)), Some(&json!(31))));
        assert!(index.lookup(&json!(30)).is_empty());
        assert_eq!(index.lookup(&json!(31)).len(), 1);

        assert!(index.record_update(&id("a"), Some(&json!(31)), None));
        assert!(index.is_empty());
        assert!(index.record_update(&id("a"), None, Some(&json!("x"))));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn from_entries_restores_counts() {
        let index = FieldIndex::from_entries(
            "age",
            vec![(IndexKey::of(&json!(1)), vec![id("a"), id("b")])],
        );
        assert_eq!(index.len(), 2);
        assert_eq!(index.field(), "age");
    }
}

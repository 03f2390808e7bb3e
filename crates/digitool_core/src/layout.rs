//! Artifact naming inside a database namespace.
//!
//! ```text
//! <database>/
//! ├─ <collection>.json          # JSON array of documents
//! ├─ <collection>.indexes.json  # index catalog
//! └─ <collection>.<field>.idx   # one CBOR artifact per index
//! ```
//!
//! Collection and field names are identifiers (no dots), so the stem
//! before the first dot always names the owning collection.

const DOCUMENTS_SUFFIX: &str = ".json";
const CATALOG_SUFFIX: &str = ".indexes.json";
const INDEX_SUFFIX: &str = ".idx";

/// Name of the artifact holding a collection's documents.
#[must_use]
pub fn documents_artifact(collection: &str) -> String {
    format!("{collection}{DOCUMENTS_SUFFIX}")
}

/// Name of the artifact holding a collection's index catalog.
#[must_use]
pub fn catalog_artifact(collection: &str) -> String {
    format!("{collection}{CATALOG_SUFFIX}")
}

/// Name of the artifact holding one index of a collection.
#[must_use]
pub fn index_artifact(collection: &str, field: &str) -> String {
    format!("{collection}.{field}{INDEX_SUFFIX}")
}

/// Returns the collection name if `artifact` is a documents artifact.
#[must_use]
pub fn collection_of_documents(artifact: &str) -> Option<&str> {
    artifact
        .strip_suffix(DOCUMENTS_SUFFIX)
        .filter(|stem| !stem.contains('.'))
}

/// Returns the indexed field if `artifact` is an index artifact of
/// `collection`.
#[must_use]
pub fn field_of_index<'a>(collection: &str, artifact: &'a str) -> Option<&'a str> {
    artifact
        .strip_prefix(collection)?
        .strip_prefix('.')?
        .strip_suffix(INDEX_SUFFIX)
        .filter(|field| !field.contains('.'))
}

/// Returns true if `artifact` belongs to `collection`.
#[must_use]
pub fn belongs_to(collection: &str, artifact: &str) -> bool {
    artifact
        .split_once('.')
        .is_some_and(|(stem, rest)| stem == collection && !rest.is_empty())
}

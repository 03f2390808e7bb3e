//! # Digitool Core
//!
//! Storage and indexing engine for DigitoolDB, a document store for JSON
//! documents.
//!
//! ## Model
//!
//! - A [`Store`] owns a data directory and holds [`Database`]s
//! - A [`Database`] holds named [`Collection`]s
//! - A [`Collection`] holds [`Document`]s and their secondary indexes
//!
//! ## Guarantees
//!
//! - Every stored document carries `_id`, `_created_at` and `_updated_at`
//! - A mutation that fails to persist leaves the collection unchanged
//! - Indexes always reflect the persisted documents; a missing, corrupt or
//!   stale index is rebuilt from documents when its collection opens
//! - Queries return the same documents with or without an index
//!
//! ## Example
//!
//! ```rust
//! use digitool_core::Store;
//! use serde_json::json;
//!
//! let store = Store::open_in_memory();
//! let users = store.database("shop").unwrap().collection("users").unwrap();
//!
//! let doc = json!({"name": "Alice", "age": 30});
//! let id = users.insert(doc.as_object().unwrap().clone()).unwrap();
//!
//! users.create_index("age").unwrap();
//! let found = users.find(&json!({"age": 30})).unwrap();
//! assert_eq!(found[0].id(), &id);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collection;
mod config;
mod database;
mod dir;
mod document;
mod error;
mod index;
mod layout;
mod naming;
mod query;
mod request;
mod store;
mod value;

pub use collection::{Collection, CollectionStats, IndexStats};
pub use config::Config;
pub use database::Database;
pub use dir::DataDir;
pub use document::{
    is_reserved, Document, DocumentId, Fields, CREATED_AT_FIELD, ID_FIELD, RESERVED_FIELDS,
    UPDATED_AT_FIELD,
};
pub use error::{CoreError, CoreResult, ErrorKind};
pub use index::{
    load_index, persist_index, Catalog, FieldIndex, Fingerprint, IndexKey, IndexManager,
    RecoveredIndex, RecoveryReason,
};
pub use naming::{
    is_valid_identifier, validate_collection_name, validate_database_name, validate_field_name,
};
pub use query::{Clause, CmpOp, Condition, Filter, Update};
pub use request::{Reply, Request, Response};
pub use store::Store;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

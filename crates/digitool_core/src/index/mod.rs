//! Secondary indexes.
//!
//! Indexes are equality access paths over a single field. They are:
//! - Declared per collection by field name
//! - Maintained on every insert, update and delete
//! - Fully derivable from the collection's documents
//!
//! # Warning
//!
//! A persisted index is a cache. When an index file or the catalog is
//! missing, unreadable or out of date, the index is rebuilt from documents
//! instead of reporting an error.

mod catalog;
mod field;
mod key;
mod manager;
mod persistence;

pub use catalog::{Catalog, Fingerprint};
pub use field::FieldIndex;
pub use key::IndexKey;
pub use manager::{IndexManager, RecoveredIndex, RecoveryReason};
pub use persistence::{load_index, persist_index};

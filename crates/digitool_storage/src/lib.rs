//! # Digitool Storage
//!
//! Artifact storage backends for DigitoolDB.
//!
//! This crate provides the lowest-level storage abstraction for DigitoolDB.
//! Backends store **opaque artifacts**: whole byte blobs addressed by a
//! namespace (a database) and a name (a file within it). They do not
//! interpret what they store.
//!
//! ## Design Principles
//!
//! - An artifact is always replaced as a whole, never patched in place
//! - Replacement is atomic: readers see the old bytes or the new bytes
//! - No knowledge of documents, indexes or catalogs
//! - Must be `Send + Sync` for concurrent access
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral storage
//! - [`FileBackend`] - For persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use digitool_storage::{StorageBackend, InMemoryBackend};
//!
//! let backend = InMemoryBackend::new();
//! backend.create_namespace("shop").unwrap();
//! backend.write("shop", "users.json", b"[]").unwrap();
//! assert_eq!(backend.read("shop", "users.json").unwrap(), Some(b"[]".to_vec()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::{validate_component, StorageBackend};
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;

//! Index persistence for saving/loading indexes to/from storage.
//!
//! Persisted indexes only spare the scan on open; they are never the
//! source of truth.
//!
//! ## Format
//!
//! ```text
//! IndexFile {
//!     magic: [0x44, 0x49, 0x44, 0x58]  // "DIDX"
//!     version: u8
//!     body: CBOR {
//!         field: String
//!         entries: [(key, [document_id])]
//!     }
//! }
//! ```
//!
//! ## Invariants
//!
//! - Index state **MUST** be derivable from the collection's documents
//! - Corruption in an index file triggers a rebuild, not an error

use crate::document::DocumentId;
use crate::error::{CoreError, CoreResult};
use crate::index::{FieldIndex, IndexKey};
use serde::{Deserialize, Serialize};
use std::io;

/// Magic bytes for index files: "DIDX"
const INDEX_MAGIC: [u8; 4] = *b"DIDX";

/// Current index file format version.
const INDEX_VERSION: u8 = 2;

const HEADER_LEN: usize = INDEX_MAGIC.len() + 1;

#[derive(Serialize, Deserialize)]
struct IndexBody {
    field: String,
    entries: Vec<(IndexKey, Vec<DocumentId>)>,
}

/// Serializes an index.
///
/// Buckets are written in key order so equal indexes encode identically.
pub fn persist_index(index: &FieldIndex) -> CoreResult<Vec<u8>> {
    let mut entries: Vec<(IndexKey, Vec<DocumentId>)> = index
        .entries()
        .map(|(key, ids)| (key.clone(), ids.iter().cloned().collect()))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let body = IndexBody {
        field: index.field().to_string(),
        entries,
    };

    let mut buf = Vec::with_capacity(HEADER_LEN + 64);
    buf.extend_from_slice(&INDEX_MAGIC);
    buf.push(INDEX_VERSION);
    ciborium::into_writer(&body, &mut buf)
        .map_err(|e| CoreError::Io(io::Error::other(e.to_string())))?;
    Ok(buf)
}

/// Loads an index, checking that it belongs to `field`.
///
/// # Errors
///
/// Returns [`CoreError::IndexCorruption`] on bad magic, unknown version,
/// undecodable body or a field mismatch.
pub fn load_index(data: &[u8], field: &str) -> CoreResult<FieldIndex> {
    if data.len() < HEADER_LEN {
        return Err(CoreError::index_corruption("index file too small"));
    }
    if data[..INDEX_MAGIC.len()] != INDEX_MAGIC {
        return Err(CoreError::index_corruption("invalid index file magic"));
    }
    let version = data[INDEX_MAGIC.len()];
    if version != INDEX_VERSION {
        return Err(CoreError::index_corruption(format!(
            "unsupported index version: {version}"
        )));
    }

    let body: IndexBody = ciborium::from_reader(&data[HEADER_LEN..])
        .map_err(|e| CoreError::index_corruption(format!("undecodable index body: {e}")))?;

    if body.field != field {
        return Err(CoreError::index_corruption(format!(
            "index file holds field {:?}, expected {field:?}",
            body.field
        )));
    }

    Ok(FieldIndex::from_entries(body.field, body.entries))
}

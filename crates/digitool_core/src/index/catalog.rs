//! Per-collection index catalog.
//!
//! The catalog lists the indexed fields of a collection and the fingerprint
//! of the document artifact its index files were last synced with. It is
//! written after the index files, so a catalog whose fingerprint differs
//! from the current documents means the indexes may be stale.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt::{self, Write};

/// Current catalog format version.
const CATALOG_VERSION: u32 = 1;

/// SHA-256 digest of a document artifact, hex encoded.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprints artifact bytes.
    #[must_use]
    pub fn of(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest {
            let _ = write!(hex, "{byte:02x}");
        }
        Self(hex)
    }

    /// Returns the hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.0.get(..12).unwrap_or(&self.0))
    }
}

/// Persisted index catalog of one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    /// Format version.
    pub version: u32,
    /// Indexed fields.
    pub fields: BTreeSet<String>,
    /// Fingerprint of the documents the index files match.
    pub fingerprint: Fingerprint,
}

impl Catalog {
    /// Creates a catalog for the current format version.
    #[must_use]
    pub fn new(fields: BTreeSet<String>, fingerprint: Fingerprint) -> Self {
        Self {
            version: CATALOG_VERSION,
            fields,
            fingerprint,
        }
    }

    /// Serializes the catalog as JSON.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| CoreError::Io(std::io::Error::other(e.to_string())))
    }

    /// Parses a catalog.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IndexCorruption`] if the bytes are not a
    /// catalog of the current version.
    pub fn decode(bytes: &[u8]) -> CoreResult<Self> {
        let catalog: Catalog = serde_json::from_slice(bytes)
            .map_err(|e| CoreError::index_corruption(format!("undecodable index catalog: {e}")))?;
        if catalog.version != CATALOG_VERSION {
            return Err(CoreError::index_corruption(format!(
                "unsupported index catalog version: {}",
                catalog.version
            )));
        }
        Ok(catalog)
    }
}

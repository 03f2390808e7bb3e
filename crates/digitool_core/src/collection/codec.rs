//! Encoding of the documents artifact.
//!
//! The artifact is a JSON array of document objects in storage order.

use crate::document::{Document, Fields};
use crate::error::{CoreError, CoreResult};
use std::collections::HashSet;

/// Encodes documents as a JSON array.
pub(crate) fn encode_documents(documents: &[&Document], pretty: bool) -> CoreResult<Vec<u8>> {
    let encoded = if pretty {
        serde_json::to_vec_pretty(documents)
    } else {
        serde_json::to_vec(documents)
    };
    encoded.map_err(|e| CoreError::Io(std::io::Error::other(e.to_string())))
}

/// Decodes a documents artifact.
///
/// An empty or whitespace-only artifact holds no documents.
///
/// # Errors
///
/// Returns [`CoreError::CorruptCollection`] if the bytes are not a JSON
/// array of well-formed documents with distinct ids.
pub(crate) fn decode_documents(collection: &str, bytes: &[u8]) -> CoreResult<Vec<Document>> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    let raw: Vec<Fields> = serde_json::from_slice(bytes)
        .map_err(|e| CoreError::corrupt_collection(collection, e.to_string()))?;

    let mut seen = HashSet::with_capacity(raw.len());
    let mut documents = Vec::with_capacity(raw.len());
    for (position, fields) in raw.into_iter().enumerate() {
        let document = Document::from_stored(fields).map_err(|e| {
            CoreError::corrupt_collection(collection, format!("document {position}: {e}"))
        })?;
        if !seen.insert(document.id().clone()) {
            return Err(CoreError::corrupt_collection(
                collection,
                format!("duplicate _id {}", document.id()),
            ));
        }
        documents.push(document);
    }
    Ok(documents)
}

//! Documents and their reserved system fields.
//!
//! A document is a JSON object. Three fields are reserved and maintained
//! by the store:
//!
//! - `_id`: unique within the collection, immutable once assigned
//! - `_created_at`: RFC 3339 UTC timestamp, set once at insert
//! - `_updated_at`: RFC 3339 UTC timestamp, refreshed on every mutation

mod id;

pub use id::DocumentId;

use crate::error::{CoreError, CoreResult};
use chrono::{SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// Field-name to value mapping of a document.
pub type Fields = Map<String, Value>;

/// Identity field.
pub const ID_FIELD: &str = "_id";
/// Creation timestamp field.
pub const CREATED_AT_FIELD: &str = "_created_at";
/// Last-modification timestamp field.
pub const UPDATED_AT_FIELD: &str = "_updated_at";
/// All fields maintained by the store.
pub const RESERVED_FIELDS: [&str; 3] = [ID_FIELD, CREATED_AT_FIELD, UPDATED_AT_FIELD];

/// Returns true if `field` is maintained by the store.
#[must_use]
pub fn is_reserved(field: &str) -> bool {
    RESERVED_FIELDS.contains(&field)
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// One stored record: user fields plus the reserved system fields.
///
/// # Invariants
///
/// - `_id`, `_created_at` and `_updated_at` are always present
/// - the cached [`DocumentId`] equals the `_id` field
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    id: DocumentId,
    fields: Fields,
}

impl Document {
    /// Creates a document for insertion.
    ///
    /// Keeps a caller-supplied string `_id`, generates one otherwise, and
    /// stamps both timestamps with the current time.
    #[must_use]
    pub fn new(mut fields: Fields) -> Self {
        let id = match fields.get(ID_FIELD) {
            Some(Value::String(id)) if !id.is_empty() => DocumentId::new(id.as_str()),
            _ => {
                let id = DocumentId::generate();
                fields.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
                id
            }
        };

        let now = now_timestamp();
        fields.insert(CREATED_AT_FIELD.to_string(), Value::String(now.clone()));
        fields.insert(UPDATED_AT_FIELD.to_string(), Value::String(now));

        Self { id, fields }
    }

    /// Checks that caller-supplied fields can be turned into a document.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidDocument`] if `_id` is present but not a
    /// non-empty string.
    pub fn validate_new(fields: &Fields) -> CoreResult<()> {
        match fields.get(ID_FIELD) {
            None => Ok(()),
            Some(Value::String(id)) if !id.is_empty() => Ok(()),
            Some(other) => Err(CoreError::invalid_document(format!(
                "_id must be a non-empty string, got {other}"
            ))),
        }
    }

    /// Rebuilds a document read back from storage.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidDocument`] if a reserved field is missing
    /// or not a string.
    pub fn from_stored(fields: Fields) -> CoreResult<Self> {
        let reserved = |field: &str| match fields.get(field) {
            Some(Value::String(s)) if !s.is_empty() => Ok(s.as_str()),
            Some(_) => Err(CoreError::invalid_document(format!(
                "reserved field {field} is not a non-empty string"
            ))),
            None => Err(CoreError::invalid_document(format!(
                "reserved field {field} is missing"
            ))),
        };

        let id = DocumentId::new(reserved(ID_FIELD)?);
        reserved(CREATED_AT_FIELD)?;
        reserved(UPDATED_AT_FIELD)?;
        Ok(Self { id, fields })
    }

    /// Returns the document ID.
    #[must_use]
    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    /// Returns the value of a field, if present.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns all fields, reserved ones included.
    #[must_use]
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> Option<&str> {
        self.fields.get(CREATED_AT_FIELD).and_then(Value::as_str)
    }

    /// Returns the last-modification timestamp.
    #[must_use]
    pub fn updated_at(&self) -> Option<&str> {
        self.fields.get(UPDATED_AT_FIELD).and_then(Value::as_str)
    }

    /// Refreshes `_updated_at`.
    pub fn touch(&mut self) {
        self.fields
            .insert(UPDATED_AT_FIELD.to_string(), Value::String(now_timestamp()));
    }

    /// Sets a user field. Reserved fields are never overwritten.
    pub(crate) fn set(&mut self, field: &str, value: Value) {
        if !is_reserved(field) {
            self.fields.insert(field.to_string(), value);
        }
    }

    /// Replaces every user field with `replacement`, keeping the reserved
    /// fields. Reserved keys inside `replacement` are ignored.
    pub(crate) fn replace_user_fields(&mut self, replacement: &Fields) {
        let mut fields: Fields = replacement
            .iter()
            .filter(|(field, _)| !is_reserved(field))
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect();
        for field in RESERVED_FIELDS {
            if let Some(value) = self.fields.get(field) {
                fields.insert(field.to_string(), value.clone());
            }
        }
        self.fields = fields;
    }

    /// Consumes the document and returns its fields.
    #[must_use]
    pub fn into_fields(self) -> Fields {
        self.fields
    }

    /// Returns the document as a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

impl From<Document> for Value {
    fn from(document: Document) -> Self {
        Value::Object(document.fields)
    }
}

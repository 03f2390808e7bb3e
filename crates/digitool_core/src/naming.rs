//! Identifier validation for databases, collections and indexed fields.

use crate::dir::LOCK_FILE;
use crate::error::{CoreError, CoreResult};

/// Returns true if `name` is a non-empty string of ASCII letters, digits
/// and underscore.
#[must_use]
pub fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Validates a database name.
///
/// Databases live next to the data directory's lock file, so its name is
/// reserved in any letter case.
///
/// # Errors
///
/// Returns [`CoreError::InvalidName`] if the name is not an identifier or
/// is reserved.
pub fn validate_database_name(name: &str) -> CoreResult<()> {
    if name.eq_ignore_ascii_case(LOCK_FILE) {
        return Err(CoreError::invalid_name("database", name));
    }
    validate("database", name)
}

/// Validates a collection name.
///
/// # Errors
///
/// Returns [`CoreError::InvalidName`] if the name is not an identifier.
pub fn validate_collection_name(name: &str) -> CoreResult<()> {
    validate("collection", name)
}

/// Validates the name of a field that is to be indexed.
///
/// Index artifacts embed the field name in their file name, so indexed
/// fields follow the same identifier rules as collections.
///
/// # Errors
///
/// Returns [`CoreError::InvalidName`] if the name is not an identifier.
pub fn validate_field_name(name: &str) -> CoreResult<()> {
    validate("field", name)
}

fn validate(what: &'static str, name: &str) -> CoreResult<()> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(CoreError::invalid_name(what, name))
    }
}

//! Update documents.

use crate::document::{is_reserved, Document, Fields};
use crate::error::{CoreError, CoreResult};
use serde_json::{Number, Value};

/// A parsed update.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// `{$set: {field: value}}` overwrites the listed fields.
    Set(Fields),
    /// `{$inc: {field: delta}}` adds to numeric fields.
    Inc(Vec<(String, Number)>),
    /// Any other object replaces every non-reserved field.
    Replace(Fields),
}

impl Update {
    /// Parses an update document.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidUpdate`] for non-objects, several
    /// operators, operators next to plain fields, unknown operators,
    /// non-object operands, non-numeric `$inc` deltas, and `$set`/`$inc`
    /// on reserved fields.
    pub fn parse(update: &Value) -> CoreResult<Self> {
        let Value::Object(map) = update else {
            return Err(CoreError::invalid_update(format!(
                "update must be an object, got {update}"
            )));
        };

        let operators = map.keys().filter(|key| key.starts_with('$')).count();
        if operators == 0 {
            return Ok(Update::Replace(map.clone()));
        }
        if map.len() > 1 {
            return Err(CoreError::invalid_update(
                "an update takes exactly one operator and no plain fields",
            ));
        }

        let Some((op, operand)) = map.iter().next() else {
            return Ok(Update::Replace(Fields::new()));
        };
        let Value::Object(fields) = operand else {
            return Err(CoreError::invalid_update(format!(
                "{op} needs an object operand"
            )));
        };
        if let Some(field) = fields.keys().find(|field| is_reserved(field)) {
            return Err(CoreError::invalid_update(format!(
                "{op} cannot modify reserved field {field}"
            )));
        }

        match op.as_str() {
            "$set" => Ok(Update::Set(fields.clone())),
            "$inc" => fields
                .iter()
                .map(|(field, delta)| match delta {
                    Value::Number(n) => Ok((field.clone(), n.clone())),
                    other => Err(CoreError::invalid_update(format!(
                        "$inc delta for {field} must be a number, got {other}"
                    ))),
                })
                .collect::<CoreResult<Vec<_>>>()
                .map(Update::Inc),
            unknown => Err(CoreError::invalid_update(format!(
                "unknown update operator {unknown}"
            ))),
        }
    }

    /// Applies the update to a document and refreshes `_updated_at`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidUpdate`] if an increment leaves the
    /// finite number range.
    pub fn apply(&self, document: &mut Document) -> CoreResult<()> {
        match self {
            Update::Set(fields) => {
                for (field, value) in fields {
                    document.set(field, value.clone());
                }
            }
            Update::Inc(deltas) => {
                for (field, delta) in deltas {
                    let next = match document.get(field) {
                        Some(Value::Number(current)) => add(current, delta).ok_or_else(|| {
                            CoreError::invalid_update(format!("$inc on {field} overflows"))
                        })?,
                        _ => delta.clone(),
                    };
                    document.set(field, Value::Number(next));
                }
            }
            Update::Replace(fields) => document.replace_user_fields(fields),
        }
        document.touch();
        Ok(())
    }
}

/// Integer addition when both sides are integers and it does not
/// overflow, float addition otherwise.
fn add(a: &Number, b: &Number) -> Option<Number> {
    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        if let Some(sum) = a.checked_add(b) {
            return Some(Number::from(sum));
        }
    }
    Number::from_f64(a.as_f64()? + b.as_f64()?)
}

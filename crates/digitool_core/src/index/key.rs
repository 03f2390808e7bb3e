//! Canonical index keys.

use crate::value::Num;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Write};

/// Normalized form of a field value, used as an index bucket key.
///
/// The encoding is total and deterministic:
///
/// - `null`, `true`, `false` as literals
/// - numbers in canonical form, so `30` and `30.0` share a key
/// - strings as JSON string literals, so `"1"` and `1` differ
/// - arrays element by element in order
/// - objects with keys sorted
///
/// Two values share a key exactly when [`crate::value::equal`] holds.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexKey(String);

impl IndexKey {
    /// Normalizes a value.
    #[must_use]
    pub fn of(value: &Value) -> Self {
        let mut out = String::new();
        encode(value, &mut out);
        Self(out)
    }

    /// Returns the encoded key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IndexKey({})", self.0)
    }
}

fn encode(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&Num::of(n).canonical()),
        Value::String(_) => {
            let _ = write!(out, "{value}");
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                encode(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                let _ = write!(out, "{}:", Value::String(key.clone()));
                encode(item, out);
            }
            out.push('}');
        }
    }
}

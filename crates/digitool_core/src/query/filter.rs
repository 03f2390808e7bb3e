//! Query documents.

use crate::document::Document;
use crate::error::{CoreError, CoreResult};
use crate::value;
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Ordering operator of a comparison clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// `$lt`
    Lt,
    /// `$lte`
    Lte,
    /// `$gt`
    Gt,
    /// `$gte`
    Gte,
}

impl CmpOp {
    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            CmpOp::Lt => ordering == Ordering::Less,
            CmpOp::Lte => ordering != Ordering::Greater,
            CmpOp::Gt => ordering == Ordering::Greater,
            CmpOp::Gte => ordering != Ordering::Less,
        }
    }
}

/// Test applied to one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `field: value` or `{$eq: value}`
    Eq(Value),
    /// `{$ne: value}`
    Ne(Value),
    /// `{$lt | $lte | $gt | $gte: value}`
    Cmp(CmpOp, Value),
    /// `{$in: [values]}`
    In(Vec<Value>),
}

impl Condition {
    fn matches(&self, actual: &Value) -> bool {
        match self {
            Condition::Eq(expected) => value::equal(actual, expected),
            Condition::Ne(expected) => !value::equal(actual, expected),
            Condition::Cmp(op, bound) => {
                value::compare(actual, bound).is_some_and(|ordering| op.accepts(ordering))
            }
            Condition::In(candidates) => candidates.iter().any(|c| value::equal(actual, c)),
        }
    }
}

/// One field condition of a query.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    /// Field the condition applies to.
    pub field: String,
    /// The condition.
    pub condition: Condition,
}

/// A parsed query: a conjunction of field clauses.
///
/// A document lacking a clause's field never satisfies that clause, so
/// `{"a": null}` matches only documents holding an explicit `null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    /// A filter matching every document.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Parses a query document. `null` is treated as the empty query.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidQuery`] if the query is not an object,
    /// uses a top-level `$` key, mixes operators with plain keys in one
    /// field, or uses an unknown operator.
    pub fn parse(query: &Value) -> CoreResult<Self> {
        let map = match query {
            Value::Null => return Ok(Self::all()),
            Value::Object(map) => map,
            other => {
                return Err(CoreError::invalid_query(format!(
                    "query must be an object, got {other}"
                )))
            }
        };

        let mut clauses = Vec::with_capacity(map.len());
        for (field, criterion) in map {
            if field.starts_with('$') {
                return Err(CoreError::invalid_query(format!(
                    "unsupported top-level operator {field}"
                )));
            }
            match operator_object(field, criterion)? {
                Some(operators) => {
                    for (op, operand) in operators {
                        clauses.push(Clause {
                            field: field.clone(),
                            condition: parse_operator(field, op, operand)?,
                        });
                    }
                }
                None => clauses.push(Clause {
                    field: field.clone(),
                    condition: Condition::Eq(criterion.clone()),
                }),
            }
        }
        Ok(Self { clauses })
    }

    /// Returns the clauses in query order.
    #[must_use]
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Returns true if the filter matches everything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Evaluates the filter against a document.
    #[must_use]
    pub fn matches(&self, document: &Document) -> bool {
        self.clauses.iter().all(|clause| {
            document
                .get(&clause.field)
                .is_some_and(|actual| clause.condition.matches(actual))
        })
    }

    /// Returns the first equality clause whose field passes `usable`.
    ///
    /// Used to pick the single access path that narrows candidates.
    pub fn probe(&self, usable: impl Fn(&str) -> bool) -> Option<(&str, &Value)> {
        self.clauses.iter().find_map(|clause| match &clause.condition {
            Condition::Eq(value) if usable(&clause.field) => Some((clause.field.as_str(), value)),
            _ => None,
        })
    }
}

/// Returns the operator map if `criterion` is an operator object.
fn operator_object<'a>(field: &str, criterion: &'a Value) -> CoreResult<Option<&'a Map<String, Value>>> {
    let Value::Object(map) = criterion else {
        return Ok(None);
    };
    let operators = map.keys().filter(|key| key.starts_with('$')).count();
    if operators == 0 {
        return Ok(None);
    }
    if operators != map.len() {
        return Err(CoreError::invalid_query(format!(
            "condition on {field} mixes operators and fields"
        )));
    }
    Ok(Some(map))
}

fn parse_operator(field: &str, op: &str, operand: &Value) -> CoreResult<Condition> {
    Ok(match op {
        "$eq" => Condition::Eq(operand.clone()),
        "$ne" => Condition::Ne(operand.clone()),
        "$lt" => Condition::Cmp(CmpOp::Lt, operand.clone()),
        "$lte" => Condition::Cmp(CmpOp::Lte, operand.clone()),
        "$gt" => Condition::Cmp(CmpOp::Gt, operand.clone()),
        "$gte" => Condition::Cmp(CmpOp::Gte, operand.clone()),
        "$in" => match operand {
            Value::Array(values) => Condition::In(values.clone()),
            other => {
                return Err(CoreError::invalid_query(format!(
                    "$in on {field} needs an array, got {other}"
                )))
            }
        },
        unknown => {
            return Err(CoreError::invalid_query(format!(
                "unknown operator {unknown} on {field}"
            )))
        }
    })
}

//! Value equality and ordering shared by queries and indexes.
//!
//! Numbers compare by numeric value, so `30` and `30.0` are equal. A float
//! with no fractional part that fits the integer range is treated as that
//! integer everywhere, which keeps [`equal`] consistent with the canonical
//! index encoding.

use serde_json::{Number, Value};
use std::cmp::Ordering;

/// Lower bound (inclusive) of floats treated as integers: -2^63.
const INT_MIN_F64: f64 = -9_223_372_036_854_775_808.0;
/// Upper bound (exclusive) of floats treated as integers: 2^64.
const INT_MAX_F64: f64 = 18_446_744_073_709_551_616.0;

/// A JSON number reduced to a canonical numeric form.
///
/// Two numbers are equal exactly when their canonical forms are equal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Num {
    /// Integral value.
    Int(i128),
    /// Value with a fractional part, or out of integer range.
    Float(f64),
}

impl Num {
    /// Classifies a JSON number.
    #[must_use]
    pub fn of(number: &Number) -> Self {
        if let Some(i) = number.as_i64() {
            return Num::Int(i128::from(i));
        }
        if let Some(u) = number.as_u64() {
            return Num::Int(i128::from(u));
        }
        let f = number.as_f64().unwrap_or(f64::NAN);
        if f.is_finite() && f.fract() == 0.0 && (INT_MIN_F64..INT_MAX_F64).contains(&f) {
            Num::Int(f as i128)
        } else {
            Num::Float(f)
        }
    }

    /// Numeric ordering.
    ///
    /// Integer/float pairs are compared exactly, without rounding the
    /// integer to `f64`.
    #[must_use]
    pub fn compare(self, other: Num) -> Option<Ordering> {
        match (self, other) {
            (Num::Int(a), Num::Int(b)) => Some(a.cmp(&b)),
            (Num::Float(a), Num::Float(b)) => a.partial_cmp(&b),
            (Num::Int(a), Num::Float(b)) => compare_int_float(a, b),
            (Num::Float(a), Num::Int(b)) => compare_int_float(b, a).map(Ordering::reverse),
        }
    }

    /// Canonical text form used in index keys.
    #[must_use]
    pub fn canonical(self) -> String {
        match self {
            Num::Int(i) => i.to_string(),
            Num::Float(f) => format!("{f:?}"),
        }
    }
}

/// Orders an integer against a `Num::Float`, which is either fractional or
/// outside the integer range and so never equal to `int`.
fn compare_int_float(int: i128, float: f64) -> Option<Ordering> {
    if float.is_nan() {
        None
    } else if float >= INT_MAX_F64 {
        Some(Ordering::Less)
    } else if float < INT_MIN_F64 {
        Some(Ordering::Greater)
    } else if int <= float.floor() as i128 {
        Some(Ordering::Less)
    } else {
        Some(Ordering::Greater)
    }
}

/// Deep structural equality.
///
/// Numbers compare by value, objects ignore key order, arrays compare
/// element-wise in order.
#[must_use]
pub fn equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => Num::of(a) == Num::of(b),
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(a, b)| equal(a, b))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, value)| b.get(key).is_some_and(|other| equal(value, other)))
        }
        _ => false,
    }
}

/// Ordering for comparison operators.
///
/// Only number/number and string/string pairs are ordered; every other
/// pairing yields `None` and therefore never matches.
#[must_use]
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => Num::of(a).compare(Num::of(b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integral_floats_are_integers() {
        assert_eq!(Num::of(&Number::from_f64(30.0).unwrap()), Num::Int(30));
        assert_eq!(Num::of(&Number::from(30)), Num::Int(30));
        assert_eq!(Num::of(&Number::from_f64(1.5).unwrap()), Num::Float(1.5));
        assert!(matches!(
            Num::of(&Number::from_f64(1e300).unwrap()),
            Num::Float(_)
        ));
    }

    #[test]
    fn numeric_equality() {
        assert!(equal(&json!(30), &json!(30.0)));
        assert!(equal(&json!(u64::MAX), &json!(u64::MAX)));
        assert!(!equal(&json!(30), &json!(30.5)));
        assert!(!equal(&json!(1), &json!("1")));
        assert!(!equal(&json!(0), &json!(false)));
    }

    #[test]
    fn structural_equality() {
        assert!(equal(&json!({"a": 1, "b": [1, 2]}), &json!({"b": [1.0, 2], "a": 1})));
        assert!(!equal(&json!([1, 2]), &json!([2, 1])));
        assert!(!equal(&json!({"a": 1}), &json!({"a": 1, "b": null})));
        assert!(equal(&json!(null), &json!(null)));
    }

    #[test]
    fn ordering() {
        assert_eq!(compare(&json!(1), &json!(2.5)), Some(Ordering::Less));
        assert_eq!(compare(&json!("b"), &json!("a")), Some(Ordering::Greater));
        assert_eq!(compare(&json!(1), &json!("1")), None);
        assert_eq!(compare(&json!(null), &json!(null)), None);
        assert_eq!(compare(&json!(i64::MAX), &json!(u64::MAX)), Some(Ordering::Less));
    }

    #[test]
    fn large_integers_order_exactly_against_floats() {
        let two_pow_64 = json!(18_446_744_073_709_551_616.0_f64);
        assert_eq!(compare(&json!(u64::MAX), &two_pow_64), Some(Ordering::Less));
        assert_eq!(compare(&two_pow_64, &json!(u64::MAX)), Some(Ordering::Greater));
        assert!(!equal(&json!(u64::MAX), &two_pow_64));

        assert_eq!(compare(&json!(i64::MIN), &json!(-1e19)), Some(Ordering::Greater));
        assert_eq!(compare(&json!(2), &json!(2.5)), Some(Ordering::Less));
        assert_eq!(compare(&json!(3), &json!(2.5)), Some(Ordering::Greater));
        assert_eq!(compare(&json!(-3), &json!(-2.5)), Some(Ordering::Less));
        assert_eq!(compare(&json!(-2), &json!(-2.5)), Some(Ordering::Greater));
    }

    #[test]
    fn canonical_numbers() {
        assert_eq!(Num::Int(-3).canonical(), "-3");
        assert_eq!(Num::Float(0.5).canonical(), "0.5");
    }
}

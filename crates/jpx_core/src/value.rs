//! Truthiness, structural equality and ordering over JSON values

use serde_json::{Number, Value};
use std::cmp::Ordering;

/// `null`, `false`, `""`, `[]` and `{}` are falsy; everything else is truthy
pub fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(_) => true,
        Value::String(s) => !s.is_empty(),
        Value::Array(arr) => !arr.is_empty(),
        Value::Object(obj) => !obj.is_empty(),
    }
}

/// Structural equality: numbers compare by value (`1 == 1.0`), arrays
/// element-wise, objects as member sets regardless of order
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(l), Value::Bool(r)) => l == r,
        (Value::Number(l), Value::Number(r)) => numbers_equal(l, r),
        (Value::String(l), Value::String(r)) => l == r,
        (Value::Array(l), Value::Array(r)) => {
            l.len() == r.len() && l.iter().zip(r).all(|(a, b)| values_equal(a, b))
        }
        (Value::Object(l), Value::Object(r)) => {
            l.len() == r.len()
                && l.iter()
                    .all(|(k, v)| r.get(k).is_some_and(|other| values_equal(v, other)))
        }
        _ => false, // Different types are never equal
    }
}

fn numbers_equal(l: &Number, r: &Number) -> bool {
    match (l.as_i64(), r.as_i64()) {
        (Some(a), Some(b)) => a == b,
        _ => l.as_f64() == r.as_f64(),
    }
}

/// Order numbers numerically and strings lexically; other pairs are unordered
pub fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => match (l.as_f64(), r.as_f64()) {
            (Some(lf), Some(rf)) => lf.partial_cmp(&rf),
            _ => None,
        },
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        _ => None, // Non-comparable types
    }
}

/// Build a JSON number, preferring the integer form when it is exact;
/// non-finite input becomes `null`
pub fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Value::Number((n as i64).into())
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

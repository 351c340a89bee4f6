//! Runtime view of payloads
//!
//! Payloads are plain [`serde_json::Value`]s. This module classifies them into
//! the same closed set of kinds the schema model uses, so the validator can
//! compare "expected" against "actual" without poking at JSON internals.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::cmp::Ordering;
use std::fmt;

/// 2^63 and 2^64 as f64; both are exact
const I64_FLOOR: f64 = -9_223_372_036_854_775_808.0;
const U64_CEILING: f64 = 18_446_744_073_709_551_616.0;

/// The runtime kind of a payload value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl ValueKind {
    /// Classify a payload value
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Boolean,
            Value::Number(n) if as_integer(n).is_some() => ValueKind::Integer,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
        }
    }

    /// Name used in error messages
    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Boolean => "boolean",
            ValueKind::Integer => "integer",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
        }
    }

    /// Whether a value of kind `actual` satisfies an expectation of `self`.
    ///
    /// Integers are numbers; nothing else is widened.
    pub fn accepts(&self, actual: ValueKind) -> bool {
        *self == actual || (*self == ValueKind::Number && actual == ValueKind::Integer)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Length of a string in code points
pub fn char_length(s: &str) -> usize {
    s.chars().count()
}

/// The exact integer a number denotes, if it is integral and fits `i64` or
/// `u64`. `1.0` counts; `1.5` and `1e30` do not.
pub fn as_integer(n: &Number) -> Option<i128> {
    if let Some(i) = n.as_i64() {
        return Some(i128::from(i));
    }
    if let Some(u) = n.as_u64() {
        return Some(i128::from(u));
    }
    let f = n.as_f64()?;
    (f.fract() == 0.0 && (I64_FLOOR..U64_CEILING).contains(&f)).then(|| f as i128)
}

/// Build a number from an exact integer, if it fits `i64` or `u64`
pub fn integer_number(i: i128) -> Option<Number> {
    i64::try_from(i)
        .map(Number::from)
        .ok()
        .or_else(|| u64::try_from(i).map(Number::from).ok())
}

/// Integral floats become integers so `10` and `10.0` compare and hash alike
pub fn normalize_number(n: Number) -> Number {
    if !n.is_f64() {
        return n;
    }
    as_integer(&n).and_then(integer_number).unwrap_or(n)
}

/// Exact ordering of two JSON numbers.
///
/// Integers are never widened to `f64`, so bounds above 2^53 hold exactly.
/// `None` only for NaN, which JSON cannot carry.
pub fn compare_numbers(a: &Number, b: &Number) -> Option<Ordering> {
    match (as_integer(a), as_integer(b)) {
        (Some(x), Some(y)) => Some(x.cmp(&y)),
        (Some(x), None) => compare_integer_float(x, b.as_f64()?),
        (None, Some(y)) => compare_integer_float(y, a.as_f64()?).map(Ordering::reverse),
        (None, None) => a.as_f64()?.partial_cmp(&b.as_f64()?),
    }
}

fn compare_integer_float(x: i128, f: f64) -> Option<Ordering> {
    if f.is_nan() {
        return None;
    }
    if f >= U64_CEILING {
        return Some(Ordering::Less);
    }
    if f < I64_FLOOR {
        return Some(Ordering::Greater);
    }
    let floor = f.floor();
    match x.cmp(&(floor as i128)) {
        Ordering::Equal if f > floor => Some(Ordering::Less),
        other => Some(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_classification() {
        assert_eq!(ValueKind::of(&json!(null)), ValueKind::Null);
        assert_eq!(ValueKind::of(&json!(true)), ValueKind::Boolean);
        assert_eq!(ValueKind::of(&json!(-3)), ValueKind::Integer);
        assert_eq!(ValueKind::of(&json!(u64::MAX)), ValueKind::Integer);
        assert_eq!(ValueKind::of(&json!(1.5)), ValueKind::Number);
        assert_eq!(ValueKind::of(&json!(1.0)), ValueKind::Integer);
        assert_eq!(ValueKind::of(&json!(1e30)), ValueKind::Number);
        assert_eq!(ValueKind::of(&json!("x")), ValueKind::String);
        assert_eq!(ValueKind::of(&json!([])), ValueKind::Array);
        assert_eq!(ValueKind::of(&json!({})), ValueKind::Object);
    }

    #[test]
    fn test_number_accepts_integer_but_not_reverse() {
        assert!(ValueKind::Number.accepts(ValueKind::Integer));
        assert!(!ValueKind::Integer.accepts(ValueKind::Number));
        assert!(!ValueKind::String.accepts(ValueKind::Null));
    }

    #[test]
    fn test_char_length_counts_code_points() {
        assert_eq!(char_length("héllo"), 5);
        assert_eq!(char_length("日本"), 2);
    }

    fn number(value: Value) -> Number {
        match value {
            Value::Number(n) => n,
            other => panic!("not a number: {}", other),
        }
    }

    #[test]
    fn test_compare_integers_beyond_f64_precision() {
        let bound = number(json!(9_007_199_254_740_992_u64));
        let above = number(json!(9_007_199_254_740_993_u64));
        assert_eq!(compare_numbers(&above, &bound), Some(Ordering::Greater));
        assert_eq!(compare_numbers(&bound, &above), Some(Ordering::Less));
        assert_eq!(
            compare_numbers(&number(json!(u64::MAX)), &number(json!(i64::MIN))),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn test_compare_mixed_integer_and_float() {
        assert_eq!(compare_numbers(&number(json!(2)), &number(json!(2.5))), Some(Ordering::Less));
        assert_eq!(compare_numbers(&number(json!(3)), &number(json!(2.5))), Some(Ordering::Greater));
        assert_eq!(compare_numbers(&number(json!(-3)), &number(json!(-2.5))), Some(Ordering::Less));
        assert_eq!(compare_numbers(&number(json!(2.0)), &number(json!(2))), Some(Ordering::Equal));
        assert_eq!(compare_numbers(&number(json!(u64::MAX)), &number(json!(1e30))), Some(Ordering::Less));
        assert_eq!(compare_numbers(&number(json!(0.25)), &number(json!(0.5))), Some(Ordering::Less));
    }

    #[test]
    fn test_normalize_number() {
        assert_eq!(normalize_number(number(json!(10.0))), number(json!(10)));
        assert_eq!(normalize_number(number(json!(-4.0))), number(json!(-4)));
        assert_eq!(normalize_number(number(json!(0.5))), number(json!(0.5)));
        assert_eq!(integer_number(i128::from(u64::MAX) + 1), None);
    }
}

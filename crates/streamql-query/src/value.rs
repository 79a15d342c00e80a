//! Literal values and their dialect formatting.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::error::{BuildError, BuildResult};
use crate::kind::Kind;

/// A literal value embedded in a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Boolean(bool),
    /// Integer value.
    Integer(i64),
    /// Floating point value.
    Double(f64),
    /// String value.
    String(String),
    /// Binary data.
    Bytes(Vec<u8>),
    /// Ordered collection.
    Array(Vec<Value>),
    /// String-keyed map.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Returns true if the value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true if the value supports ordering comparisons.
    pub fn is_orderable(&self) -> bool {
        matches!(
            self,
            Value::Integer(_) | Value::Double(_) | Value::String(_) | Value::Bytes(_)
        )
    }

    /// Returns true if the value can be the right-hand side of `IN`.
    pub fn is_iterable(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    /// Returns the kind of this value, if it has one.
    ///
    /// Nulls and empty containers carry no kind.
    pub fn kind(&self) -> Option<Kind> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(Kind::Boolean),
            Value::Integer(i) => Some(if i32::try_from(*i).is_ok() {
                Kind::Int
            } else {
                Kind::BigInt
            }),
            Value::Double(_) => Some(Kind::Double),
            Value::String(_) => Some(Kind::String),
            Value::Bytes(_) => Some(Kind::Bytes),
            Value::Array(items) => items.iter().find_map(Value::kind).map(Kind::array),
            Value::Map(entries) => entries.values().find_map(Value::kind).map(Kind::map),
        }
    }

    /// Formats the value as a dialect literal.
    pub fn to_sql(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Double(f) => format_double(*f),
            Value::String(s) => quote(s),
            Value::Bytes(b) => format!("TO_BYTES('{}', 'hex')", hex_encode(b)),
            Value::Array(items) => format!(
                "ARRAY[{}]",
                items.iter().map(Value::to_sql).collect::<Vec<_>>().join(", ")
            ),
            Value::Map(entries) => format!(
                "MAP({})",
                entries
                    .iter()
                    .map(|(k, v)| format!("{} := {}", quote(k), v.to_sql()))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }

    /// Formats the value, rejecting numbers the dialect has no literal for.
    pub fn try_to_sql(&self) -> BuildResult<String> {
        self.check_finite()?;
        Ok(self.to_sql())
    }

    fn check_finite(&self) -> BuildResult<()> {
        match self {
            Value::Double(f) if !f.is_finite() => Err(BuildError::InvalidOperand {
                operator: "literal",
                reason: format!("{} has no literal form", f),
            }),
            Value::Array(items) => items.iter().try_for_each(Value::check_finite),
            Value::Map(entries) => entries.values().try_for_each(Value::check_finite),
            _ => Ok(()),
        }
    }

    /// Converts a serialized member of a native record into a value of
    /// `kind`.
    pub fn from_json_as(kind: &Kind, value: &serde_json::Value) -> Result<Self, String> {
        use serde_json::Value as Json;

        let mismatch = || format!("expected {}, got {}", kind, value);
        if value.is_null() {
            return Ok(Value::Null);
        }
        match kind {
            Kind::Boolean => value.as_bool().map(Value::Boolean).ok_or_else(mismatch),
            Kind::Int => value
                .as_i64()
                .filter(|i| i32::try_from(*i).is_ok())
                .map(Value::Integer)
                .ok_or_else(mismatch),
            Kind::BigInt => match (value.as_i64(), value.as_u64()) {
                (Some(i), _) => Ok(Value::Integer(i)),
                (None, Some(u)) => Err(format!("{} is out of BIGINT range", u)),
                _ => Err(mismatch()),
            },
            Kind::Double => value.as_f64().map(Value::Double).ok_or_else(mismatch),
            Kind::String => value
                .as_str()
                .map(|s| Value::String(s.to_string()))
                .ok_or_else(mismatch),
            Kind::Bytes => match value {
                Json::Array(items) => items
                    .iter()
                    .map(|item| {
                        item.as_u64()
                            .and_then(|b| u8::try_from(b).ok())
                            .ok_or_else(mismatch)
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Bytes),
                _ => Err(mismatch()),
            },
            Kind::Array(element) => match value {
                Json::Array(items) => items
                    .iter()
                    .map(|item| Value::element_from_json(element, item))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array),
                _ => Err(mismatch()),
            },
            Kind::Map(element) => match value {
                Json::Object(entries) => entries
                    .iter()
                    .map(|(k, v)| Value::element_from_json(element, v).map(|v| (k.clone(), v)))
                    .collect::<Result<BTreeMap<_, _>, _>>()
                    .map(Value::Map),
                _ => Err(mismatch()),
            },
        }
    }

    fn element_from_json(kind: &Kind, value: &serde_json::Value) -> Result<Self, String> {
        if value.is_null() {
            return Err(format!("null element where {} expected", kind));
        }
        Value::from_json_as(kind, value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

/// Single-quotes a string, doubling embedded quotes.
pub(crate) fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn format_double(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{:.1}", f)
    } else {
        f.to_string()
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

// Implement Into<Value> for common types
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

macro_rules! impl_from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Integer(i64::from(v))
                }
            }
        )*
    };
}

impl_from_integer!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Double(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(v: [T; N]) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<BTreeMap<String, T>> for Value {
    fn from(v: BTreeMap<String, T>) -> Self {
        Value::Map(v.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Value>> From<HashMap<String, T>> for Value {
    fn from(v: HashMap<String, T>) -> Self {
        Value::Map(v.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_formatting() {
        assert_eq!(Value::Null.to_sql(), "NULL");
        assert_eq!(Value::Boolean(true).to_sql(), "TRUE");
        assert_eq!(Value::Boolean(false).to_sql(), "FALSE");
        assert_eq!(Value::Integer(42).to_sql(), "42");
        assert_eq!(Value::Double(3.25).to_sql(), "3.25");
        assert_eq!(Value::Double(2.0).to_sql(), "2.0");
        assert_eq!(Value::from("hello").to_sql(), "'hello'");
        assert_eq!(Value::from("it's").to_sql(), "'it''s'");
        assert_eq!(
            Value::Bytes(vec![0xde, 0xad]).to_sql(),
            "TO_BYTES('dead', 'hex')"
        );
    }

    #[test]
    fn test_container_formatting() {
        assert_eq!(Value::from(vec![1, 2, 3]).to_sql(), "ARRAY[1, 2, 3]");

        let mut map = BTreeMap::new();
        map.insert("b".to_string(), 2);
        map.insert("a".to_string(), 1);
        assert_eq!(Value::from(map).to_sql(), "MAP('a' := 1, 'b' := 2)");
    }

    #[test]
    fn test_value_kind() {
        assert_eq!(Value::Integer(5).kind(), Some(Kind::Int));
        assert_eq!(Value::Integer(i64::MAX).kind(), Some(Kind::BigInt));
        assert_eq!(Value::from(vec!["a"]).kind(), Some(Kind::array(Kind::String)));
        assert_eq!(Value::Array(vec![]).kind(), None);
        assert_eq!(Value::Null.kind(), None);
    }

    #[test]
    fn test_capabilities() {
        assert!(Value::from("x").is_orderable());
        assert!(!Value::Boolean(true).is_orderable());
        assert!(Value::from(vec![1]).is_iterable());
        assert!(!Value::Integer(1).is_iterable());
    }

    #[test]
    fn test_from_json_as() {
        use serde_json::json;

        assert_eq!(
            Value::from_json_as(&Kind::Bytes, &json!([222, 173])),
            Ok(Value::Bytes(vec![0xde, 0xad]))
        );
        assert_eq!(
            Value::from_json_as(&Kind::array(Kind::BigInt), &json!([1, 2])),
            Ok(Value::from(vec![1i64, 2]))
        );
        assert_eq!(Value::from_json_as(&Kind::Double, &json!(1)), Ok(Value::Double(1.0)));
        assert_eq!(Value::from_json_as(&Kind::String, &json!(null)), Ok(Value::Null));
        assert!(Value::from_json_as(&Kind::BigInt, &json!(u64::MAX)).is_err());
        assert!(Value::from_json_as(&Kind::Int, &json!(i64::MAX)).is_err());
        assert!(Value::from_json_as(&Kind::Bytes, &json!([256])).is_err());
        assert!(Value::from_json_as(&Kind::Boolean, &json!("yes")).is_err());
    }

    #[test]
    fn test_non_finite_doubles_rejected() {
        assert_eq!(Value::Double(1.5).try_to_sql(), Ok("1.5".to_string()));
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                Value::Double(bad).try_to_sql(),
                Err(BuildError::InvalidOperand { .. })
            ));
        }
        assert!(Value::from(vec![1.0, f64::NAN]).try_to_sql().is_err());
    }

    #[test]
    fn test_value_from_types() {
        let _: Value = 42i32.into();
        let _: Value = 42i64.into();
        let _: Value = 3.5f64.into();
        let _: Value = true.into();
        let _: Value = "hello".into();
        let _: Value = String::from("world").into();
        let _: Value = Some(42).into();
        let _: Value = None::<i32>.into();
        let _: Value = [1, 2].into();
    }
}

//! Primitive kinds understood by the remote engine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{SchemaError, SchemaResult};

/// The closed set of column kinds.
///
/// Every kind has exactly one dialect name; parsing a remote type name is a
/// total function that fails on anything unrecognised.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    /// Boolean.
    Boolean,
    /// 32-bit signed integer.
    Int,
    /// 64-bit signed integer.
    BigInt,
    /// 64-bit floating point.
    Double,
    /// Character string.
    String,
    /// Byte sequence.
    Bytes,
    /// Array of one element kind.
    Array(Box<Kind>),
    /// Map from string keys to one value kind.
    Map(Box<Kind>),
}

impl Kind {
    /// Creates an array kind.
    pub fn array(element: Kind) -> Self {
        Kind::Array(Box::new(element))
    }

    /// Creates a map kind with string keys.
    pub fn map(value: Kind) -> Self {
        Kind::Map(Box::new(value))
    }

    /// Returns the dialect type name.
    pub fn as_sql(&self) -> String {
        match self {
            Kind::Boolean => "BOOLEAN".to_string(),
            Kind::Int => "INT".to_string(),
            Kind::BigInt => "BIGINT".to_string(),
            Kind::Double => "DOUBLE".to_string(),
            Kind::String => "STRING".to_string(),
            Kind::Bytes => "BYTES".to_string(),
            Kind::Array(element) => format!("ARRAY<{}>", element.as_sql()),
            Kind::Map(value) => format!("MAP<STRING, {}>", value.as_sql()),
        }
    }

    /// Returns true for numeric kinds.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Kind::Int | Kind::BigInt | Kind::Double)
    }

    /// Returns true for containers.
    pub fn is_container(&self) -> bool {
        matches!(self, Kind::Array(_) | Kind::Map(_))
    }

    /// Returns true if fields of this kind may be used as join keys.
    pub fn is_joinable(&self) -> bool {
        !self.is_container()
    }

    /// Returns true if values of this kind support `<`, `>` and friends.
    pub fn is_orderable(&self) -> bool {
        matches!(
            self,
            Kind::Int | Kind::BigInt | Kind::Double | Kind::String | Kind::Bytes
        )
    }

    /// Parses a remote type name such as `BIGINT`, `VARCHAR(STRING)` or
    /// `MAP<STRING, ARRAY<INT>>`.
    pub fn parse(text: &str) -> SchemaResult<Self> {
        let trimmed = text.trim();
        let upper = trimmed.to_ascii_uppercase();

        if let Some(inner) = strip_generic(&upper, "ARRAY") {
            return Ok(Kind::array(Kind::parse(inner)?));
        }
        if let Some(inner) = strip_generic(&upper, "MAP") {
            let (key, value) = split_top_level(inner)
                .ok_or_else(|| SchemaError::MalformedSchema(trimmed.to_string()))?;
            if Kind::parse(key)? != Kind::String {
                return Err(SchemaError::UnknownKind(trimmed.to_string()));
            }
            return Ok(Kind::map(Kind::parse(value)?));
        }

        match upper.as_str() {
            "BOOLEAN" | "BOOL" => Ok(Kind::Boolean),
            "INT" | "INTEGER" => Ok(Kind::Int),
            "BIGINT" => Ok(Kind::BigInt),
            "DOUBLE" => Ok(Kind::Double),
            "STRING" | "VARCHAR" | "VARCHAR(STRING)" => Ok(Kind::String),
            "BYTES" => Ok(Kind::Bytes),
            _ => Err(SchemaError::UnknownKind(trimmed.to_string())),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_sql())
    }
}

/// Returns the text between `NAME<` and the matching final `>`.
fn strip_generic<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(name)?.trim_start();
    let inner = rest.strip_prefix('<')?.strip_suffix('>')?;
    Some(inner)
}

/// Splits `K, V` at the first comma that is not nested in angle brackets.
fn split_top_level(text: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '<' | '(' => depth += 1,
            '>' | ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => return Some((&text[..i], &text[i + 1..])),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_sql() {
        assert_eq!(Kind::Int.as_sql(), "INT");
        assert_eq!(Kind::array(Kind::String).as_sql(), "ARRAY<STRING>");
        assert_eq!(
            Kind::map(Kind::array(Kind::Double)).as_sql(),
            "MAP<STRING, ARRAY<DOUBLE>>"
        );
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!(Kind::parse("INTEGER").unwrap(), Kind::Int);
        assert_eq!(Kind::parse("varchar").unwrap(), Kind::String);
        assert_eq!(Kind::parse("VARCHAR(STRING)").unwrap(), Kind::String);
        assert_eq!(Kind::parse(" BIGINT ").unwrap(), Kind::BigInt);
    }

    #[test]
    fn test_parse_nested() {
        assert_eq!(
            Kind::parse("MAP<STRING, ARRAY<INT>>").unwrap(),
            Kind::map(Kind::array(Kind::Int))
        );
        assert_eq!(
            Kind::parse("ARRAY<MAP<VARCHAR, BOOLEAN>>").unwrap(),
            Kind::array(Kind::map(Kind::Boolean))
        );
    }

    #[test]
    fn test_parse_unknown_fails() {
        assert_eq!(
            Kind::parse("GEOMETRY"),
            Err(SchemaError::UnknownKind("GEOMETRY".to_string()))
        );
        assert!(Kind::parse("MAP<INT, STRING>").is_err());
        assert!(Kind::parse("MAP<STRING>").is_err());
    }

    #[test]
    fn test_parse_round_trips_as_sql() {
        let kinds = [
            Kind::Boolean,
            Kind::Int,
            Kind::BigInt,
            Kind::Double,
            Kind::String,
            Kind::Bytes,
            Kind::array(Kind::BigInt),
            Kind::map(Kind::array(Kind::Bytes)),
        ];
        for kind in kinds {
            assert_eq!(Kind::parse(&kind.as_sql()).unwrap(), kind);
        }
    }

    #[test]
    fn test_capabilities() {
        assert!(Kind::Bytes.is_orderable());
        assert!(!Kind::Boolean.is_orderable());
        assert!(Kind::Boolean.is_joinable());
        assert!(!Kind::array(Kind::Int).is_joinable());
    }
}

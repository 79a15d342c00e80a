//! Schemas reported by the engine.
//!
//! Two sources are understood: the JSON body of a `DESCRIBE` statement and
//! the compact schema string carried by a streaming query header, e.g.
//! `` `ID` BIGINT KEY, `ITEM` STRING ``.

use serde::{Deserialize, Serialize};
use streamql_common::RelationKind;

use super::field::{RelationSchema, SearchField};
use crate::error::{SchemaError, SchemaResult};
use crate::kind::Kind;

/// A relation as described by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDescription {
    /// Relation name.
    pub name: String,
    /// `STREAM` or `TABLE`.
    #[serde(rename = "type")]
    pub relation_type: String,
    /// Backing topic.
    #[serde(default)]
    pub topic: Option<String>,
    /// Key serialization format.
    #[serde(default)]
    pub key_format: Option<String>,
    /// Value serialization format.
    #[serde(default)]
    pub value_format: Option<String>,
    /// Columns in declaration order.
    #[serde(default)]
    pub fields: Vec<FieldDescription>,
}

/// One column of a [`SourceDescription`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescription {
    /// Column name.
    pub name: String,
    /// `KEY` for key columns, absent otherwise.
    #[serde(rename = "type", default)]
    pub field_type: Option<String>,
    /// Column type.
    pub schema: FieldSchema,
}

/// Column type as nested JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSchema {
    /// Type name, e.g. `BIGINT` or `ARRAY`.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Element type for arrays, value type for maps.
    #[serde(default)]
    pub member_schema: Option<Box<FieldSchema>>,
}

impl FieldSchema {
    /// Converts the nested description into a [`Kind`].
    pub fn to_kind(&self) -> SchemaResult<Kind> {
        let member = || {
            self.member_schema
                .as_deref()
                .ok_or_else(|| SchemaError::MalformedSchema(format!("{} without member schema", self.type_name)))
        };
        match self.type_name.to_ascii_uppercase().as_str() {
            "ARRAY" => Ok(Kind::array(member()?.to_kind()?)),
            "MAP" => Ok(Kind::map(member()?.to_kind()?)),
            _ => Kind::parse(&self.type_name),
        }
    }
}

impl SourceDescription {
    /// Extracts the description from a `DESCRIBE` response body.
    ///
    /// The engine answers with an array of entities; the first one carrying
    /// a `sourceDescription` is used.
    pub fn from_response(body: &[u8]) -> SchemaResult<Self> {
        let entities: Vec<serde_json::Value> = serde_json::from_slice(body)
            .map_err(|e| SchemaError::MalformedSchema(e.to_string()))?;
        let description = entities
            .into_iter()
            .find_map(|mut entity| entity.get_mut("sourceDescription").map(serde_json::Value::take))
            .ok_or_else(|| {
                SchemaError::MalformedSchema("response has no source description".to_string())
            })?;
        serde_json::from_value(description).map_err(|e| SchemaError::MalformedSchema(e.to_string()))
    }

    /// Stream or table, if the type is recognised.
    pub fn relation_kind(&self) -> Option<RelationKind> {
        match self.relation_type.to_ascii_uppercase().as_str() {
            "STREAM" => Some(RelationKind::Stream),
            "TABLE" => Some(RelationKind::Table),
            _ => None,
        }
    }
}

/// Builds a schema for `relation` from a `DESCRIBE` result.
pub fn remote_fields_representation(
    relation: &str,
    description: &SourceDescription,
) -> SchemaResult<RelationSchema> {
    let mut schema = RelationSchema::new(relation);
    if let Some(kind) = description.relation_kind() {
        schema = schema.with_kind(kind);
    }
    for field in &description.fields {
        let mut search = SearchField::new(field.name.clone(), field.schema.to_kind()?);
        if field
            .field_type
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case("KEY"))
        {
            search = search.primary();
        }
        schema.insert(search)?;
    }
    Ok(schema)
}

/// Builds a schema for `relation` from a header schema string.
pub fn remote_schema_representation(relation: &str, schema: &str) -> SchemaResult<RelationSchema> {
    RelationSchema::from_fields(relation, parse_columns(schema)?)
}

/// Parses `` `a` INT, `b` STRING `` into fields, preserving column order.
///
/// A trailing `KEY` or `PRIMARY KEY` marks the column primary.
pub fn parse_columns(schema: &str) -> SchemaResult<Vec<SearchField>> {
    split_columns(schema)
        .into_iter()
        .map(str::trim)
        .filter(|column| !column.is_empty())
        .map(parse_column)
        .collect()
}

fn parse_column(column: &str) -> SchemaResult<SearchField> {
    let malformed = || SchemaError::MalformedSchema(column.to_string());
    let (name, rest) = if let Some(quoted) = column.strip_prefix('`') {
        let end = quoted.find('`').ok_or_else(malformed)?;
        (&quoted[..end], &quoted[end + 1..])
    } else {
        column.split_once(char::is_whitespace).ok_or_else(malformed)?
    };
    if name.is_empty() {
        return Err(malformed());
    }

    let mut kind = rest.trim();
    let mut primary = false;
    let upper = kind.to_ascii_uppercase();
    for marker in [" PRIMARY KEY", " KEY"] {
        if upper.ends_with(marker) {
            kind = kind[..kind.len() - marker.len()].trim_end();
            primary = true;
            break;
        }
    }
    if kind.is_empty() {
        return Err(malformed());
    }

    let field = SearchField::new(name, Kind::parse(kind)?);
    Ok(if primary { field.primary() } else { field })
}

/// Splits on commas outside of `<..>` and `(..)`.
fn split_columns(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '<' | '(' => depth += 1,
            '>' | ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

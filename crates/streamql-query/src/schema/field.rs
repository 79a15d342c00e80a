//! Column descriptions and per-relation schemas.

use std::collections::BTreeMap;

use streamql_common::RelationKind;

use crate::error::{SchemaError, SchemaResult};
use crate::kind::Kind;
use crate::value::Value;

/// Canonical description of one relation column.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchField {
    name: String,
    relation: String,
    kind: Kind,
    value: Option<Value>,
    primary: bool,
    tag: Option<String>,
}

impl SearchField {
    /// Creates a column description.
    pub fn new(name: impl Into<String>, kind: Kind) -> Self {
        Self {
            name: name.into(),
            relation: String::new(),
            kind,
            value: None,
            primary: false,
            tag: None,
        }
    }

    /// Sets the owning relation.
    #[must_use]
    pub fn relation(mut self, relation: impl Into<String>) -> Self {
        self.relation = relation.into();
        self
    }

    /// Marks the column as the primary key.
    #[must_use]
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Attaches a literal, used by INSERT.
    #[must_use]
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Attaches a declarative tag.
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning relation, empty when unbound.
    pub fn relation_name(&self) -> &str {
        &self.relation
    }

    /// Column kind.
    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    /// Literal value, if any.
    pub fn literal(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// True if this is the primary key.
    pub fn is_primary(&self) -> bool {
        self.primary
    }

    /// Declarative tag, if any.
    pub fn tag_name(&self) -> Option<&str> {
        self.tag.as_deref()
    }
}

/// The full column set of one relation.
///
/// Lookups are case-insensitive. A schema is never edited once it has been
/// registered; replacing it means registering a new one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RelationSchema {
    name: String,
    kind: Option<RelationKind>,
    fields: BTreeMap<String, SearchField>,
}

impl RelationSchema {
    /// Creates an empty schema.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            fields: BTreeMap::new(),
        }
    }

    /// Builds a schema from fields, rejecting more than one primary key.
    pub fn from_fields(
        name: impl Into<String>,
        fields: impl IntoIterator<Item = SearchField>,
    ) -> SchemaResult<Self> {
        let mut schema = Self::new(name);
        for field in fields {
            schema.insert(field)?;
        }
        Ok(schema)
    }

    /// Sets whether the relation is a stream or a table.
    #[must_use]
    pub fn with_kind(mut self, kind: RelationKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Adds a field, binding it to this relation.
    pub fn insert(&mut self, field: SearchField) -> SchemaResult<()> {
        if field.is_primary() {
            if let Some(existing) = self.primary() {
                if !existing.name().eq_ignore_ascii_case(field.name()) {
                    return Err(SchemaError::AmbiguousPrimaryKey {
                        relation: self.name.clone(),
                        first: existing.name().to_string(),
                        second: field.name().to_string(),
                    });
                }
            }
        }
        let field = field.relation(self.name.clone());
        self.fields.insert(field.name().to_ascii_uppercase(), field);
        Ok(())
    }

    /// Relation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stream or table, when known.
    pub fn kind(&self) -> Option<RelationKind> {
        self.kind
    }

    /// Looks a field up by name, ignoring case.
    pub fn get(&self, name: &str) -> Option<&SearchField> {
        self.fields.get(&name.to_ascii_uppercase())
    }

    /// The primary key field, if any.
    pub fn primary(&self) -> Option<&SearchField> {
        self.fields.values().find(|field| field.is_primary())
    }

    /// Fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = &SearchField> {
        self.fields.values()
    }

    /// Upper-cased field names in order.
    pub(crate) fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if the schema has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

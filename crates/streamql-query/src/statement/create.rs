//! CREATE STREAM / CREATE TABLE.

use streamql_common::{RelationKind, RelationSettings};

use super::select::Select;
use crate::error::{BuildError, BuildResult, SchemaError};
use crate::expr::Expression;
use crate::schema::{native_struct_representation, Record, SchemaRegistry, SearchField};
use crate::value::quote;

/// Relation properties rendered in the `WITH (..)` clause.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Metadata {
    /// Backing topic.
    pub topic: Option<String>,
    /// Key serialization format.
    pub key_format: Option<String>,
    /// Value serialization format.
    pub value_format: Option<String>,
    /// Topic partitions.
    pub partitions: Option<u32>,
    /// Topic replicas.
    pub replicas: Option<u16>,
    /// Event-time column.
    pub timestamp: Option<String>,
}

impl Metadata {
    /// Creates empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the backing topic.
    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Sets the key format.
    #[must_use]
    pub fn key_format(mut self, format: impl Into<String>) -> Self {
        self.key_format = Some(format.into());
        self
    }

    /// Sets the value format.
    #[must_use]
    pub fn value_format(mut self, format: impl Into<String>) -> Self {
        self.value_format = Some(format.into());
        self
    }

    /// Sets the partition count.
    #[must_use]
    pub fn partitions(mut self, partitions: u32) -> Self {
        self.partitions = Some(partitions);
        self
    }

    /// Sets the replica count.
    #[must_use]
    pub fn replicas(mut self, replicas: u16) -> Self {
        self.replicas = Some(replicas);
        self
    }

    /// Sets the event-time column.
    #[must_use]
    pub fn timestamp(mut self, column: impl Into<String>) -> Self {
        self.timestamp = Some(column.into());
        self
    }

    /// True if no property is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Renders `WITH (..)`, or `None` when empty.
    pub fn to_sql(&self) -> BuildResult<Option<String>> {
        let mut props = Vec::new();
        if let Some(topic) = &self.topic {
            props.push(format!("KAFKA_TOPIC={}", quote(topic)));
        }
        if let Some(format) = &self.key_format {
            props.push(format!("KEY_FORMAT={}", quote(format)));
        }
        if let Some(format) = &self.value_format {
            props.push(format!("VALUE_FORMAT={}", quote(format)));
        }
        if let Some(partitions) = self.partitions {
            if partitions == 0 {
                return Err(BuildError::InvalidParameter {
                    function: "PARTITIONS",
                    value: 0,
                });
            }
            props.push(format!("PARTITIONS={}", partitions));
        }
        if let Some(replicas) = self.replicas {
            if replicas == 0 {
                return Err(BuildError::InvalidParameter {
                    function: "REPLICAS",
                    value: 0,
                });
            }
            props.push(format!("REPLICAS={}", replicas));
        }
        if let Some(column) = &self.timestamp {
            props.push(format!("TIMESTAMP={}", quote(column)));
        }
        if props.is_empty() {
            return Ok(None);
        }
        Ok(Some(format!("WITH ({})", props.join(", "))))
    }
}

impl From<&RelationSettings> for Metadata {
    fn from(settings: &RelationSettings) -> Self {
        Self {
            topic: settings.topic.clone(),
            key_format: settings.key_format.clone(),
            value_format: settings.value_format.clone(),
            partitions: settings.partitions,
            replicas: settings.replicas,
            timestamp: settings.timestamp.clone(),
        }
    }
}

/// A CREATE builder.
///
/// Either field definitions or an `AS SELECT` source must be given, never
/// both. With a select source three rules apply, in this order: a table
/// cannot be created from a non-aggregated stream, a stream cannot be
/// created from a table, and a table cannot be created from a windowed
/// select.
#[derive(Debug, Clone)]
pub struct Create {
    kind: RelationKind,
    name: String,
    or_replace: bool,
    if_not_exists: bool,
    fields: Vec<SearchField>,
    source: Option<Select>,
    metadata: Metadata,
    registry: Option<SchemaRegistry>,
    error: Option<BuildError>,
}

impl Create {
    /// Starts a CREATE of the given kind.
    pub fn new(kind: RelationKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            or_replace: false,
            if_not_exists: false,
            fields: Vec::new(),
            source: None,
            metadata: Metadata::default(),
            registry: None,
            error: None,
        }
    }

    /// `CREATE STREAM name`
    pub fn stream(name: impl Into<String>) -> Self {
        Self::new(RelationKind::Stream, name)
    }

    /// `CREATE TABLE name`
    pub fn table(name: impl Into<String>) -> Self {
        Self::new(RelationKind::Table, name)
    }

    /// Starts a CREATE from configured relation settings.
    pub fn from_settings(settings: &RelationSettings) -> Self {
        Self::new(settings.kind, settings.name.clone()).with_metadata(Metadata::from(settings))
    }

    /// Fills the field definitions from a native record type.
    #[must_use]
    pub fn from_record<T: Record>(mut self) -> Self {
        match native_struct_representation::<T>(&self.name) {
            Ok(schema) => self.fields.extend(schema.fields().cloned()),
            Err(err) => self.fail(err),
        }
        self
    }

    /// Adds field definitions.
    #[must_use]
    pub fn schema_fields(mut self, fields: impl IntoIterator<Item = SearchField>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Sets the select source.
    #[must_use]
    pub fn as_select(mut self, select: Select) -> Self {
        self.source = Some(select);
        self
    }

    /// Sets the `WITH (..)` properties.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Registry used to look up the kind of the select source.
    #[must_use]
    pub fn with_registry(mut self, registry: SchemaRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// `CREATE OR REPLACE`
    #[must_use]
    pub fn or_replace(mut self) -> Self {
        self.or_replace = true;
        self
    }

    /// `IF NOT EXISTS`
    #[must_use]
    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }

    /// Kind of the relation being created.
    pub fn kind(&self) -> RelationKind {
        self.kind
    }

    /// Name of the relation being created.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn fail(&mut self, err: SchemaError) {
        if self.error.is_some() {
            return;
        }
        self.error = Some(match err {
            SchemaError::AmbiguousPrimaryKey {
                relation,
                first,
                second,
            } => BuildError::AmbiguousPrimaryKey {
                relation,
                first,
                second,
            },
            other => BuildError::Serialize(other.to_string()),
        });
    }

    fn check_source(&self, select: &Select) -> BuildResult<()> {
        let Some(source) = select.source() else {
            // the body reports the missing FROM
            return Ok(());
        };
        let source_name = || source.name().to_string();
        let source_kind = select
            .source_kind(self.registry.as_ref())
            .ok_or_else(|| BuildError::RelationNotFound(source_name()))?;
        match (self.kind, source_kind) {
            (RelationKind::Table, RelationKind::Stream) if !select.is_aggregated() => {
                return Err(BuildError::TableFromStream {
                    table: self.name.clone(),
                    source_name: source_name(),
                });
            }
            (RelationKind::Stream, RelationKind::Table) => {
                return Err(BuildError::StreamFromTable {
                    stream: self.name.clone(),
                    source_name: source_name(),
                });
            }
            _ => {}
        }
        if self.kind == RelationKind::Table && select.is_windowed() {
            return Err(BuildError::TableFromWindow(self.name.clone()));
        }
        Ok(())
    }

    fn fields_sql(&self) -> BuildResult<String> {
        let mut primary: Option<&SearchField> = None;
        let mut parts = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            if field.name().trim().is_empty() {
                return Err(BuildError::EmptyColumn);
            }
            let mut part = format!("{} {}", field.name(), field.kind());
            if field.is_primary() {
                if let Some(first) = primary {
                    return Err(BuildError::AmbiguousPrimaryKey {
                        relation: self.name.clone(),
                        first: first.name().to_string(),
                        second: field.name().to_string(),
                    });
                }
                primary = Some(field);
                part.push_str(match self.kind {
                    RelationKind::Table => " PRIMARY KEY",
                    RelationKind::Stream => " KEY",
                });
            }
            parts.push(part);
        }
        Ok(format!("({})", parts.join(", ")))
    }
}

impl Expression for Create {
    fn to_sql(&self) -> BuildResult<String> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        if self.name.trim().is_empty() {
            return Err(BuildError::EmptyRelation("CREATE"));
        }
        if let Some(select) = &self.source {
            self.check_source(select)?;
        }

        let mut sql = String::from("CREATE ");
        if self.or_replace {
            sql.push_str("OR REPLACE ");
        }
        sql.push_str(self.kind.as_sql());
        if self.if_not_exists {
            sql.push_str(" IF NOT EXISTS");
        }
        sql.push(' ');
        sql.push_str(&self.name);

        let metadata = self.metadata.to_sql()?;
        match (&self.source, self.fields.is_empty()) {
            (Some(_), false) => return Err(BuildError::ConflictingSource(self.name.clone())),
            (None, true) => return Err(BuildError::MissingSource(self.name.clone())),
            (None, false) => {
                sql.push(' ');
                sql.push_str(&self.fields_sql()?);
                if let Some(metadata) = metadata {
                    sql.push(' ');
                    sql.push_str(&metadata);
                }
            }
            (Some(select), true) => {
                if let Some(metadata) = metadata {
                    sql.push(' ');
                    sql.push_str(&metadata);
                }
                sql.push_str(" AS ");
                sql.push_str(&select.body_sql()?);
            }
        }
        sql.push(';');
        Ok(sql)
    }
}

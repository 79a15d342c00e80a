//! Errors raised while building statements and reconciling schemas.

use thiserror::Error;

use streamql_common::ErrorCode;

use crate::kind::Kind;

/// A statement or expression could not be serialized.
///
/// Builders never fail eagerly; the first problem is reported by the
/// terminal `to_sql` call and no partial text is produced.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    /// A field reference has an empty column name.
    #[error("field has an empty column name")]
    EmptyColumn,

    /// A statement has no fields, columns or values.
    #[error("{0} has an empty field list")]
    EmptyFieldList(&'static str),

    /// An operand does not suit its operator.
    #[error("invalid operand for {operator}: {reason}")]
    InvalidOperand {
        /// Operator keyword.
        operator: &'static str,
        /// What was wrong with the operand.
        reason: String,
    },

    /// A numeric parameter is not strictly positive.
    #[error("invalid parameter for {function}: {value} (must be > 0)")]
    InvalidParameter {
        /// Function name.
        function: &'static str,
        /// Rejected value.
        value: i64,
    },

    /// An expression that requires an alias has none.
    #[error("{0} requires a non-empty alias")]
    MissingAlias(&'static str),

    /// A CASE expression has no WHEN/THEN pair.
    #[error("CASE requires at least one WHEN/THEN pair")]
    MissingWhen,

    /// A logical list has no members.
    #[error("{0} list is empty")]
    EmptyList(&'static str),

    /// A window duration is not strictly positive.
    #[error("{window} window {part} must be > 0, got {value}")]
    InvalidWindowDuration {
        /// Window type.
        window: &'static str,
        /// Which duration.
        part: &'static str,
        /// Rejected value.
        value: i64,
    },

    /// A time unit name is not one of the supported units.
    #[error("unknown time unit: {0}")]
    UnknownTimeUnit(String),

    /// A relation referenced by a builder is not registered.
    #[error("relation {0} not found in schema registry")]
    RelationNotFound(String),

    /// A field referenced by a builder is not part of its relation.
    #[error("field {field} not found in relation {relation}")]
    FieldNotFound {
        /// Field name.
        field: String,
        /// Relation name.
        relation: String,
    },

    /// Join fields report different kinds.
    #[error("cannot join {left} ({left_kind}) with {right} ({right_kind}): kinds differ")]
    IncompatibleJoin {
        /// Select-side field.
        left: String,
        /// Select-side kind.
        left_kind: Kind,
        /// Join-side field.
        right: String,
        /// Join-side kind.
        right_kind: Kind,
    },

    /// A join field has a container kind.
    #[error("field {field} of kind {kind} cannot be used as a join key")]
    NotJoinable {
        /// Field name.
        field: String,
        /// Its kind.
        kind: Kind,
    },

    /// A join has no relation to join against.
    #[error("join has no relation")]
    MissingJoinRelation,

    /// A SELECT has no FROM clause.
    #[error("SELECT has no FROM clause")]
    MissingFrom,

    /// CREATE TABLE AS SELECT from a stream without aggregation.
    #[error("cannot create table {table} from non-aggregated stream {source_name}")]
    TableFromStream {
        /// Table being created.
        table: String,
        /// Stream selected from.
        source_name: String,
    },

    /// CREATE STREAM AS SELECT from a table.
    #[error("cannot create stream {stream} from table {source_name}")]
    StreamFromTable {
        /// Stream being created.
        stream: String,
        /// Table selected from.
        source_name: String,
    },

    /// CREATE TABLE AS SELECT from a windowed select.
    #[error("cannot create table {0} from a windowed select")]
    TableFromWindow(String),

    /// CREATE has both field definitions and a select source.
    #[error("CREATE {0} has both field definitions and AS SELECT")]
    ConflictingSource(String),

    /// CREATE has neither field definitions nor a select source.
    #[error("CREATE {0} needs field definitions or AS SELECT")]
    MissingSource(String),

    /// More than one field definition is marked primary.
    #[error("ambiguous primary key in {relation}: {first} and {second}")]
    AmbiguousPrimaryKey {
        /// Relation name.
        relation: String,
        /// First primary field.
        first: String,
        /// Second primary field.
        second: String,
    },

    /// INSERT has both a row and a select source.
    #[error("INSERT INTO {0} has both values and a select")]
    ConflictingInsert(String),

    /// A relation name is empty.
    #[error("{0} has an empty relation name")]
    EmptyRelation(&'static str),

    /// A value could not be turned into a literal.
    #[error("cannot serialize value: {0}")]
    Serialize(String),
}

impl BuildError {
    /// Returns the stable error code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::EmptyColumn | Self::MissingWhen | Self::EmptyList(_) => {
                ErrorCode::MalformedExpression
            }
            Self::EmptyFieldList(_) => ErrorCode::EmptyFieldList,
            Self::InvalidOperand { .. } | Self::Serialize(_) => ErrorCode::InvalidOperand,
            Self::InvalidParameter { .. }
            | Self::InvalidWindowDuration { .. }
            | Self::UnknownTimeUnit(_) => ErrorCode::InvalidParameter,
            Self::MissingAlias(_) => ErrorCode::MissingAlias,
            Self::RelationNotFound(_) => ErrorCode::RelationNotFound,
            Self::FieldNotFound { .. } => ErrorCode::FieldNotFound,
            Self::IncompatibleJoin { .. } | Self::NotJoinable { .. } | Self::MissingJoinRelation => {
                ErrorCode::IncompatibleJoin
            }
            Self::AmbiguousPrimaryKey { .. } => ErrorCode::AmbiguousPrimaryKey,
            Self::MissingFrom
            | Self::TableFromStream { .. }
            | Self::StreamFromTable { .. }
            | Self::TableFromWindow(_)
            | Self::ConflictingSource(_)
            | Self::MissingSource(_)
            | Self::ConflictingInsert(_)
            | Self::EmptyRelation(_) => ErrorCode::InvalidStatement,
        }
    }
}

/// Result type for builder operations.
pub type BuildResult<T> = std::result::Result<T, BuildError>;

/// One difference between two field sets.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldMismatch {
    /// The field exists on one side only.
    #[error("field {field} not found in {missing_from}")]
    NotFound {
        /// Field name.
        field: String,
        /// Relation (or side) lacking the field.
        missing_from: String,
    },

    /// The field exists on both sides with different kinds.
    #[error("field {field} kind mismatch: expected {expected}, got {actual}")]
    KindMismatch {
        /// Field name.
        field: String,
        /// Kind on the reference side.
        expected: Kind,
        /// Kind on the compared side.
        actual: Kind,
    },
}

impl FieldMismatch {
    /// Returns the field the mismatch is about.
    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::NotFound { field, .. } | Self::KindMismatch { field, .. } => field,
        }
    }
}

/// Schema extraction or reconciliation failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// More than one native field is marked primary.
    #[error("ambiguous primary key in {relation}: {first} and {second}")]
    AmbiguousPrimaryKey {
        /// Relation name.
        relation: String,
        /// First primary field.
        first: String,
        /// Second primary field.
        second: String,
    },

    /// A remote kind name is not recognised.
    #[error("unknown kind: {0}")]
    UnknownKind(String),

    /// A schema description could not be parsed.
    #[error("malformed schema description: {0}")]
    MalformedSchema(String),

    /// The relation is not registered.
    #[error("relation {0} not found in schema registry")]
    RelationNotFound(String),

    /// Two field sets disagree.
    #[error("{relation} does not match: {}", format_mismatches(.mismatches))]
    Mismatches {
        /// Relation name.
        relation: String,
        /// Every difference found.
        mismatches: Vec<FieldMismatch>,
    },
}

impl SchemaError {
    /// Returns the stable error code.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AmbiguousPrimaryKey { .. } => ErrorCode::AmbiguousPrimaryKey,
            Self::UnknownKind(_) => ErrorCode::UnknownKind,
            Self::MalformedSchema(_) => ErrorCode::MalformedSchema,
            Self::RelationNotFound(_) => ErrorCode::RelationNotFound,
            Self::Mismatches { mismatches, .. } => match mismatches.first() {
                Some(FieldMismatch::KindMismatch { .. }) => ErrorCode::KindMismatch,
                _ => ErrorCode::FieldNotFound,
            },
        }
    }
}

fn format_mismatches(mismatches: &[FieldMismatch]) -> String {
    mismatches
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for schema operations.
pub type SchemaResult<T> = std::result::Result<T, SchemaError>;

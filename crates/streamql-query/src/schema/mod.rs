//! Relation schemas and their reconciliation.
//!
//! A [`RelationSchema`] is built either from a native type through the
//! [`Record`] trait or from the engine's own description of a relation.
//! Schemas are cached in a [`SchemaRegistry`] shared by builders and the
//! [`Linter`].

mod field;
mod lint;
mod native;
mod registry;
mod remote;

pub use field::{RelationSchema, SearchField};
pub use lint::{compare_field, compare_fields, Linter};
pub use native::{native_struct_representation, NativeField, NativeKind, NativeType, Record};
pub use registry::SchemaRegistry;
pub use remote::{
    parse_columns, remote_fields_representation, remote_schema_representation, FieldDescription,
    FieldSchema, SourceDescription,
};

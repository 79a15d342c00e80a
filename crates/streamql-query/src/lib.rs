//! # streamql-query
//!
//! Builders for the streaming SQL dialect, plus the schema registry and
//! linter that keep native record types in step with remote relations.
//!
//! - **Expressions**: fields, comparisons, arithmetic, aggregates, CASE, windows
//! - **Clauses**: FROM, JOIN, WHERE, GROUP BY, HAVING, PARTITION BY, ORDER BY
//! - **Statements**: SELECT, CREATE, INSERT, DROP, DESCRIBE, LIST, TERMINATE
//! - **Schema**: native introspection, remote descriptions, registry, linter
//!
//! ## Example
//!
//! ```rust
//! use streamql_query::prelude::*;
//!
//! let query = select([f("id"), f("item")])
//!     .from("orders")
//!     .filter(f("qty").greater(10))
//!     .emit_changes();
//! assert_eq!(
//!     query.to_sql().unwrap(),
//!     "SELECT id, item FROM orders WHERE qty > 10 EMIT CHANGES;"
//! );
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod clause;
pub mod error;
pub mod expr;
pub mod kind;
pub mod schema;
pub mod statement;
pub mod value;

pub use error::{BuildError, BuildResult, FieldMismatch, SchemaError, SchemaResult};
pub use kind::Kind;
pub use statement::Statement;
pub use value::Value;

/// Everything needed to build statements.
pub mod prelude {
    pub use crate::clause::{
        GroupBy, Having, JoinExpr, JoinKind, OrderBy, PartitionBy, Relation, SortOrder, Where,
    };
    pub use crate::expr::{
        and, avg, case, collect_list, collect_set, count, count_all, earliest_by_offset, f,
        histogram, latest_by_offset, max, min, or, sum, topk, topk_distinct, Expr, Expression,
        Field, Operators, TimeUnit, WindowDuration, WindowExpr,
    };
    pub use crate::kind::Kind;
    pub use crate::schema::{NativeField, Record, SchemaRegistry, SearchField};
    pub use crate::statement::{
        insert_into, select, Create, Describe, DropRelation, Insert, List, Metadata, Select,
        Statement, Terminate,
    };
    pub use crate::value::Value;
    pub use streamql_common::RelationKind;
}

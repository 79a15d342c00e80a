//! Statement builders.
//!
//! Every builder method consumes and returns the builder, and nothing is
//! validated until [`Expression::to_sql`] is called. Serialization is
//! idempotent: the same builder state always yields the same text.

mod create;
mod describe;
mod drop;
mod insert;
mod select;

pub use create::{Create, Metadata};
pub use describe::{Describe, List, ListKind, Terminate};
pub use drop::DropRelation;
pub use insert::{insert_into, Insert};
pub use select::{select, Select};

use streamql_common::{QUERY_ENDPOINT, STATEMENT_ENDPOINT};

use crate::error::BuildResult;
use crate::expr::Expression;

/// Any statement the engine accepts.
#[derive(Debug, Clone)]
pub enum Statement {
    /// SELECT, pull or push.
    Select(Select),
    /// CREATE STREAM / TABLE.
    Create(Create),
    /// INSERT INTO.
    Insert(Insert),
    /// DROP STREAM / TABLE.
    Drop(DropRelation),
    /// DESCRIBE.
    Describe(Describe),
    /// LIST.
    List(List),
    /// TERMINATE.
    Terminate(Terminate),
}

impl Statement {
    /// Endpoint path the statement is posted to.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Statement::Select(_) => QUERY_ENDPOINT,
            _ => STATEMENT_ENDPOINT,
        }
    }

    /// Short statement name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Statement::Select(_) => "SELECT",
            Statement::Create(_) => "CREATE",
            Statement::Insert(_) => "INSERT",
            Statement::Drop(_) => "DROP",
            Statement::Describe(_) => "DESCRIBE",
            Statement::List(_) => "LIST",
            Statement::Terminate(_) => "TERMINATE",
        }
    }

    /// True for SELECT .. EMIT CHANGES.
    pub fn is_push(&self) -> bool {
        matches!(self, Statement::Select(select) if select.is_push())
    }
}

impl Expression for Statement {
    fn to_sql(&self) -> BuildResult<String> {
        match self {
            Statement::Select(s) => s.to_sql(),
            Statement::Create(s) => s.to_sql(),
            Statement::Insert(s) => s.to_sql(),
            Statement::Drop(s) => s.to_sql(),
            Statement::Describe(s) => s.to_sql(),
            Statement::List(s) => s.to_sql(),
            Statement::Terminate(s) => s.to_sql(),
        }
    }
}

macro_rules! impl_from_statement {
    ($($variant:ident($t:ty)),*) => {
        $(
            impl From<$t> for Statement {
                fn from(statement: $t) -> Self {
                    Statement::$variant(statement)
                }
            }
        )*
    };
}

impl_from_statement!(
    Select(Select),
    Create(Create),
    Insert(Insert),
    Drop(DropRelation),
    Describe(Describe),
    List(List),
    Terminate(Terminate)
);

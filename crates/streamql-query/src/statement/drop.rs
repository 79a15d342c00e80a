//! DROP STREAM / DROP TABLE.

use streamql_common::RelationKind;

use crate::error::{BuildError, BuildResult};
use crate::expr::Expression;

/// `DROP STREAM|TABLE [IF EXISTS] name [DELETE TOPIC];`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropRelation {
    kind: RelationKind,
    name: String,
    if_exists: bool,
    delete_topic: bool,
}

impl DropRelation {
    /// Drops a relation of the given kind.
    pub fn new(kind: RelationKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            if_exists: false,
            delete_topic: false,
        }
    }

    /// `DROP STREAM name`
    pub fn stream(name: impl Into<String>) -> Self {
        Self::new(RelationKind::Stream, name)
    }

    /// `DROP TABLE name`
    pub fn table(name: impl Into<String>) -> Self {
        Self::new(RelationKind::Table, name)
    }

    /// Tolerates a missing relation.
    #[must_use]
    pub fn if_exists(mut self) -> Self {
        self.if_exists = true;
        self
    }

    /// Also deletes the backing topic.
    #[must_use]
    pub fn delete_topic(mut self) -> Self {
        self.delete_topic = true;
        self
    }
}

impl Expression for DropRelation {
    fn to_sql(&self) -> BuildResult<String> {
        if self.name.trim().is_empty() {
            return Err(BuildError::EmptyRelation("DROP"));
        }
        let mut sql = format!("DROP {}", self.kind.as_sql());
        if self.if_exists {
            sql.push_str(" IF EXISTS");
        }
        sql.push(' ');
        sql.push_str(&self.name);
        if self.delete_topic {
            sql.push_str(" DELETE TOPIC");
        }
        sql.push(';');
        Ok(sql)
    }
}

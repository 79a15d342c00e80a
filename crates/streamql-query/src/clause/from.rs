//! Source relations.

use std::fmt;

use streamql_common::RelationKind;

use crate::error::{BuildError, BuildResult};
use crate::expr::Expression;

/// A relation named in a FROM or JOIN clause.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Relation {
    name: String,
    alias: Option<String>,
    kind: Option<RelationKind>,
}

impl Relation {
    /// A relation whose kind is looked up in the registry when needed.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            kind: None,
        }
    }

    /// A relation known to be a stream.
    pub fn stream(name: impl Into<String>) -> Self {
        Self {
            kind: Some(RelationKind::Stream),
            ..Self::new(name)
        }
    }

    /// A relation known to be a table.
    pub fn table(name: impl Into<String>) -> Self {
        Self {
            kind: Some(RelationKind::Table),
            ..Self::new(name)
        }
    }

    /// Sets the alias used to qualify fields.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Relation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Alias, if any.
    pub fn alias_name(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Declared kind, if any.
    pub fn kind(&self) -> Option<RelationKind> {
        self.kind
    }

    /// True if `qualifier` names this relation by alias or by name.
    pub fn answers_to(&self, qualifier: &str) -> bool {
        self.alias
            .as_deref()
            .is_some_and(|alias| alias.eq_ignore_ascii_case(qualifier))
            || self.name.eq_ignore_ascii_case(qualifier)
    }
}

impl Expression for Relation {
    fn to_sql(&self) -> BuildResult<String> {
        if self.name.trim().is_empty() {
            return Err(BuildError::EmptyRelation("FROM"));
        }
        match self.alias.as_deref().filter(|a| !a.trim().is_empty()) {
            Some(alias) => Ok(format!("{} {}", self.name, alias)),
            None => Ok(self.name.clone()),
        }
    }
}

impl From<&str> for Relation {
    fn from(name: &str) -> Self {
        Relation::new(name)
    }
}

impl From<String> for Relation {
    fn from(name: String) -> Self {
        Relation::new(name)
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

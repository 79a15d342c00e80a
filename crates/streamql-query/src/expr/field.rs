//! Column references.

use std::fmt;

use super::Expression;
use crate::error::{BuildError, BuildResult};

/// A reference to a column, optionally qualified by a relation or alias.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    relation: Option<String>,
    column: String,
    alias: Option<String>,
}

/// Parses `relation.column` or `column` into a [`Field`].
pub fn f(name: &str) -> Field {
    Field::parse(name)
}

impl Field {
    /// Creates an unqualified field.
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            relation: None,
            column: column.into(),
            alias: None,
        }
    }

    /// Creates a field qualified by a relation name or alias.
    pub fn qualified(relation: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            relation: Some(relation.into()),
            column: column.into(),
            alias: None,
        }
    }

    /// Parses `relation.column` or `column`. `*` is accepted as a column.
    pub fn parse(name: &str) -> Self {
        match name.trim().split_once('.') {
            Some((relation, column)) if !relation.is_empty() => {
                Self::qualified(relation, column)
            }
            _ => Self::new(name.trim()),
        }
    }

    /// Returns a copy carrying an output alias.
    #[must_use]
    pub fn alias(&self, alias: impl Into<String>) -> Self {
        Self {
            alias: Some(alias.into()),
            ..self.clone()
        }
    }

    /// Returns a copy qualified by `relation`.
    #[must_use]
    pub fn of(&self, relation: impl Into<String>) -> Self {
        Self {
            relation: Some(relation.into()),
            ..self.clone()
        }
    }

    /// Returns the column name.
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Returns the qualifier, if any.
    pub fn relation(&self) -> Option<&str> {
        self.relation.as_deref()
    }

    /// Returns the output alias, if any. A blank alias counts as none.
    pub fn alias_name(&self) -> Option<&str> {
        self.alias.as_deref().filter(|alias| !alias.trim().is_empty())
    }

    /// Serializes the reference without its alias.
    pub fn operand_sql(&self) -> BuildResult<String> {
        if self.column.trim().is_empty() {
            return Err(BuildError::EmptyColumn);
        }
        Ok(match &self.relation {
            Some(relation) => format!("{}.{}", relation, self.column),
            None => self.column.clone(),
        })
    }
}

impl Expression for Field {
    fn to_sql(&self) -> BuildResult<String> {
        let body = self.operand_sql()?;
        match self.alias_name() {
            Some(alias) => Ok(format!("{} AS {}", body, alias)),
            _ => Ok(body),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.relation {
            Some(relation) => write!(f, "{}.{}", relation, self.column),
            None => f.write_str(&self.column),
        }
    }
}

//! ORDER BY.

use crate::error::{BuildError, BuildResult};
use crate::expr::{Expr, Expression};

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortOrder {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl SortOrder {
    /// Returns the keyword.
    pub const fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Ordering keys.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrderBy {
    keys: Vec<(Expr, SortOrder)>,
}

impl OrderBy {
    /// Creates an empty ordering.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an ascending key.
    #[must_use]
    pub fn asc(self, key: impl Into<Expr>) -> Self {
        self.key(key, SortOrder::Asc)
    }

    /// Adds a descending key.
    #[must_use]
    pub fn desc(self, key: impl Into<Expr>) -> Self {
        self.key(key, SortOrder::Desc)
    }

    /// Adds a key with an explicit direction.
    #[must_use]
    pub fn key(mut self, key: impl Into<Expr>, order: SortOrder) -> Self {
        self.keys.push((key.into(), order));
        self
    }
}

impl Expression for OrderBy {
    fn to_sql(&self) -> BuildResult<String> {
        if self.keys.is_empty() {
            return Err(BuildError::EmptyFieldList("ORDER BY"));
        }
        let parts = self
            .keys
            .iter()
            .map(|(key, order)| Ok(format!("{} {}", key.operand_sql()?, order.as_sql())))
            .collect::<BuildResult<Vec<_>>>()?;
        Ok(format!("ORDER BY {}", parts.join(", ")))
    }
}

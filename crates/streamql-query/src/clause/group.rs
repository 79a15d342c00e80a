//! GROUP BY and PARTITION BY.

use super::operand_list;
use crate::error::BuildResult;
use crate::expr::{Expr, Expression};

/// Grouping keys of an aggregation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupBy {
    keys: Vec<Expr>,
}

impl GroupBy {
    /// Groups by `keys`.
    pub fn new<I, E>(keys: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Adds a key.
    #[must_use]
    pub fn key(mut self, key: impl Into<Expr>) -> Self {
        self.keys.push(key.into());
        self
    }

    /// The grouping keys.
    pub fn keys(&self) -> &[Expr] {
        &self.keys
    }
}

impl Expression for GroupBy {
    fn to_sql(&self) -> BuildResult<String> {
        Ok(format!("GROUP BY {}", operand_list("GROUP BY", &self.keys, false)?))
    }
}

/// Repartitioning keys of a stream.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PartitionBy {
    keys: Vec<Expr>,
}

impl PartitionBy {
    /// Partitions by `keys`.
    pub fn new<I, E>(keys: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }
}

impl Expression for PartitionBy {
    fn to_sql(&self) -> BuildResult<String> {
        Ok(format!(
            "PARTITION BY {}",
            operand_list("PARTITION BY", &self.keys, false)?
        ))
    }
}

//! WHERE and HAVING.

use crate::error::{BuildError, BuildResult};
use crate::expr::{Expr, Expression, LogicalExpr, LogicalOp};

/// A row filter. Aggregates are rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct Where {
    condition: Expr,
}

impl Where {
    /// Wraps a condition.
    pub fn new(condition: impl Into<Expr>) -> Self {
        Self {
            condition: condition.into(),
        }
    }

    /// Returns a filter requiring both this condition and `other`.
    #[must_use]
    pub fn and(self, other: impl Into<Expr>) -> Self {
        Self::new(conjoin(self.condition, other.into()))
    }

    /// The filter condition.
    pub fn condition(&self) -> &Expr {
        &self.condition
    }
}

impl Expression for Where {
    fn to_sql(&self) -> BuildResult<String> {
        if self.condition.contains_aggregate() {
            return Err(BuildError::InvalidOperand {
                operator: "WHERE",
                reason: "aggregate functions belong in HAVING".to_string(),
            });
        }
        Ok(format!("WHERE {}", self.condition.operand_sql()?))
    }
}

/// A filter over aggregated groups.
#[derive(Debug, Clone, PartialEq)]
pub struct Having {
    condition: Expr,
}

impl Having {
    /// Wraps a condition.
    pub fn new(condition: impl Into<Expr>) -> Self {
        Self {
            condition: condition.into(),
        }
    }

    /// Returns a filter requiring both this condition and `other`.
    #[must_use]
    pub fn and(self, other: impl Into<Expr>) -> Self {
        Self::new(conjoin(self.condition, other.into()))
    }

    /// The filter condition.
    pub fn condition(&self) -> &Expr {
        &self.condition
    }
}

impl Expression for Having {
    fn to_sql(&self) -> BuildResult<String> {
        Ok(format!("HAVING {}", self.condition.operand_sql()?))
    }
}

fn conjoin(current: Expr, next: Expr) -> Expr {
    match current {
        Expr::Logical(list) if list.op() == LogicalOp::And => list.push(next).into(),
        other => LogicalExpr::and(vec![other, next]).into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{count, f, Operators};

    #[test]
    fn test_where() {
        let clause = Where::new(f("qty").greater(3)).and(f("item").like("A%"));
        assert_eq!(clause.to_sql().unwrap(), "WHERE (qty > 3 AND item LIKE 'A%')");
        let clause = clause.and(f("id").is_not_null());
        assert_eq!(
            clause.to_sql().unwrap(),
            "WHERE (qty > 3 AND item LIKE 'A%' AND id IS NOT NULL)"
        );
    }

    #[test]
    fn test_where_rejects_aggregates() {
        let clause = Where::new(count(f("id")).greater(1));
        assert!(matches!(
            clause.to_sql(),
            Err(BuildError::InvalidOperand { operator: "WHERE", .. })
        ));
    }

    #[test]
    fn test_having() {
        let clause = Having::new(count(f("id")).alias("n").greater(1));
        assert_eq!(clause.to_sql().unwrap(), "HAVING COUNT(id) > 1");
    }
}

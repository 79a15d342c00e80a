//! CASE expressions.

use super::{Expr, Expression, IntoOperand, Operand};
use crate::error::{BuildError, BuildResult};

/// `CASE WHEN .. THEN .. [ELSE ..] END AS alias`
///
/// At least one WHEN/THEN pair and a non-empty alias are required. A missing
/// ELSE renders as `ELSE NULL`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CaseExpr {
    branches: Vec<(Expr, Operand)>,
    otherwise: Option<Operand>,
    alias: Option<String>,
}

/// Starts an empty CASE expression.
pub fn case() -> CaseExpr {
    CaseExpr::default()
}

impl CaseExpr {
    /// Adds a `WHEN condition THEN result` branch.
    #[must_use]
    pub fn when(mut self, condition: impl Into<Expr>, result: impl IntoOperand) -> Self {
        self.branches.push((condition.into(), result.into_operand()));
        self
    }

    /// Sets the ELSE result.
    #[must_use]
    pub fn otherwise(mut self, result: impl IntoOperand) -> Self {
        self.otherwise = Some(result.into_operand());
        self
    }

    /// Returns a copy carrying an output alias.
    #[must_use]
    pub fn alias(&self, alias: impl Into<String>) -> Self {
        Self {
            alias: Some(alias.into()),
            ..self.clone()
        }
    }

    /// Returns the output alias, if any. A blank alias counts as none.
    pub fn alias_name(&self) -> Option<&str> {
        self.alias.as_deref().filter(|alias| !alias.trim().is_empty())
    }

    pub(crate) fn contains_aggregate(&self) -> bool {
        self.branches
            .iter()
            .any(|(c, r)| c.contains_aggregate() || r.contains_aggregate())
            || self.otherwise.as_ref().is_some_and(Operand::contains_aggregate)
    }

    /// Serializes the expression without its alias, still requiring one.
    pub fn operand_sql(&self) -> BuildResult<String> {
        if self.branches.is_empty() {
            return Err(BuildError::MissingWhen);
        }
        if self.alias_name().is_none() {
            return Err(BuildError::MissingAlias("CASE"));
        }

        let mut sql = String::from("CASE");
        for (condition, result) in &self.branches {
            sql.push_str(" WHEN ");
            sql.push_str(&condition.operand_sql()?);
            sql.push_str(" THEN ");
            sql.push_str(&result.to_sql()?);
        }
        sql.push_str(" ELSE ");
        match &self.otherwise {
            Some(result) => sql.push_str(&result.to_sql()?),
            None => sql.push_str("NULL"),
        }
        sql.push_str(" END");
        Ok(sql)
    }
}

impl Expression for CaseExpr {
    fn to_sql(&self) -> BuildResult<String> {
        let body = self.operand_sql()?;
        let alias = self.alias_name().ok_or(BuildError::MissingAlias("CASE"))?;
        Ok(format!("{} AS {}", body, alias))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{f, Operators};

    #[test]
    fn test_case_with_else() {
        let expr = case()
            .when(f("qty").greater(100), "bulk")
            .when(f("qty").greater(10), "medium")
            .otherwise("small")
            .alias("size");
        assert_eq!(
            expr.to_sql().unwrap(),
            "CASE WHEN qty > 100 THEN 'bulk' WHEN qty > 10 THEN 'medium' ELSE 'small' END AS size"
        );
    }

    #[test]
    fn test_case_without_else() {
        let expr = case().when(f("paid").equal(true), 1).alias("p");
        assert_eq!(
            expr.to_sql().unwrap(),
            "CASE WHEN paid = TRUE THEN 1 ELSE NULL END AS p"
        );
    }

    #[test]
    fn test_case_requires_when_and_alias() {
        assert_eq!(case().alias("x").to_sql(), Err(BuildError::MissingWhen));
        assert_eq!(
            case().when(f("a").is_null(), 0).to_sql(),
            Err(BuildError::MissingAlias("CASE"))
        );
        assert_eq!(
            case().when(f("a").is_null(), 0).alias(" ").to_sql(),
            Err(BuildError::MissingAlias("CASE"))
        );
    }
}

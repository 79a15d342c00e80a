//! Comparison predicates and AND/OR lists.

use std::fmt;

use super::{Expr, Expression, Operand};
use crate::error::{BuildError, BuildResult};
use crate::value::Value;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `!=`
    NotEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `LIKE`
    Like,
    /// `IN`
    In,
    /// `NOT IN`
    NotIn,
    /// `IS NULL`
    IsNull,
    /// `IS NOT NULL`
    IsNotNull,
    /// `BETWEEN .. AND ..`
    Between,
}

impl CompareOp {
    /// Returns the operator keyword.
    pub const fn as_sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "!=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Like => "LIKE",
            CompareOp::In => "IN",
            CompareOp::NotIn => "NOT IN",
            CompareOp::IsNull => "IS NULL",
            CompareOp::IsNotNull => "IS NOT NULL",
            CompareOp::Between => "BETWEEN",
        }
    }

    /// Returns true for `>`, `>=`, `<`, `<=`.
    pub const fn is_ordering(&self) -> bool {
        matches!(
            self,
            CompareOp::Gt | CompareOp::GtEq | CompareOp::Lt | CompareOp::LtEq
        )
    }

    /// Returns true for `IN` and `NOT IN`.
    pub const fn is_set(&self) -> bool {
        matches!(self, CompareOp::In | CompareOp::NotIn)
    }

    /// Returns true for operators without a right-hand operand.
    pub const fn is_unary(&self) -> bool {
        matches!(self, CompareOp::IsNull | CompareOp::IsNotNull)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A comparison between an expression and an operand.
#[derive(Debug, Clone, PartialEq)]
pub struct BooleanExpr {
    left: Expr,
    op: CompareOp,
    right: Option<Operand>,
    upper: Option<Operand>,
}

impl BooleanExpr {
    /// Creates a comparison. Operand compatibility is checked on serialization.
    pub fn new(left: impl Into<Expr>, op: CompareOp, right: Option<Operand>) -> Self {
        Self {
            left: left.into(),
            op,
            right,
            upper: None,
        }
    }

    /// Creates `left BETWEEN low AND high`.
    pub fn between(left: impl Into<Expr>, low: Operand, high: Operand) -> Self {
        Self {
            left: left.into(),
            op: CompareOp::Between,
            right: Some(low),
            upper: Some(high),
        }
    }

    /// Returns the operator.
    pub fn op(&self) -> CompareOp {
        self.op
    }

    /// Returns the left-hand expression.
    pub fn left(&self) -> &Expr {
        &self.left
    }

    /// Returns the right-hand operand.
    pub fn right(&self) -> Option<&Operand> {
        self.right.as_ref()
    }

    /// `(self AND other)`
    #[must_use]
    pub fn and(self, other: impl Into<Expr>) -> LogicalExpr {
        LogicalExpr::and(vec![Expr::from(self), other.into()])
    }

    /// `(self OR other)`
    #[must_use]
    pub fn or(self, other: impl Into<Expr>) -> LogicalExpr {
        LogicalExpr::or(vec![Expr::from(self), other.into()])
    }

    pub(crate) fn contains_aggregate(&self) -> bool {
        self.left.contains_aggregate()
            || self.right.as_ref().is_some_and(Operand::contains_aggregate)
            || self.upper.as_ref().is_some_and(Operand::contains_aggregate)
    }

    fn invalid(&self, reason: impl Into<String>) -> BuildError {
        BuildError::InvalidOperand {
            operator: self.op.as_sql(),
            reason: reason.into(),
        }
    }

    fn required_right(&self) -> BuildResult<&Operand> {
        self.right
            .as_ref()
            .ok_or_else(|| self.invalid("missing right-hand operand"))
    }

    fn check_orderable(&self, operand: &Operand) -> BuildResult<()> {
        match operand {
            Operand::Value(value) if !value.is_orderable() => Err(self.invalid(format!(
                "{} is not orderable",
                value.to_sql()
            ))),
            _ => Ok(()),
        }
    }

    fn validate(&self) -> BuildResult<()> {
        match self.op {
            CompareOp::IsNull | CompareOp::IsNotNull => {
                if self.right.is_some() {
                    return Err(self.invalid("takes no right-hand operand"));
                }
            }
            CompareOp::Gt | CompareOp::GtEq | CompareOp::Lt | CompareOp::LtEq => {
                self.check_orderable(self.required_right()?)?;
            }
            CompareOp::In | CompareOp::NotIn => match self.required_right()? {
                Operand::Value(Value::Array(items)) if items.is_empty() => {
                    return Err(self.invalid("set is empty"));
                }
                Operand::Value(Value::Array(_)) => {}
                other => {
                    return Err(self.invalid(format!(
                        "{} is not iterable",
                        other.to_sql().unwrap_or_default()
                    )));
                }
            },
            CompareOp::Like => match self.required_right()? {
                Operand::Value(Value::String(_)) => {}
                _ => return Err(self.invalid("pattern must be a string")),
            },
            CompareOp::Eq | CompareOp::NotEq => {
                if let Operand::Value(Value::Null) = self.required_right()? {
                    return Err(self.invalid("compare with NULL using IS NULL"));
                }
            }
            CompareOp::Between => {
                self.check_orderable(self.required_right()?)?;
                let upper = self
                    .upper
                    .as_ref()
                    .ok_or_else(|| self.invalid("missing upper bound"))?;
                self.check_orderable(upper)?;
            }
        }
        Ok(())
    }
}

impl Expression for BooleanExpr {
    fn to_sql(&self) -> BuildResult<String> {
        self.validate()?;
        let left = self.left.operand_sql()?;

        match (&self.right, &self.upper) {
            (None, _) => Ok(format!("{} {}", left, self.op)),
            (Some(Operand::Value(Value::Array(items))), _) if self.op.is_set() => Ok(format!(
                "{} {} ({})",
                left,
                self.op,
                items
                    .iter()
                    .map(Value::try_to_sql)
                    .collect::<BuildResult<Vec<_>>>()?
                    .join(", ")
            )),
            (Some(low), Some(high)) => Ok(format!(
                "{} {} {} AND {}",
                left,
                self.op,
                low.to_sql()?,
                high.to_sql()?
            )),
            (Some(right), None) => Ok(format!("{} {} {}", left, self.op, right.to_sql()?)),
        }
    }
}

/// Logical connective of an [`LogicalExpr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    /// All members must hold.
    And,
    /// Any member must hold.
    Or,
}

impl LogicalOp {
    /// Returns the keyword.
    pub const fn as_sql(&self) -> &'static str {
        match self {
            LogicalOp::And => "AND",
            LogicalOp::Or => "OR",
        }
    }
}

/// A parenthesized AND/OR list of expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalExpr {
    op: LogicalOp,
    items: Vec<Expr>,
}

/// `(a AND b AND ..)`
pub fn and<I, E>(items: I) -> LogicalExpr
where
    I: IntoIterator<Item = E>,
    E: Into<Expr>,
{
    LogicalExpr::and(items.into_iter().map(Into::into).collect())
}

/// `(a OR b OR ..)`
pub fn or<I, E>(items: I) -> LogicalExpr
where
    I: IntoIterator<Item = E>,
    E: Into<Expr>,
{
    LogicalExpr::or(items.into_iter().map(Into::into).collect())
}

impl LogicalExpr {
    /// Creates an AND list.
    pub fn and(items: Vec<Expr>) -> Self {
        Self {
            op: LogicalOp::And,
            items,
        }
    }

    /// Creates an OR list.
    pub fn or(items: Vec<Expr>) -> Self {
        Self {
            op: LogicalOp::Or,
            items,
        }
    }

    /// Appends a member.
    #[must_use]
    pub fn push(mut self, item: impl Into<Expr>) -> Self {
        self.items.push(item.into());
        self
    }

    /// Returns the members.
    pub fn items(&self) -> &[Expr] {
        &self.items
    }

    /// Returns the connective.
    pub fn op(&self) -> LogicalOp {
        self.op
    }
}

impl Expression for LogicalExpr {
    fn to_sql(&self) -> BuildResult<String> {
        match self.items.as_slice() {
            [] => Err(BuildError::EmptyList(self.op.as_sql())),
            [single] => single.operand_sql(),
            items => {
                let parts = items
                    .iter()
                    .map(Expr::operand_sql)
                    .collect::<BuildResult<Vec<_>>>()?;
                Ok(format!(
                    "({})",
                    parts.join(&format!(" {} ", self.op.as_sql()))
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{count, f, Operators};

    #[test]
    fn test_equal() {
        assert_eq!(f("orders.id").equal(5).to_sql().unwrap(), "orders.id = 5");
        assert_eq!(f("name").equal("bob").to_sql().unwrap(), "name = 'bob'");
        assert_eq!(f("a").equal(f("b.a")).to_sql().unwrap(), "a = b.a");
    }

    #[test]
    fn test_ordering_rejects_non_orderable() {
        let err = f("flag").greater(true).to_sql().unwrap_err();
        assert!(matches!(err, BuildError::InvalidOperand { operator: ">", .. }));

        assert!(f("tags").less(vec![1, 2]).to_sql().is_err());
        assert_eq!(f("name").less_eq("m").to_sql().unwrap(), "name <= 'm'");
        assert_eq!(
            f("payload").greater_eq(Value::Bytes(vec![1])).to_sql().unwrap(),
            "payload >= TO_BYTES('01', 'hex')"
        );
    }

    #[test]
    fn test_set_operators() {
        assert_eq!(
            f("status").in_set(["new", "paid"]).to_sql().unwrap(),
            "status IN ('new', 'paid')"
        );
        assert_eq!(
            f("id").not_in_set(vec![1, 2]).to_sql().unwrap(),
            "id NOT IN (1, 2)"
        );
        assert!(f("id").in_set(5).to_sql().is_err());
        assert!(f("id").in_set(Vec::<i32>::new()).to_sql().is_err());
    }

    #[test]
    fn test_null_checks() {
        assert_eq!(f("note").is_null().to_sql().unwrap(), "note IS NULL");
        assert_eq!(f("note").is_not_null().to_sql().unwrap(), "note IS NOT NULL");

        let bad = BooleanExpr::new(f("note"), CompareOp::IsNull, Some(Operand::Value(Value::Null)));
        assert!(bad.to_sql().is_err());
        assert!(f("note").equal(Value::Null).to_sql().is_err());
    }

    #[test]
    fn test_like_and_between() {
        assert_eq!(f("name").like("a%").to_sql().unwrap(), "name LIKE 'a%'");
        assert!(f("name").like(3).to_sql().is_err());
        assert_eq!(
            f("qty").between(1, 10).to_sql().unwrap(),
            "qty BETWEEN 1 AND 10"
        );
        assert!(f("qty").between(false, 10).to_sql().is_err());
    }

    #[test]
    fn test_logical_lists() {
        let expr = f("a").equal(1).and(f("b").greater(2));
        assert_eq!(expr.to_sql().unwrap(), "(a = 1 AND b > 2)");

        let nested = or([Expr::from(expr), Expr::from(f("c").is_null())]);
        assert_eq!(nested.to_sql().unwrap(), "((a = 1 AND b > 2) OR c IS NULL)");

        assert_eq!(and([f("x").equal(1)]).to_sql().unwrap(), "x = 1");
        assert_eq!(
            and(Vec::<Expr>::new()).to_sql(),
            Err(BuildError::EmptyList("AND"))
        );
    }

    #[test]
    fn test_nested_failure_aborts() {
        let expr = f("a").equal(1).and(f("").equal(2));
        assert_eq!(expr.to_sql(), Err(BuildError::EmptyColumn));
    }

    #[test]
    fn test_aggregate_predicate() {
        assert_eq!(count(f("id")).greater(3).to_sql().unwrap(), "COUNT(id) > 3");
    }
}

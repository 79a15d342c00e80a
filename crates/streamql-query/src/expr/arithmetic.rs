//! Binary arithmetic.

use std::fmt;

use super::{Expr, Expression, Operand};
use crate::error::{BuildError, BuildResult};
use crate::value::Value;

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticOp {
    /// `+`
    Add,
    /// `-`
    Subtract,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `%`
    Modulo,
}

impl ArithmeticOp {
    /// Returns the operator symbol.
    pub const fn as_sql(&self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Subtract => "-",
            ArithmeticOp::Multiply => "*",
            ArithmeticOp::Divide => "/",
            ArithmeticOp::Modulo => "%",
        }
    }
}

impl fmt::Display for ArithmeticOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// `( left op right )`, where `left` may itself be arithmetic.
#[derive(Debug, Clone, PartialEq)]
pub struct ArithmeticExpr {
    left: Expr,
    op: ArithmeticOp,
    right: Operand,
    alias: Option<String>,
}

impl ArithmeticExpr {
    /// Creates an arithmetic node.
    pub fn new(left: impl Into<Expr>, op: ArithmeticOp, right: Operand) -> Self {
        Self {
            left: left.into(),
            op,
            right,
            alias: None,
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

    /// Returns the output alias, if any. A blank alias counts as none.
    pub fn alias_name(&self) -> Option<&str> {
        self.alias.as_deref().filter(|alias| !alias.trim().is_empty())
    }

    pub(crate) fn contains_aggregate(&self) -> bool {
        self.left.contains_aggregate() || self.right.contains_aggregate()
    }

    /// Serializes the node without its alias.
    pub fn operand_sql(&self) -> BuildResult<String> {
        if let Operand::Value(value) = &self.right {
            if matches!(value, Value::Null | Value::Array(_) | Value::Map(_)) {
                return Err(BuildError::InvalidOperand {
                    operator: self.op.as_sql(),
                    reason: format!("{} is not a scalar", value.to_sql()),
                });
            }
        }
        Ok(format!(
            "( {} {} {} )",
            self.left.operand_sql()?,
            self.op,
            self.right.to_sql()?
        ))
    }
}

impl Expression for ArithmeticExpr {
    fn to_sql(&self) -> BuildResult<String> {
        let body = self.operand_sql()?;
        match self.alias_name() {
            Some(alias) => Ok(format!("{} AS {}", body, alias)),
            _ => Ok(body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{f, Operators};

    #[test]
    fn test_simple() {
        assert_eq!(f("a").plus(1).to_sql().unwrap(), "( a + 1 )");
        assert_eq!(f("price").multiply(f("qty")).to_sql().unwrap(), "( price * qty )");
    }

    #[test]
    fn test_nested_left() {
        let expr = f("a").plus(f("b")).multiply(f("c")).alias("total");
        assert_eq!(expr.to_sql().unwrap(), "( ( a + b ) * c ) AS total");
    }

    #[test]
    fn test_literal_right_formatting() {
        assert_eq!(f("name").plus("x").to_sql().unwrap(), "( name + 'x' )");
        assert_eq!(f("ratio").divide(2.5).to_sql().unwrap(), "( ratio / 2.5 )");
    }

    #[test]
    fn test_rejects_container_and_null() {
        assert!(f("a").minus(vec![1]).to_sql().is_err());
        assert!(f("a").modulo(Value::Null).to_sql().is_err());
    }

    #[test]
    fn test_arithmetic_in_predicate() {
        let expr = f("a").plus(1).greater(10);
        assert_eq!(expr.to_sql().unwrap(), "( a + 1 ) > 10");
    }
}

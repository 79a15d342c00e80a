//! Composable expressions.
//!
//! Every node serializes through [`Expression::to_sql`], which either yields
//! the complete dialect text or the first validation error found in the
//! subtree. Operators take `&self` and return new nodes, so a field can be
//! reused across several predicates.
//!
//! ```
//! use streamql_query::prelude::*;
//!
//! let id = f("orders.id");
//! assert_eq!(id.equal(5).to_sql().unwrap(), "orders.id = 5");
//! assert_eq!(count(f("id")).alias("n").to_sql().unwrap(), "COUNT(id) AS n");
//! ```

mod aggregate;
mod arithmetic;
mod boolean;
mod case;
mod field;
mod window;

pub use aggregate::*;
pub use arithmetic::*;
pub use boolean::*;
pub use case::*;
pub use field::*;
pub use window::*;

use crate::error::BuildResult;
use crate::value::Value;

/// A node that can be serialized into dialect text.
pub trait Expression {
    /// Serializes the node, failing with the first validation error.
    fn to_sql(&self) -> BuildResult<String>;
}

/// Any value-producing expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A column reference.
    Field(Field),
    /// A literal.
    Literal(Value),
    /// A comparison predicate.
    Boolean(Box<BooleanExpr>),
    /// An AND/OR list.
    Logical(LogicalExpr),
    /// Logical negation.
    Not(Box<Expr>),
    /// Binary arithmetic.
    Arithmetic(Box<ArithmeticExpr>),
    /// Aggregate function call.
    Aggregate(Box<AggregateExpr>),
    /// CASE expression.
    Case(Box<CaseExpr>),
}

impl Expr {
    /// Serializes the expression as an operand: without any alias.
    pub fn operand_sql(&self) -> BuildResult<String> {
        match self {
            Expr::Field(field) => field.operand_sql(),
            Expr::Literal(value) => value.try_to_sql(),
            Expr::Boolean(expr) => expr.to_sql(),
            Expr::Logical(list) => list.to_sql(),
            Expr::Not(inner) => Ok(format!("NOT ({})", inner.operand_sql()?)),
            Expr::Arithmetic(expr) => expr.operand_sql(),
            Expr::Aggregate(expr) => expr.operand_sql(),
            Expr::Case(expr) => expr.operand_sql(),
        }
    }

    /// Returns the alias, if the node carries one.
    pub fn alias_name(&self) -> Option<&str> {
        match self {
            Expr::Field(field) => field.alias_name(),
            Expr::Arithmetic(expr) => expr.alias_name(),
            Expr::Aggregate(expr) => expr.alias_name(),
            Expr::Case(expr) => expr.alias_name(),
            _ => None,
        }
    }

    /// Returns true if an aggregate appears anywhere in the tree.
    pub fn contains_aggregate(&self) -> bool {
        match self {
            Expr::Aggregate(_) => true,
            Expr::Field(_) | Expr::Literal(_) => false,
            Expr::Boolean(expr) => expr.contains_aggregate(),
            Expr::Logical(list) => list.items().iter().any(Expr::contains_aggregate),
            Expr::Not(inner) => inner.contains_aggregate(),
            Expr::Arithmetic(expr) => expr.contains_aggregate(),
            Expr::Case(expr) => expr.contains_aggregate(),
        }
    }

    /// Returns the field if this expression is a bare column reference.
    pub fn as_field(&self) -> Option<&Field> {
        match self {
            Expr::Field(field) => Some(field),
            _ => None,
        }
    }

    /// Negates the expression.
    #[must_use]
    pub fn negate(self) -> Expr {
        Expr::Not(Box::new(self))
    }
}

impl Expression for Expr {
    fn to_sql(&self) -> BuildResult<String> {
        let body = self.operand_sql()?;
        match self.alias_name() {
            Some(alias) => Ok(format!("{} AS {}", body, alias)),
            None => Ok(body),
        }
    }
}

impl From<Field> for Expr {
    fn from(field: Field) -> Self {
        Expr::Field(field)
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::Literal(value)
    }
}

impl From<BooleanExpr> for Expr {
    fn from(expr: BooleanExpr) -> Self {
        Expr::Boolean(Box::new(expr))
    }
}

impl From<LogicalExpr> for Expr {
    fn from(list: LogicalExpr) -> Self {
        Expr::Logical(list)
    }
}

impl From<ArithmeticExpr> for Expr {
    fn from(expr: ArithmeticExpr) -> Self {
        Expr::Arithmetic(Box::new(expr))
    }
}

impl From<AggregateExpr> for Expr {
    fn from(expr: AggregateExpr) -> Self {
        Expr::Aggregate(Box::new(expr))
    }
}

impl From<CaseExpr> for Expr {
    fn from(expr: CaseExpr) -> Self {
        Expr::Case(Box::new(expr))
    }
}

/// The right-hand side of an operator: a literal or another expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A literal value.
    Value(Value),
    /// A nested expression.
    Expr(Expr),
}

impl Operand {
    /// Serializes the operand.
    pub fn to_sql(&self) -> BuildResult<String> {
        match self {
            Operand::Value(value) => value.try_to_sql(),
            Operand::Expr(expr) => expr.operand_sql(),
        }
    }

    /// Returns the literal, if this operand is one.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Operand::Value(value) => Some(value),
            Operand::Expr(_) => None,
        }
    }

    pub(crate) fn contains_aggregate(&self) -> bool {
        match self {
            Operand::Value(_) => false,
            Operand::Expr(expr) => expr.contains_aggregate(),
        }
    }
}

/// Conversion into an [`Operand`].
pub trait IntoOperand {
    /// Converts `self` into an operand.
    fn into_operand(self) -> Operand;
}

impl IntoOperand for Operand {
    fn into_operand(self) -> Operand {
        self
    }
}

impl IntoOperand for Value {
    fn into_operand(self) -> Operand {
        Operand::Value(self)
    }
}

macro_rules! impl_literal_operand {
    ($($t:ty),*) => {
        $(
            impl IntoOperand for $t {
                fn into_operand(self) -> Operand {
                    Operand::Value(Value::from(self))
                }
            }
        )*
    };
}

impl_literal_operand!(bool, i8, i16, i32, i64, u8, u16, u32, f32, f64, &str, String, &[u8]);

impl<T: Into<Value>> IntoOperand for Vec<T> {
    fn into_operand(self) -> Operand {
        Operand::Value(Value::from(self))
    }
}

impl<T: Into<Value>, const N: usize> IntoOperand for [T; N] {
    fn into_operand(self) -> Operand {
        Operand::Value(Value::from(self))
    }
}

impl<T: Into<Value>> IntoOperand for Option<T> {
    fn into_operand(self) -> Operand {
        Operand::Value(Value::from(self))
    }
}

macro_rules! impl_expr_operand {
    ($($t:ty),*) => {
        $(
            impl IntoOperand for $t {
                fn into_operand(self) -> Operand {
                    Operand::Expr(Expr::from(self))
                }
            }
        )*
    };
}

impl_expr_operand!(Expr, Field, BooleanExpr, LogicalExpr, ArithmeticExpr, AggregateExpr, CaseExpr);

/// Comparison and arithmetic operators shared by every value-producing node.
///
/// Each operator clones the receiver into a new node.
pub trait Operators: Clone + Into<Expr> {
    /// `self = rhs`
    fn equal(&self, rhs: impl IntoOperand) -> BooleanExpr {
        BooleanExpr::new(self.clone(), CompareOp::Eq, Some(rhs.into_operand()))
    }

    /// `self != rhs`
    fn not_equal(&self, rhs: impl IntoOperand) -> BooleanExpr {
        BooleanExpr::new(self.clone(), CompareOp::NotEq, Some(rhs.into_operand()))
    }

    /// `self > rhs`
    fn greater(&self, rhs: impl IntoOperand) -> BooleanExpr {
        BooleanExpr::new(self.clone(), CompareOp::Gt, Some(rhs.into_operand()))
    }

    /// `self >= rhs`
    fn greater_eq(&self, rhs: impl IntoOperand) -> BooleanExpr {
        BooleanExpr::new(self.clone(), CompareOp::GtEq, Some(rhs.into_operand()))
    }

    /// `self < rhs`
    fn less(&self, rhs: impl IntoOperand) -> BooleanExpr {
        BooleanExpr::new(self.clone(), CompareOp::Lt, Some(rhs.into_operand()))
    }

    /// `self <= rhs`
    fn less_eq(&self, rhs: impl IntoOperand) -> BooleanExpr {
        BooleanExpr::new(self.clone(), CompareOp::LtEq, Some(rhs.into_operand()))
    }

    /// `self LIKE pattern`
    fn like(&self, pattern: impl IntoOperand) -> BooleanExpr {
        BooleanExpr::new(self.clone(), CompareOp::Like, Some(pattern.into_operand()))
    }

    /// `self IN (..)`
    fn in_set(&self, set: impl IntoOperand) -> BooleanExpr {
        BooleanExpr::new(self.clone(), CompareOp::In, Some(set.into_operand()))
    }

    /// `self NOT IN (..)`
    fn not_in_set(&self, set: impl IntoOperand) -> BooleanExpr {
        BooleanExpr::new(self.clone(), CompareOp::NotIn, Some(set.into_operand()))
    }

    /// `self IS NULL`
    fn is_null(&self) -> BooleanExpr {
        BooleanExpr::new(self.clone(), CompareOp::IsNull, None)
    }

    /// `self IS NOT NULL`
    fn is_not_null(&self) -> BooleanExpr {
        BooleanExpr::new(self.clone(), CompareOp::IsNotNull, None)
    }

    /// `self BETWEEN low AND high`
    fn between(&self, low: impl IntoOperand, high: impl IntoOperand) -> BooleanExpr {
        BooleanExpr::between(self.clone(), low.into_operand(), high.into_operand())
    }

    /// `( self + rhs )`
    fn plus(&self, rhs: impl IntoOperand) -> ArithmeticExpr {
        ArithmeticExpr::new(self.clone(), ArithmeticOp::Add, rhs.into_operand())
    }

    /// `( self - rhs )`
    fn minus(&self, rhs: impl IntoOperand) -> ArithmeticExpr {
        ArithmeticExpr::new(self.clone(), ArithmeticOp::Subtract, rhs.into_operand())
    }

    /// `( self * rhs )`
    fn multiply(&self, rhs: impl IntoOperand) -> ArithmeticExpr {
        ArithmeticExpr::new(self.clone(), ArithmeticOp::Multiply, rhs.into_operand())
    }

    /// `( self / rhs )`
    fn divide(&self, rhs: impl IntoOperand) -> ArithmeticExpr {
        ArithmeticExpr::new(self.clone(), ArithmeticOp::Divide, rhs.into_operand())
    }

    /// `( self % rhs )`
    fn modulo(&self, rhs: impl IntoOperand) -> ArithmeticExpr {
        ArithmeticExpr::new(self.clone(), ArithmeticOp::Modulo, rhs.into_operand())
    }
}

impl Operators for Expr {}
impl Operators for Field {}
impl Operators for ArithmeticExpr {}
impl Operators for AggregateExpr {}
impl Operators for CaseExpr {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BuildError;

    #[test]
    fn test_operand_sql_drops_alias() {
        let expr = Expr::from(f("price").alias("p"));
        assert_eq!(expr.to_sql().unwrap(), "price AS p");
        assert_eq!(expr.operand_sql().unwrap(), "price");
    }

    #[test]
    fn test_receiver_is_not_mutated() {
        let id = f("id");
        let a = id.equal(1);
        let b = id.greater(2);
        assert_eq!(a.to_sql().unwrap(), "id = 1");
        assert_eq!(b.to_sql().unwrap(), "id > 2");
        assert_eq!(id.to_sql().unwrap(), "id");
    }

    #[test]
    fn test_blank_alias_is_dropped() {
        assert_eq!(Expr::from(f("id").alias("")).to_sql().unwrap(), "id");
        assert_eq!(Expr::from(count(f("id")).alias(" ")).to_sql().unwrap(), "COUNT(id)");
        assert_eq!(Expr::from(f("a").plus(1).alias("")).to_sql().unwrap(), "( a + 1 )");
        assert_eq!(Expr::from(f("id").alias("")).alias_name(), None);
    }

    #[test]
    fn test_non_finite_literal_rejected() {
        assert!(matches!(
            Expr::from(f("ratio").greater(f64::NAN)).to_sql(),
            Err(BuildError::InvalidOperand { .. })
        ));
        assert!(Expr::from(Value::Double(f64::INFINITY)).to_sql().is_err());
    }

    #[test]
    fn test_negate() {
        let expr = Expr::from(f("active").equal(true)).negate();
        assert_eq!(expr.to_sql().unwrap(), "NOT (active = TRUE)");
    }

    #[test]
    fn test_contains_aggregate() {
        assert!(Expr::from(count(f("id")).greater(3)).contains_aggregate());
        assert!(!Expr::from(f("id").greater(3)).contains_aggregate());
        assert!(Expr::from(sum(f("qty")).multiply(2)).contains_aggregate());
    }

    #[test]
    fn test_literal_expression() {
        assert_eq!(Expr::from(Value::from("x")).to_sql().unwrap(), "'x'");
    }
}

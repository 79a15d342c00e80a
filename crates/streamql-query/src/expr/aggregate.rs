//! Aggregate function calls.

use std::fmt;

use super::{Expr, Expression};
use crate::error::{BuildError, BuildResult};

/// Aggregate functions. Parameterized variants carry their parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFn {
    /// `COUNT`
    Count,
    /// `SUM`
    Sum,
    /// `AVG`
    Avg,
    /// `MIN`
    Min,
    /// `MAX`
    Max,
    /// `COLLECT_LIST`
    CollectList,
    /// `COLLECT_SET`
    CollectSet,
    /// `LATEST_BY_OFFSET`
    LatestByOffset,
    /// `EARLIEST_BY_OFFSET`
    EarliestByOffset,
    /// `TOPK` with k.
    TopK(i64),
    /// `TOPKDISTINCT` with k.
    TopKDistinct(i64),
    /// `HISTOGRAM` with its bucket limit.
    Histogram(i64),
}

impl AggregateFn {
    /// Returns the function name.
    pub const fn name(&self) -> &'static str {
        match self {
            AggregateFn::Count => "COUNT",
            AggregateFn::Sum => "SUM",
            AggregateFn::Avg => "AVG",
            AggregateFn::Min => "MIN",
            AggregateFn::Max => "MAX",
            AggregateFn::CollectList => "COLLECT_LIST",
            AggregateFn::CollectSet => "COLLECT_SET",
            AggregateFn::LatestByOffset => "LATEST_BY_OFFSET",
            AggregateFn::EarliestByOffset => "EARLIEST_BY_OFFSET",
            AggregateFn::TopK(_) => "TOPK",
            AggregateFn::TopKDistinct(_) => "TOPKDISTINCT",
            AggregateFn::Histogram(_) => "HISTOGRAM",
        }
    }

    /// Returns the numeric parameter of parameterized variants.
    pub const fn parameter(&self) -> Option<i64> {
        match self {
            AggregateFn::TopK(k) | AggregateFn::TopKDistinct(k) | AggregateFn::Histogram(k) => {
                Some(*k)
            }
            _ => None,
        }
    }
}

impl fmt::Display for AggregateFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An aggregate wrapping exactly one argument (or `*` for `COUNT(*)`).
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateExpr {
    func: AggregateFn,
    arg: Option<Expr>,
    alias: Option<String>,
}

impl AggregateExpr {
    /// Creates an aggregate over `arg`.
    pub fn new(func: AggregateFn, arg: impl Into<Expr>) -> Self {
        Self {
            func,
            arg: Some(arg.into()),
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

    /// Returns the function.
    pub fn func(&self) -> AggregateFn {
        self.func
    }

    /// Serializes the call without its alias.
    pub fn operand_sql(&self) -> BuildResult<String> {
        if let Some(k) = self.func.parameter() {
            if k <= 0 {
                return Err(BuildError::InvalidParameter {
                    function: self.func.name(),
                    value: k,
                });
            }
        }
        let arg = match &self.arg {
            Some(arg) => arg.operand_sql()?,
            None => "*".to_string(),
        };
        Ok(match self.func.parameter() {
            Some(k) => format!("{}({}, {})", self.func, arg, k),
            None => format!("{}({})", self.func, arg),
        })
    }
}

impl Expression for AggregateExpr {
    fn to_sql(&self) -> BuildResult<String> {
        let body = self.operand_sql()?;
        match self.alias_name() {
            Some(alias) => Ok(format!("{} AS {}", body, alias)),
            _ => Ok(body),
        }
    }
}

/// `COUNT(arg)`
pub fn count(arg: impl Into<Expr>) -> AggregateExpr {
    AggregateExpr::new(AggregateFn::Count, arg)
}

/// `COUNT(*)`
pub fn count_all() -> AggregateExpr {
    AggregateExpr {
        func: AggregateFn::Count,
        arg: None,
        alias: None,
    }
}

/// `SUM(arg)`
pub fn sum(arg: impl Into<Expr>) -> AggregateExpr {
    AggregateExpr::new(AggregateFn::Sum, arg)
}

/// `AVG(arg)`
pub fn avg(arg: impl Into<Expr>) -> AggregateExpr {
    AggregateExpr::new(AggregateFn::Avg, arg)
}

/// `MIN(arg)`
pub fn min(arg: impl Into<Expr>) -> AggregateExpr {
    AggregateExpr::new(AggregateFn::Min, arg)
}

/// `MAX(arg)`
pub fn max(arg: impl Into<Expr>) -> AggregateExpr {
    AggregateExpr::new(AggregateFn::Max, arg)
}

/// `COLLECT_LIST(arg)`
pub fn collect_list(arg: impl Into<Expr>) -> AggregateExpr {
    AggregateExpr::new(AggregateFn::CollectList, arg)
}

/// `COLLECT_SET(arg)`
pub fn collect_set(arg: impl Into<Expr>) -> AggregateExpr {
    AggregateExpr::new(AggregateFn::CollectSet, arg)
}

/// `LATEST_BY_OFFSET(arg)`
pub fn latest_by_offset(arg: impl Into<Expr>) -> AggregateExpr {
    AggregateExpr::new(AggregateFn::LatestByOffset, arg)
}

/// `EARLIEST_BY_OFFSET(arg)`
pub fn earliest_by_offset(arg: impl Into<Expr>) -> AggregateExpr {
    AggregateExpr::new(AggregateFn::EarliestByOffset, arg)
}

/// `TOPK(arg, k)`
pub fn topk(arg: impl Into<Expr>, k: i64) -> AggregateExpr {
    AggregateExpr::new(AggregateFn::TopK(k), arg)
}

/// `TOPKDISTINCT(arg, k)`
pub fn topk_distinct(arg: impl Into<Expr>, k: i64) -> AggregateExpr {
    AggregateExpr::new(AggregateFn::TopKDistinct(k), arg)
}

/// `HISTOGRAM(arg, limit)`
pub fn histogram(arg: impl Into<Expr>, limit: i64) -> AggregateExpr {
    AggregateExpr::new(AggregateFn::Histogram(limit), arg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{f, Operators};

    #[test]
    fn test_count_alias() {
        assert_eq!(count(f("id")).alias("n").to_sql().unwrap(), "COUNT(id) AS n");
        assert_eq!(count_all().to_sql().unwrap(), "COUNT(*)");
    }

    #[test]
    fn test_simple_aggregates() {
        assert_eq!(sum(f("o.qty")).to_sql().unwrap(), "SUM(o.qty)");
        assert_eq!(
            latest_by_offset(f("status")).alias("status").to_sql().unwrap(),
            "LATEST_BY_OFFSET(status) AS status"
        );
        assert_eq!(
            avg(f("price").multiply(f("qty"))).to_sql().unwrap(),
            "AVG(( price * qty ))"
        );
    }

    #[test]
    fn test_parameterized() {
        assert_eq!(topk(f("score"), 3).to_sql().unwrap(), "TOPK(score, 3)");
        assert_eq!(
            topk_distinct(f("score"), 2).to_sql().unwrap(),
            "TOPKDISTINCT(score, 2)"
        );
    }

    #[test]
    fn test_invalid_parameter() {
        assert_eq!(
            topk(f("score"), 0).to_sql(),
            Err(BuildError::InvalidParameter { function: "TOPK", value: 0 })
        );
        assert!(histogram(f("x"), -1).to_sql().is_err());
    }
}

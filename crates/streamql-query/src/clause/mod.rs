//! Clause builders composed by statements.

mod filter;
mod from;
mod group;
mod join;
mod order;

pub use filter::{Having, Where};
pub use from::Relation;
pub use group::{GroupBy, PartitionBy};
pub use join::{JoinExpr, JoinKind};
pub use order::{OrderBy, SortOrder};

use crate::error::{BuildError, BuildResult};
use crate::expr::Expr;

/// Serializes a comma separated list of expressions without aliases.
pub(crate) fn operand_list(
    keyword: &'static str,
    items: &[Expr],
    allow_aggregates: bool,
) -> BuildResult<String> {
    if items.is_empty() {
        return Err(BuildError::EmptyFieldList(keyword));
    }
    let mut parts = Vec::with_capacity(items.len());
    for item in items {
        if !allow_aggregates && item.contains_aggregate() {
            return Err(BuildError::InvalidOperand {
                operator: keyword,
                reason: "aggregate functions are not allowed here".to_string(),
            });
        }
        parts.push(item.operand_sql()?);
    }
    Ok(parts.join(", "))
}

//! SELECT statements.

use streamql_common::RelationKind;
use tracing::debug;

use crate::clause::{GroupBy, Having, JoinExpr, OrderBy, PartitionBy, Relation, Where};
use crate::error::{BuildError, BuildResult};
use crate::expr::{Expr, Expression, WindowExpr};
use crate::schema::SchemaRegistry;

/// A SELECT builder.
///
/// Clauses render in a fixed order:
/// `WITH`, `SELECT`, `FROM`, joins, `WINDOW`, `WHERE`, `GROUP BY`,
/// `HAVING`, `PARTITION BY`, `ORDER BY`, `EMIT CHANGES`, `LIMIT`.
///
/// Joins are checked against the attached [`SchemaRegistry`] when they are
/// added, so attach the registry and the FROM relation first. A rejected
/// join is remembered and reported by [`Expression::to_sql`].
#[derive(Debug, Clone, Default)]
pub struct Select {
    registry: Option<SchemaRegistry>,
    ctes: Vec<(String, Select)>,
    fields: Vec<Expr>,
    from: Option<Relation>,
    joins: Vec<JoinExpr>,
    window: Option<WindowExpr>,
    filter: Option<Where>,
    group_by: Option<GroupBy>,
    having: Option<Having>,
    partition_by: Option<PartitionBy>,
    order_by: Option<OrderBy>,
    emit_changes: bool,
    limit: Option<u64>,
    error: Option<BuildError>,
}

/// Starts a SELECT over `fields`.
pub fn select<I, E>(fields: I) -> Select
where
    I: IntoIterator<Item = E>,
    E: Into<Expr>,
{
    Select::new().fields(fields)
}

impl Select {
    /// Creates an empty SELECT.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches the registry used to validate joins and resolve source kinds.
    #[must_use]
    pub fn with_registry(mut self, registry: SchemaRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Adds a named sub-query usable as a source.
    #[must_use]
    pub fn with_cte(mut self, name: impl Into<String>, query: Select) -> Self {
        self.ctes.push((name.into(), query));
        self
    }

    /// Adds one output expression.
    #[must_use]
    pub fn field(mut self, field: impl Into<Expr>) -> Self {
        self.fields.push(field.into());
        self
    }

    /// Adds output expressions.
    #[must_use]
    pub fn fields<I, E>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        self.fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Sets the source relation.
    #[must_use]
    pub fn from(mut self, relation: impl Into<Relation>) -> Self {
        self.from = Some(relation.into());
        self
    }

    /// Adds a join, validating it when a registry is attached.
    #[must_use]
    pub fn join(mut self, join: JoinExpr) -> Self {
        if self.error.is_some() {
            return self;
        }
        let Some(from) = &self.from else {
            self.error = Some(BuildError::MissingFrom);
            return self;
        };
        if let Some(registry) = &self.registry {
            if let Err(err) = join.validate(registry, from, &self.joins) {
                debug!(relation = join.relation().name(), error = %err, "join rejected");
                self.error = Some(err);
                return self;
            }
        }
        self.joins.push(join);
        self
    }

    /// Sets the window.
    #[must_use]
    pub fn window(mut self, window: WindowExpr) -> Self {
        self.window = Some(window);
        self
    }

    /// Adds a WHERE condition, AND-ed with any previous one.
    #[must_use]
    pub fn filter(mut self, condition: impl Into<Expr>) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(condition),
            None => Where::new(condition),
        });
        self
    }

    /// Sets the grouping keys.
    #[must_use]
    pub fn group_by<I, E>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        self.group_by = Some(GroupBy::new(keys));
        self
    }

    /// Adds a HAVING condition, AND-ed with any previous one.
    #[must_use]
    pub fn having(mut self, condition: impl Into<Expr>) -> Self {
        self.having = Some(match self.having.take() {
            Some(existing) => existing.and(condition),
            None => Having::new(condition),
        });
        self
    }

    /// Sets the repartitioning keys.
    #[must_use]
    pub fn partition_by<I, E>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        self.partition_by = Some(PartitionBy::new(keys));
        self
    }

    /// Sets the ordering.
    #[must_use]
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by = Some(order);
        self
    }

    /// Turns the query into a push query.
    #[must_use]
    pub fn emit_changes(mut self) -> Self {
        self.emit_changes = true;
        self
    }

    /// Limits the number of rows returned.
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The source relation.
    pub fn source(&self) -> Option<&Relation> {
        self.from.as_ref()
    }

    /// Kind of the source relation: declared on the relation, else
    /// looked up in `registry` or the attached one.
    pub fn source_kind(&self, registry: Option<&SchemaRegistry>) -> Option<RelationKind> {
        let from = self.from.as_ref()?;
        if let Some(kind) = from.kind() {
            return Some(kind);
        }
        registry
            .or(self.registry.as_ref())
            .and_then(|registry| registry.get(from.name()))
            .and_then(|schema| schema.kind())
    }

    /// True if the query aggregates.
    pub fn is_aggregated(&self) -> bool {
        self.group_by.is_some() || self.fields.iter().any(Expr::contains_aggregate)
    }

    /// True if the query is windowed.
    pub fn is_windowed(&self) -> bool {
        self.window.is_some()
    }

    /// True if the query emits changes continuously.
    pub fn is_push(&self) -> bool {
        self.emit_changes
    }

    /// Serializes without the trailing semicolon, for nesting.
    pub fn body_sql(&self) -> BuildResult<String> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        if self.fields.is_empty() {
            return Err(BuildError::EmptyFieldList("SELECT"));
        }
        let from = self.from.as_ref().ok_or(BuildError::MissingFrom)?;

        let mut parts = Vec::new();
        if !self.ctes.is_empty() {
            let ctes = self
                .ctes
                .iter()
                .map(|(name, query)| {
                    if name.trim().is_empty() {
                        return Err(BuildError::MissingAlias("WITH"));
                    }
                    Ok(format!("{} AS ({})", name, query.body_sql()?))
                })
                .collect::<BuildResult<Vec<_>>>()?;
            parts.push(format!("WITH {}", ctes.join(", ")));
        }

        let fields = self
            .fields
            .iter()
            .map(Expression::to_sql)
            .collect::<BuildResult<Vec<_>>>()?;
        parts.push(format!("SELECT {}", fields.join(", ")));
        parts.push(format!("FROM {}", from.to_sql()?));
        for join in &self.joins {
            parts.push(join.to_sql()?);
        }
        if let Some(window) = &self.window {
            parts.push(window.to_sql()?);
        }
        if let Some(filter) = &self.filter {
            parts.push(filter.to_sql()?);
        }
        if let Some(group_by) = &self.group_by {
            parts.push(group_by.to_sql()?);
        }
        if let Some(having) = &self.having {
            parts.push(having.to_sql()?);
        }
        if let Some(partition_by) = &self.partition_by {
            parts.push(partition_by.to_sql()?);
        }
        if let Some(order_by) = &self.order_by {
            parts.push(order_by.to_sql()?);
        }
        if self.emit_changes {
            parts.push("EMIT CHANGES".to_string());
        }
        if let Some(limit) = self.limit {
            if limit == 0 {
                return Err(BuildError::InvalidParameter {
                    function: "LIMIT",
                    value: 0,
                });
            }
            parts.push(format!("LIMIT {}", limit));
        }
        Ok(parts.join(" "))
    }
}

impl Expression for Select {
    fn to_sql(&self) -> BuildResult<String> {
        Ok(format!("{};", self.body_sql()?))
    }
}

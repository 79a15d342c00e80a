//! JOIN clauses and their schema validation.

use super::from::Relation;
use crate::error::{BuildError, BuildResult, FieldMismatch};
use crate::expr::{Expression, Field, WindowDuration};
use crate::schema::{compare_field, SchemaRegistry, SearchField};

/// Join flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinKind {
    /// Matching rows only.
    Inner,
    /// All rows of the select side.
    Left,
    /// All rows of the join side.
    Right,
    /// All rows of both sides.
    FullOuter,
}

impl JoinKind {
    /// Returns the join keyword.
    pub const fn as_sql(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::FullOuter => "FULL OUTER JOIN",
        }
    }
}

/// `<KIND> JOIN relation [WITHIN ..] ON left = right`
///
/// The left field of the ON condition belongs to the select side, the right
/// field to the joined relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinExpr {
    kind: JoinKind,
    relation: Relation,
    on: Option<(Field, Field)>,
    within: Option<WindowDuration>,
}

impl JoinExpr {
    /// Creates a join of the given kind.
    pub fn new(kind: JoinKind, relation: impl Into<Relation>) -> Self {
        Self {
            kind,
            relation: relation.into(),
            on: None,
            within: None,
        }
    }

    /// `INNER JOIN relation`
    pub fn inner(relation: impl Into<Relation>) -> Self {
        Self::new(JoinKind::Inner, relation)
    }

    /// `LEFT JOIN relation`
    pub fn left(relation: impl Into<Relation>) -> Self {
        Self::new(JoinKind::Left, relation)
    }

    /// `RIGHT JOIN relation`
    pub fn right(relation: impl Into<Relation>) -> Self {
        Self::new(JoinKind::Right, relation)
    }

    /// `FULL OUTER JOIN relation`
    pub fn full_outer(relation: impl Into<Relation>) -> Self {
        Self::new(JoinKind::FullOuter, relation)
    }

    /// Sets the equality condition.
    #[must_use]
    pub fn on(mut self, select_side: Field, join_side: Field) -> Self {
        self.on = Some((select_side, join_side));
        self
    }

    /// Bounds a stream-stream join by a time window.
    #[must_use]
    pub fn within(mut self, within: WindowDuration) -> Self {
        self.within = Some(within);
        self
    }

    /// Join flavour.
    pub fn kind(&self) -> JoinKind {
        self.kind
    }

    /// Joined relation.
    pub fn relation(&self) -> &Relation {
        &self.relation
    }

    fn condition(&self) -> BuildResult<&(Field, Field)> {
        self.on.as_ref().ok_or(BuildError::InvalidOperand {
            operator: "JOIN",
            reason: "missing ON condition".to_string(),
        })
    }

    /// Resolves both ON fields in `registry` and checks they can be joined.
    ///
    /// Qualified fields are matched against the aliases and names of `from`,
    /// `previous` joins and this join; unqualified fields default to `from`
    /// on the select side and to this join's relation on the join side.
    pub(crate) fn validate(
        &self,
        registry: &SchemaRegistry,
        from: &Relation,
        previous: &[JoinExpr],
    ) -> BuildResult<()> {
        let (select_side, join_side) = self.condition()?;
        let known: Vec<&Relation> = std::iter::once(from)
            .chain(previous.iter().map(|join| &join.relation))
            .chain(std::iter::once(&self.relation))
            .collect();

        let resolve = |field: &Field, default: &Relation| -> BuildResult<SearchField> {
            let relation = match field.relation() {
                Some(qualifier) => known
                    .iter()
                    .find(|relation| relation.answers_to(qualifier))
                    .map(|relation| relation.name())
                    .ok_or_else(|| BuildError::RelationNotFound(qualifier.to_string()))?,
                None => default.name(),
            };
            registry.resolve_field(relation, field.column())
        };

        let left = resolve(select_side, from)?;
        let right = resolve(join_side, &self.relation)?;
        for field in [&left, &right] {
            if !field.kind().is_joinable() {
                return Err(BuildError::NotJoinable {
                    field: format!("{}.{}", field.relation_name(), field.name()),
                    kind: field.kind().clone(),
                });
            }
        }
        if let Some(FieldMismatch::KindMismatch { expected, actual, .. }) = compare_field(&left, &right) {
            return Err(BuildError::IncompatibleJoin {
                left: format!("{}.{}", left.relation_name(), left.name()),
                left_kind: expected,
                right: format!("{}.{}", right.relation_name(), right.name()),
                right_kind: actual,
            });
        }
        Ok(())
    }
}

impl Expression for JoinExpr {
    fn to_sql(&self) -> BuildResult<String> {
        if self.relation.name().trim().is_empty() {
            return Err(BuildError::MissingJoinRelation);
        }
        let (select_side, join_side) = self.condition()?;
        let mut sql = format!("{} {}", self.kind.as_sql(), self.relation.to_sql()?);
        if let Some(within) = &self.within {
            sql.push_str(" WITHIN ");
            sql.push_str(&within.checked_sql("JOIN", "within")?);
        }
        sql.push_str(&format!(
            " ON {} = {}",
            select_side.operand_sql()?,
            join_side.operand_sql()?
        ));
        Ok(sql)
    }
}

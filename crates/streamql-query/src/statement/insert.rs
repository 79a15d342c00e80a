//! INSERT INTO.

use serde::Serialize;

use super::select::Select;
use crate::error::{BuildError, BuildResult};
use crate::expr::Expression;
use crate::schema::{NativeKind, Record, SearchField};
use crate::value::Value;

/// An INSERT builder fed either by a row of values or by a SELECT.
///
/// Row values are kept in the order they were added. A value of
/// [`Value::Null`] renders as `NULL`; a [`SearchField`] without a literal
/// is left out of the column list.
#[derive(Debug, Clone)]
pub struct Insert {
    relation: String,
    row: Vec<(String, Value)>,
    source: Option<Select>,
    error: Option<BuildError>,
}

/// Starts an INSERT into `relation`.
pub fn insert_into(relation: impl Into<String>) -> Insert {
    Insert::new(relation)
}

impl Insert {
    /// Starts an INSERT into `relation`.
    pub fn new(relation: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            row: Vec::new(),
            source: None,
            error: None,
        }
    }

    /// Sets one column, replacing an earlier value for the same column.
    #[must_use]
    pub fn value(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        let column = column.into();
        let value = value.into();
        match self
            .row
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&column))
        {
            Some(slot) => slot.1 = value,
            None => self.row.push((column, value)),
        }
        self
    }

    /// Sets every column of a row map.
    #[must_use]
    pub fn row<I, K, V>(self, row: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        row.into_iter()
            .fold(self, |insert, (column, value)| insert.value(column, value))
    }

    /// Sets columns from fields carrying literals; fields without one are skipped.
    #[must_use]
    pub fn fields(self, fields: impl IntoIterator<Item = SearchField>) -> Self {
        fields.into_iter().fold(self, |insert, field| match field.literal() {
            Some(value) => {
                let value = value.clone();
                insert.value(field.name(), value)
            }
            None => insert,
        })
    }

    /// Sets columns from a record, converting each declared field to its
    /// kind. `null` members and undeclared members are skipped.
    #[must_use]
    pub fn from_record<T: Record + Serialize>(mut self, record: &T) -> Self {
        let json = match serde_json::to_value(record) {
            Ok(json) => json,
            Err(err) => {
                self.error.get_or_insert(BuildError::Serialize(err.to_string()));
                return self;
            }
        };
        let serde_json::Value::Object(members) = json else {
            self.error
                .get_or_insert(BuildError::Serialize("record is not a JSON object".to_string()));
            return self;
        };
        for field in T::fields() {
            let NativeKind::Mapped(kind) = field.kind() else {
                continue;
            };
            let Some(member) = members
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(field.name()))
                .map(|(_, member)| member)
            else {
                continue;
            };
            let converted = if member.is_null() {
                if field.is_nullable() {
                    continue;
                }
                Err("null value for a non-nullable field".to_string())
            } else {
                Value::from_json_as(kind, member)
            };
            match converted {
                Ok(value) => self = self.value(field.name(), value),
                Err(reason) => {
                    self.error.get_or_insert(BuildError::Serialize(format!(
                        "field {}: {}",
                        field.name(),
                        reason
                    )));
                    return self;
                }
            }
        }
        self
    }

    /// Feeds the insert from a SELECT.
    #[must_use]
    pub fn select(mut self, select: Select) -> Self {
        self.source = Some(select);
        self
    }

    /// Target relation.
    pub fn relation(&self) -> &str {
        &self.relation
    }
}

impl Expression for Insert {
    fn to_sql(&self) -> BuildResult<String> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        if self.relation.trim().is_empty() {
            return Err(BuildError::EmptyRelation("INSERT"));
        }
        match (&self.source, self.row.is_empty()) {
            (Some(_), false) => Err(BuildError::ConflictingInsert(self.relation.clone())),
            (None, true) => Err(BuildError::EmptyFieldList("INSERT")),
            (Some(select), true) => Ok(format!(
                "INSERT INTO {} {};",
                self.relation,
                select.body_sql()?
            )),
            (None, false) => {
                let mut columns = Vec::with_capacity(self.row.len());
                let mut values = Vec::with_capacity(self.row.len());
                for (column, value) in &self.row {
                    if column.trim().is_empty() {
                        return Err(BuildError::EmptyColumn);
                    }
                    columns.push(column.as_str());
                    values.push(value.try_to_sql()?);
                }
                Ok(format!(
                    "INSERT INTO {} ({}) VALUES ({});",
                    self.relation,
                    columns.join(", "),
                    values.join(", ")
                ))
            }
        }
    }
}

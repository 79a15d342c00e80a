//! Field set comparison and native type linting.

use std::collections::BTreeSet;

use super::field::{RelationSchema, SearchField};
use super::native::{native_struct_representation, Record};
use super::registry::SchemaRegistry;
use crate::error::{FieldMismatch, SchemaError, SchemaResult};

/// Compares two fields that are expected to hold the same kind.
pub fn compare_field(expected: &SearchField, actual: &SearchField) -> Option<FieldMismatch> {
    (expected.kind() != actual.kind()).then(|| FieldMismatch::KindMismatch {
        field: actual.name().to_string(),
        expected: expected.kind().clone(),
        actual: actual.kind().clone(),
    })
}

/// Reports every difference between two field sets, in field name order.
///
/// Swapping the arguments reports the same fields: kind mismatches swap
/// their expected and actual kinds, and missing fields name the other side.
pub fn compare_fields(expected: &RelationSchema, actual: &RelationSchema) -> Vec<FieldMismatch> {
    let names: BTreeSet<&String> = expected.keys().chain(actual.keys()).collect();
    names
        .into_iter()
        .filter_map(|name| match (expected.get(name), actual.get(name)) {
            (Some(left), Some(right)) => compare_field(left, right),
            (Some(left), None) => Some(FieldMismatch::NotFound {
                field: left.name().to_string(),
                missing_from: actual.name().to_string(),
            }),
            (None, Some(right)) => Some(FieldMismatch::NotFound {
                field: right.name().to_string(),
                missing_from: expected.name().to_string(),
            }),
            (None, None) => None,
        })
        .collect()
}

/// Checks native types against the schemas held in a registry.
#[derive(Debug, Clone)]
pub struct Linter {
    registry: SchemaRegistry,
}

impl Linter {
    /// Creates a linter over `registry`.
    pub fn new(registry: SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Verifies that `T` matches the registered schema of `relation`.
    pub fn lint<T: Record>(&self, relation: &str) -> SchemaResult<()> {
        let remote = self
            .registry
            .get(relation)
            .ok_or_else(|| SchemaError::RelationNotFound(relation.to_string()))?;
        let native = native_struct_representation::<T>(relation)?;
        Self::check(&remote, &native)
    }

    /// Verifies that two schemas hold the same fields.
    pub fn check(expected: &RelationSchema, actual: &RelationSchema) -> SchemaResult<()> {
        let mismatches = compare_fields(expected, actual);
        if mismatches.is_empty() {
            return Ok(());
        }
        Err(SchemaError::Mismatches {
            relation: expected.name().to_string(),
            mismatches,
        })
    }

    /// The registry this linter reads.
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }
}

//! Shared relation schema cache.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::field::{RelationSchema, SearchField};
use crate::error::{BuildError, BuildResult};

/// Concurrent map from relation name to its schema.
///
/// Clones share the same underlying map. Each relation's schema is held
/// behind an `Arc` and replaced as a whole, so readers observe either the
/// previous or the new schema and never a mix of both.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    relations: Arc<DashMap<String, Arc<RelationSchema>>>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a schema, replacing any previous one for the same name.
    pub fn set(&self, schema: RelationSchema) -> Option<Arc<RelationSchema>> {
        let key = schema.name().to_ascii_uppercase();
        debug!(relation = %key, fields = schema.len(), "registering relation schema");
        self.relations.insert(key, Arc::new(schema))
    }

    /// Returns the schema for `relation`, ignoring case.
    pub fn get(&self, relation: &str) -> Option<Arc<RelationSchema>> {
        self.relations
            .get(&relation.to_ascii_uppercase())
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Removes a relation.
    pub fn remove(&self, relation: &str) -> Option<Arc<RelationSchema>> {
        self.relations
            .remove(&relation.to_ascii_uppercase())
            .map(|(_, schema)| schema)
    }

    /// True if the relation is registered.
    pub fn contains(&self, relation: &str) -> bool {
        self.relations.contains_key(&relation.to_ascii_uppercase())
    }

    /// Registered relation names, upper-cased and sorted.
    pub fn relations(&self) -> Vec<String> {
        let mut names: Vec<String> = self.relations.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Number of registered relations.
    pub fn len(&self) -> usize {
        self.relations.len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    /// Drops every registered schema.
    pub fn clear(&self) {
        self.relations.clear();
    }

    /// Resolves `relation.field` for builder validation.
    pub fn resolve_field(&self, relation: &str, field: &str) -> BuildResult<SearchField> {
        let schema = self
            .get(relation)
            .ok_or_else(|| BuildError::RelationNotFound(relation.to_string()))?;
        schema
            .get(field)
            .cloned()
            .ok_or_else(|| BuildError::FieldNotFound {
                field: field.to_string(),
                relation: relation.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::Kind;

    fn orders(kind: Kind) -> RelationSchema {
        RelationSchema::from_fields("orders", [SearchField::new("id", kind)]).unwrap()
    }

    #[test]
    fn test_set_replaces_whole_schema() {
        let registry = SchemaRegistry::new();
        assert!(registry.set(orders(Kind::Int)).is_none());
        let reader = registry.get("ORDERS").unwrap();

        let previous = registry.set(orders(Kind::BigInt)).unwrap();
        assert_eq!(previous.get("id").unwrap().kind(), &Kind::Int);
        // a reader holding the old schema keeps seeing it
        assert_eq!(reader.get("id").unwrap().kind(), &Kind::Int);
        assert_eq!(
            registry.get("orders").unwrap().get("id").unwrap().kind(),
            &Kind::BigInt
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_clones_share_state() {
        let registry = SchemaRegistry::new();
        let other = registry.clone();
        other.set(orders(Kind::Int));
        assert!(registry.contains("Orders"));
        assert_eq!(registry.relations(), vec!["ORDERS".to_string()]);
        registry.clear();
        assert!(other.is_empty());
    }

    #[test]
    fn test_resolve_field() {
        let registry = SchemaRegistry::new();
        registry.set(orders(Kind::Int));
        assert_eq!(registry.resolve_field("orders", "ID").unwrap().kind(), &Kind::Int);
        assert_eq!(
            registry.resolve_field("orders", "missing"),
            Err(BuildError::FieldNotFound {
                field: "missing".into(),
                relation: "orders".into()
            })
        );
        assert_eq!(
            registry.resolve_field("users", "id"),
            Err(BuildError::RelationNotFound("users".into()))
        );
    }

    #[test]
    fn test_remove() {
        let registry = SchemaRegistry::new();
        registry.set(orders(Kind::Int));
        assert!(registry.remove("orders").is_some());
        assert!(registry.get("orders").is_none());
    }
}

//! Client-side schema cache
//!
//! Registry ids map to immutable schema bodies, so compiled schemas are cached for the
//! lifetime of the client with no eviction. The subject -> latest id map only reflects
//! registrations made through this client.

use crate::schema_types::CompiledSchema;
use crate::types::{RegistryId, SchemaType};
use moka::sync::Cache;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// A compiled schema and its kind
#[derive(Debug, Clone)]
pub struct CachedSchema {
    pub schema_type: SchemaType,
    pub schema: CompiledSchema,
}

/// Id -> compiled schema, subject -> latest registered id.
pub struct SchemaCache {
    // Built without capacity or TTL, so entries are never evicted
    schemas: Cache<RegistryId, Arc<CachedSchema>>,
    latest_ids: RwLock<HashMap<String, RegistryId>>,
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self {
            schemas: Cache::builder().build(),
            latest_ids: RwLock::new(HashMap::new()),
        }
    }
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_schema(&self, id: RegistryId) -> Option<Arc<CachedSchema>> {
        self.schemas.get(&id)
    }

    /// Insert a compiled schema. The first entry for an id wins; later calls get it back
    /// unchanged.
    pub fn set_schema(
        &self,
        id: RegistryId,
        schema_type: SchemaType,
        schema: CompiledSchema,
    ) -> Arc<CachedSchema> {
        self.schemas
            .entry(id)
            .or_insert_with(|| {
                Arc::new(CachedSchema {
                    schema_type,
                    schema,
                })
            })
            .into_value()
    }

    pub fn get_latest_registry_id(&self, subject: &str) -> Option<RegistryId> {
        self.latest_ids
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(subject)
            .copied()
    }

    pub fn set_latest_registry_id(&self, subject: &str, id: RegistryId) {
        self.latest_ids
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(subject.to_string(), id);
    }

    /// Number of cached schemas
    pub fn len(&self) -> u64 {
        self.schemas.run_pending_tasks();
        self.schemas.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchemaOptions;
    use crate::schema_types::schema_from_confluent_schema;
    use crate::types::ConfluentSchema;

    fn compiled(schema: &str) -> CompiledSchema {
        schema_from_confluent_schema(&ConfluentSchema::json(schema), &SchemaOptions::default())
            .unwrap()
    }

    #[test]
    fn test_get_missing() {
        let cache = SchemaCache::new();
        assert!(cache.get_schema(1).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_set_and_get() {
        let cache = SchemaCache::new();
        let entry = cache.set_schema(7, SchemaType::Json, compiled(r#"{"type":"string"}"#));

        let found = cache.get_schema(7).unwrap();
        assert!(Arc::ptr_eq(&entry, &found));
        assert_eq!(found.schema_type, SchemaType::Json);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_set_schema_is_idempotent() {
        let cache = SchemaCache::new();
        let first = cache.set_schema(7, SchemaType::Json, compiled(r#"{"type":"string"}"#));
        let second = cache.set_schema(7, SchemaType::Json, compiled(r#"{"type":"integer"}"#));

        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first.schema, &second.schema));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_latest_registry_id_is_overwritten() {
        let cache = SchemaCache::new();
        assert!(cache.get_latest_registry_id("orders-value").is_none());

        cache.set_latest_registry_id("orders-value", 1);
        cache.set_latest_registry_id("orders-value", 5);
        assert_eq!(cache.get_latest_registry_id("orders-value"), Some(5));
        assert!(cache.get_latest_registry_id("users-value").is_none());
    }
}

//! Schema reference resolution
//!
//! Flattens a schema's reference graph into dependency-first order. Each reference is
//! fetched once per walk; a reference reached through several paths (diamond) is only
//! emitted the first time.

use crate::api::RegistryApi;
use crate::error::Result;
use crate::schema_types::SchemaTypeHelper;
use crate::types::{ConfluentSchema, Version};
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

/// A referenced schema together with the name the referencing schema uses for it
/// (import path for Protobuf, `$ref` URI for JSON Schema, type name for Avro).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedReference {
    pub name: String,
    pub schema: ConfluentSchema,
}

/// Resolve every reference of `schema`, dependencies first.
pub async fn resolve_references(
    api: &dyn RegistryApi,
    schema: &ConfluentSchema,
    helper: &dyn SchemaTypeHelper,
) -> Result<Vec<ResolvedReference>> {
    let mut visited = HashSet::new();
    let mut resolved = Vec::new();
    resolve_recursive(api, schema, helper, &mut visited, &mut resolved).await?;
    Ok(resolved)
}

type ResolveFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

fn resolve_recursive<'a>(
    api: &'a dyn RegistryApi,
    schema: &'a ConfluentSchema,
    helper: &'a dyn SchemaTypeHelper,
    visited: &'a mut HashSet<String>,
    resolved: &'a mut Vec<ResolvedReference>,
) -> ResolveFuture<'a> {
    Box::pin(async move {
        for reference in &schema.references {
            if !visited.insert(reference.key()) {
                continue;
            }

            tracing::debug!(
                name = %reference.name,
                subject = %reference.subject,
                version = reference.version,
                "Resolving schema reference"
            );

            let record = api
                .version(&reference.subject, Version::Number(reference.version))
                .await?;
            let referenced = helper.to_confluent_schema(&record);

            resolve_recursive(api, &referenced, helper, visited, resolved).await?;

            resolved.push(ResolvedReference {
                name: reference.name.clone(),
                schema: referenced,
            });
        }
        Ok(())
    })
}

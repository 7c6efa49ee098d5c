//! Schema Registry client facade
//!
//! Registers schemas, encodes payloads into the schema-tagged wire envelope, and decodes them
//! back, compiling schemas on first use and caching them by registry id.
//!
//! ## Encode
//!
//! ```text
//! Payload ──► get_schema(id) ──► Schema::to_buffer ──► wire::encode(id, bytes)
//!               │
//!               ├─ cache hit ──► compiled schema
//!               └─ cache miss ─► single-flight fetch ─► find_schema ─► compile ─► cache
//! ```
//!
//! ## Decode
//!
//! ```text
//! [0x00][id][payload] ──► wire::decode ──► get_schema(id) (writer)
//!                                             │
//!                                             ├─ no reader ──► writer.from_buffer
//!                                             └─ Avro reader ─► reader.from_buffer(_with_writer)
//! ```

use crate::api::{HttpRegistryApi, RegistryApi};
use crate::cache::{CachedSchema, SchemaCache};
use crate::config::{ClientOptions, DecodeOptions, RegisterOptions, RegistryConfig};
use crate::error::{RegistryClientError, Result};
use crate::references::resolve_references;
use crate::schema_types::{helper_for, CompiledSchema, SchemaTypeHelper};
use crate::single_flight::SingleFlight;
use crate::types::*;
use crate::wire::{self, MAGIC_BYTE};
use bytes::Bytes;
use moka::sync::Cache;
use serde_json::Value;
use std::sync::Arc;

/// Compiled reader schemas kept per client, keyed by kind and schema text
const READER_SCHEMA_CACHE_CAPACITY: u64 = 1_000;

/// Client for a Confluent-compatible schema registry
pub struct SchemaRegistryClient {
    api: Arc<dyn RegistryApi>,
    cache: SchemaCache,
    in_flight: SingleFlight<RegistryId, Arc<CachedSchema>>,
    reader_schemas: Cache<(SchemaType, String), CompiledSchema>,
    options: ClientOptions,
}

impl SchemaRegistryClient {
    /// Create a client over any [`RegistryApi`] implementation.
    pub fn new(api: Arc<dyn RegistryApi>, options: ClientOptions) -> Self {
        Self {
            api,
            cache: SchemaCache::new(),
            in_flight: SingleFlight::new(),
            reader_schemas: Cache::builder()
                .max_capacity(READER_SCHEMA_CACHE_CAPACITY)
                .build(),
            options,
        }
    }

    /// Create a client talking HTTP to the registry described by `config`.
    pub fn from_config(config: RegistryConfig, options: ClientOptions) -> Result<Self> {
        let api = HttpRegistryApi::new(config)?;
        Ok(Self::new(Arc::new(api), options))
    }

    /// Number of compiled schemas held by the client
    pub fn cached_schemas(&self) -> u64 {
        self.cache.len()
    }

    /// Number of compiled reader schemas held by the client
    pub fn cached_reader_schemas(&self) -> u64 {
        self.reader_schemas.run_pending_tasks();
        self.reader_schemas.entry_count()
    }

    /// Register a schema and return its registry id.
    ///
    /// The subject is `options.subject` or, for Avro, `namespace + separator + name`.
    /// When the subject already has a compatibility level, it must equal
    /// `options.compatibility`; the client never overrides an existing level. A subject
    /// without one gets `options.compatibility` after its first registration.
    pub async fn register(
        &self,
        schema: impl Into<SchemaInput>,
        options: RegisterOptions,
    ) -> Result<RegisteredSchema> {
        let schema = schema.into().into_confluent_schema();
        let helper = helper_for(schema.schema_type);

        let referenced = resolve_references(self.api.as_ref(), &schema, helper).await?;
        let schema_options = helper.update_options_from_schema_references(
            &referenced,
            self.options.for_schema_options.clone(),
        );

        let compiled = helper.compile(&schema, &schema_options)?;
        helper.validate(compiled.as_ref())?;

        let subject = match options.subject {
            Some(name) => Subject::new(name),
            None => helper.get_subject(&schema, compiled.as_ref(), &options.separator)?,
        };

        let mut first_registration = false;
        if let Some(requested) = options.compatibility {
            match self.api.subject_config(&subject.name).await {
                Ok(config) => {
                    let existing = config.compatibility_level.to_uppercase();
                    if existing != requested.as_str() {
                        return Err(RegistryClientError::Compatibility(format!(
                            "Compatibility does not match the configuration ({} != {})",
                            requested, existing
                        )));
                    }
                }
                Err(e) if e.is_not_found() => first_registration = true,
                Err(e) => return Err(e),
            }
        }

        let response = self
            .api
            .register(&subject.name, &RegisterSchemaRequest::from(&schema))
            .await?;

        if first_registration {
            if let Some(requested) = options.compatibility {
                self.api
                    .update_subject_config(&subject.name, requested)
                    .await?;
            }
        }

        self.cache.set_schema(response.id, schema.schema_type, compiled);
        self.cache
            .set_latest_registry_id(&subject.name, response.id);

        tracing::info!(
            registry_id = response.id,
            subject = %subject.name,
            schema_type = %schema.schema_type,
            first_registration,
            "Schema registered"
        );

        Ok(RegisteredSchema { id: response.id })
    }

    /// Serialize `payload` with the schema registered under `registry_id` and wrap it in the
    /// wire envelope.
    pub async fn encode(&self, registry_id: Option<RegistryId>, payload: &Value) -> Result<Bytes> {
        let registry_id = registry_id.ok_or_else(|| {
            RegistryClientError::Argument("Invalid registryId: None".to_string())
        })?;

        let cached = self.get_cached_schema(registry_id).await?;
        let schema = &cached.schema;

        let buffer = match schema.to_buffer(payload) {
            Ok(buffer) => buffer,
            Err(e @ RegistryClientError::Validation { .. }) => return Err(e),
            Err(e) => {
                let mut paths = Vec::new();
                let mut hook = |path: String| paths.push(path);
                schema.is_valid(payload, Some(&mut hook));

                return Err(RegistryClientError::Validation {
                    message: e.to_string(),
                    paths,
                });
            }
        };

        Ok(wire::encode(registry_id, &buffer))
    }

    /// Decode an envelope produced by [`encode`](Self::encode) or any Confluent producer.
    pub async fn decode(
        &self,
        buffer: Option<&[u8]>,
        options: Option<&DecodeOptions>,
    ) -> Result<Value> {
        let buffer = buffer
            .ok_or_else(|| RegistryClientError::Argument("Invalid buffer: None".to_string()))?;

        let message = wire::decode(buffer)?;
        if message.magic_byte != MAGIC_BYTE {
            return Err(RegistryClientError::Argument(format!(
                "Message encoded with magic byte {}, expected {}",
                message.magic_byte, MAGIC_BYTE
            )));
        }

        let writer = self.get_cached_schema(message.registry_id).await?;

        let reader_schema = options.and_then(|o| o.reader_schema_for(writer.schema_type));
        match reader_schema {
            Some(reader_schema) => {
                self.decode_with_reader(&writer, reader_schema, message.payload)
            }
            None => writer.schema.from_buffer(message.payload),
        }
    }

    fn decode_with_reader(
        &self,
        writer: &CachedSchema,
        reader_schema: &str,
        payload: &[u8],
    ) -> Result<Value> {
        let reader = self
            .reader_schemas
            .try_get_with((writer.schema_type, reader_schema.to_string()), || {
                helper_for(writer.schema_type).compile(
                    &ConfluentSchema::new(writer.schema_type, reader_schema),
                    &self.options.for_schema_options,
                )
            })
            .map_err(|e| RegistryClientError::clone(&e))?;

        match (reader.as_avro(), writer.schema.as_avro()) {
            (Some(reader_avro), Some(writer_avro)) => {
                if reader_avro.equals(writer_avro) {
                    reader.from_buffer(payload)
                } else {
                    reader_avro.from_buffer_with_writer(payload, writer_avro)
                }
            }
            _ => reader.from_buffer(payload),
        }
    }

    /// Compiled schema for a registry id, from the cache or the registry.
    pub async fn get_schema(&self, registry_id: RegistryId) -> Result<CompiledSchema> {
        Ok(self.get_cached_schema(registry_id).await?.schema.clone())
    }

    /// Registry id of a subject version.
    pub async fn get_registry_id(
        &self,
        subject: &str,
        version: impl Into<Version>,
    ) -> Result<RegistryId> {
        let response = self.api.version(subject, version.into()).await?;
        Ok(response.id)
    }

    /// Registry id under which `schema` is already registered in `subject`.
    pub async fn get_registry_id_by_schema(
        &self,
        subject: &str,
        schema: impl Into<SchemaInput>,
    ) -> Result<RegistryId> {
        let schema = schema.into().into_confluent_schema();

        match self
            .api
            .registered(subject, &LookupSchemaRequest::from(&schema))
            .await
        {
            Ok(response) => Ok(response.id),
            Err(e) if e.is_not_found() => Err(RegistryClientError::NotFound(format!(
                "Schema not registered under subject '{}'",
                subject
            ))),
            Err(e) => Err(e),
        }
    }

    /// Registry id of the latest version of a subject.
    pub async fn get_latest_schema_id(&self, subject: &str) -> Result<RegistryId> {
        let response = self.api.latest_version(subject).await?;
        Ok(response.id)
    }

    /// Id most recently registered for `subject` through this client.
    pub fn latest_registered_id(&self, subject: &str) -> Option<RegistryId> {
        self.cache.get_latest_registry_id(subject)
    }

    async fn get_cached_schema(&self, registry_id: RegistryId) -> Result<Arc<CachedSchema>> {
        if let Some(cached) = self.cache.get_schema(registry_id) {
            tracing::debug!(registry_id, "Schema cache hit");
            return Ok(cached);
        }

        tracing::debug!(registry_id, "Schema cache miss");
        self.in_flight
            .run(registry_id, || self.fetch_schema(registry_id))
            .await
    }

    async fn fetch_schema(&self, registry_id: RegistryId) -> Result<Arc<CachedSchema>> {
        let record = self.api.find_schema(registry_id).await?;
        let schema_type = SchemaType::from_registry_field(record.schema_type_field())?;
        let helper: &dyn SchemaTypeHelper = helper_for(schema_type);

        let schema = helper.to_confluent_schema(&record);
        let referenced = resolve_references(self.api.as_ref(), &schema, helper).await?;
        let schema_options = helper.update_options_from_schema_references(
            &referenced,
            self.options.for_schema_options.clone(),
        );
        let compiled = helper.compile(&schema, &schema_options)?;

        tracing::debug!(
            registry_id,
            schema_type = %schema_type,
            references = referenced.len(),
            "Compiled schema from registry"
        );

        Ok(self.cache.set_schema(registry_id, schema_type, compiled))
    }
}

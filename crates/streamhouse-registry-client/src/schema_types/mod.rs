//! Schema kinds
//!
//! Everything that differs between Avro, Protobuf and JSON Schema sits behind two traits:
//!
//! - [`SchemaTypeHelper`]: per-kind behavior used while registering and compiling
//!   (validation, subject naming, reference folding, compilation).
//! - [`Schema`]: a compiled schema able to serialize, deserialize and validate payloads.
//!
//! Payloads are `serde_json::Value` for every kind. [`helper_for`] is the factory keyed by
//! [`SchemaType`].

pub mod avro;
pub mod json;
pub mod protobuf;

use crate::config::SchemaOptions;
use crate::error::Result;
use crate::references::ResolvedReference;
use crate::types::{ConfluentSchema, RawSchemaRecord, SchemaType, Subject};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

pub use avro::{AvroHelper, AvroSchema};
pub use json::{JsonHelper, JsonSchema};
pub use protobuf::{ProtoSchema, ProtobufHelper};

/// Receives the path of every invalid field found by [`Schema::is_valid`].
pub type ErrorHook<'a> = &'a mut dyn FnMut(String);

/// A compiled, format-specific schema.
pub trait Schema: Send + Sync + fmt::Debug {
    fn schema_type(&self) -> SchemaType;

    /// Serialize a payload. Fails when the payload does not fit the schema.
    fn to_buffer(&self, payload: &Value) -> Result<Vec<u8>>;

    /// Deserialize a payload written with this schema.
    fn from_buffer(&self, buffer: &[u8]) -> Result<Value>;

    /// Check a payload, reporting each invalid path to `error_hook`.
    fn is_valid(&self, payload: &Value, error_hook: Option<ErrorHook<'_>>) -> bool;

    /// Downcast used by writer/reader resolution, which only Avro supports.
    fn as_avro(&self) -> Option<&AvroSchema> {
        None
    }
}

/// Shared handle to a compiled schema
pub type CompiledSchema = Arc<dyn Schema>;

/// Per-kind behavior used by the client facade.
pub trait SchemaTypeHelper: Send + Sync {
    fn schema_type(&self) -> SchemaType;

    /// Structural sanity check of a compiled schema.
    fn validate(&self, schema: &dyn Schema) -> Result<()>;

    /// Derive a subject when the caller did not pass one.
    fn get_subject(
        &self,
        schema: &ConfluentSchema,
        compiled: &dyn Schema,
        separator: &str,
    ) -> Result<Subject>;

    /// Convert a registry record into a schema of this helper's kind.
    fn to_confluent_schema(&self, record: &dyn RawSchemaRecord) -> ConfluentSchema {
        ConfluentSchema {
            schema_type: self.schema_type(),
            schema: record.schema_text().to_string(),
            references: record.reference_list().to_vec(),
        }
    }

    /// Fold resolved references into the options used to compile the referencing schema.
    fn update_options_from_schema_references(
        &self,
        referenced: &[ResolvedReference],
        options: SchemaOptions,
    ) -> SchemaOptions;

    fn compile(&self, schema: &ConfluentSchema, options: &SchemaOptions) -> Result<CompiledSchema>;
}

static AVRO_HELPER: AvroHelper = AvroHelper;
static PROTOBUF_HELPER: ProtobufHelper = ProtobufHelper;
static JSON_HELPER: JsonHelper = JsonHelper;

/// Helper for a schema kind.
pub fn helper_for(schema_type: SchemaType) -> &'static dyn SchemaTypeHelper {
    match schema_type {
        SchemaType::Avro => &AVRO_HELPER,
        SchemaType::Protobuf => &PROTOBUF_HELPER,
        SchemaType::Json => &JSON_HELPER,
    }
}

/// Compile a schema with the helper of its own kind.
pub fn schema_from_confluent_schema(
    schema: &ConfluentSchema,
    options: &SchemaOptions,
) -> Result<CompiledSchema> {
    helper_for(schema.schema_type).compile(schema, options)
}

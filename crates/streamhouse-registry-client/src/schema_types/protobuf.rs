//! Protobuf schema support
//!
//! `.proto` sources are compiled in memory with `protox` into a `prost_reflect` descriptor
//! pool. Payloads go through `DynamicMessage` and its JSON mapping. Decoded messages list
//! every field of the message, default values included.

use super::{CompiledSchema, ErrorHook, Schema, SchemaTypeHelper};
use crate::config::SchemaOptions;
use crate::error::{RegistryClientError, Result};
use crate::references::ResolvedReference;
use crate::types::{ConfluentSchema, SchemaType, Subject};
use prost::Message;
use prost_reflect::{DeserializeOptions, DynamicMessage, MessageDescriptor, SerializeOptions};
use protox::file::{ChainFileResolver, File, FileResolver, GoogleFileResolver};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Name under which the registered schema itself is compiled.
const ROOT_FILE: &str = "registry_schema.proto";

/// Serves `.proto` sources held in memory.
struct InMemoryFileResolver {
    files: HashMap<String, String>,
}

impl FileResolver for InMemoryFileResolver {
    fn resolve_path(&self, path: &Path) -> Option<String> {
        path.to_str()
            .filter(|name| self.files.contains_key(*name))
            .map(str::to_owned)
    }

    fn open_file(&self, name: &str) -> std::result::Result<File, protox::Error> {
        match self.files.get(name) {
            Some(source) => File::from_source(name, source),
            None => Err(protox::Error::file_not_found(name)),
        }
    }
}

/// Compiled Protobuf schema bound to one message type.
#[derive(Debug, Clone)]
pub struct ProtoSchema {
    message: MessageDescriptor,
}

impl ProtoSchema {
    pub fn parse(schema: &str, options: &SchemaOptions) -> Result<Self> {
        let mut files: HashMap<String, String> = options
            .protobuf
            .imports
            .iter()
            .map(|(name, source)| (name.clone(), source.clone()))
            .collect();
        files.insert(ROOT_FILE.to_string(), schema.to_string());

        let mut resolver = ChainFileResolver::new();
        resolver.add(InMemoryFileResolver { files });
        resolver.add(GoogleFileResolver::new());

        let mut compiler = protox::Compiler::with_file_resolver(resolver);
        compiler.include_imports(true);
        compiler.open_file(ROOT_FILE).map_err(|e| {
            RegistryClientError::InvalidSchema(format!("Invalid Protobuf schema: {}", e))
        })?;
        let pool = compiler.descriptor_pool();

        let file = pool.get_file_by_name(ROOT_FILE).ok_or_else(|| {
            RegistryClientError::InvalidSchema("Compiled Protobuf schema is missing".to_string())
        })?;

        let message = match options.protobuf.message_name.as_deref() {
            Some(name) => {
                let name = name.trim_start_matches('.');
                let qualified = match file.package_name() {
                    "" => name.to_string(),
                    package => format!("{}.{}", package, name),
                };
                pool.get_message_by_name(name)
                    .or_else(|| pool.get_message_by_name(&qualified))
                    .ok_or_else(|| {
                        RegistryClientError::InvalidSchema(format!(
                            "Message '{}' not found in Protobuf schema",
                            name
                        ))
                    })?
            }
            None => file.messages().next().ok_or_else(|| {
                RegistryClientError::InvalidSchema(
                    "Protobuf schema does not define any message".to_string(),
                )
            })?,
        };

        Ok(Self { message })
    }

    pub fn message(&self) -> &MessageDescriptor {
        &self.message
    }

    fn to_message(&self, payload: &Value) -> std::result::Result<DynamicMessage, serde_json::Error> {
        DynamicMessage::deserialize_with_options(
            self.message.clone(),
            payload,
            &DeserializeOptions::new().deny_unknown_fields(false),
        )
    }
}

/// Drop leading zero bytes. A zero first byte is never a valid field tag, so these bytes
/// come from producers that prefix the message with an empty message-index list. An
/// all-zero buffer trims to nothing and decodes as the empty message.
fn trim_start(buffer: &[u8]) -> &[u8] {
    let start = buffer
        .iter()
        .position(|b| *b != 0)
        .unwrap_or(buffer.len());
    &buffer[start..]
}

impl Schema for ProtoSchema {
    fn schema_type(&self) -> SchemaType {
        SchemaType::Protobuf
    }

    fn to_buffer(&self, payload: &Value) -> Result<Vec<u8>> {
        let message = self.to_message(payload).map_err(|e| {
            RegistryClientError::Serialization(format!(
                "Payload does not match message {}: {}",
                self.message.full_name(),
                e
            ))
        })?;

        Ok(message.encode_to_vec())
    }

    fn from_buffer(&self, buffer: &[u8]) -> Result<Value> {
        let message = DynamicMessage::decode(self.message.clone(), trim_start(buffer))
            .map_err(|e| RegistryClientError::Deserialization(e.to_string()))?;

        message
            .serialize_with_options(
                serde_json::value::Serializer,
                &SerializeOptions::new()
                    .use_proto_field_name(true)
                    .skip_default_fields(false),
            )
            .map_err(|e| RegistryClientError::Deserialization(e.to_string()))
    }

    fn is_valid(&self, payload: &Value, error_hook: Option<ErrorHook<'_>>) -> bool {
        match self.to_message(payload) {
            Ok(_) => true,
            Err(e) => {
                if let Some(hook) = error_hook {
                    hook(e.to_string());
                }
                false
            }
        }
    }
}

/// Protobuf behavior
#[derive(Debug, Default, Clone, Copy)]
pub struct ProtobufHelper;

impl SchemaTypeHelper for ProtobufHelper {
    fn schema_type(&self) -> SchemaType {
        SchemaType::Protobuf
    }

    fn validate(&self, _schema: &dyn Schema) -> Result<()> {
        Ok(())
    }

    fn get_subject(
        &self,
        _schema: &ConfluentSchema,
        _compiled: &dyn Schema,
        _separator: &str,
    ) -> Result<Subject> {
        Err(RegistryClientError::Argument(
            "Cannot derive a subject from a Protobuf schema, pass an explicit subject".to_string(),
        ))
    }

    fn update_options_from_schema_references(
        &self,
        referenced: &[ResolvedReference],
        mut options: SchemaOptions,
    ) -> SchemaOptions {
        for reference in referenced {
            options
                .protobuf
                .imports
                .entry(reference.name.clone())
                .or_insert_with(|| reference.schema.schema.clone());
        }
        options
    }

    fn compile(&self, schema: &ConfluentSchema, options: &SchemaOptions) -> Result<CompiledSchema> {
        Ok(Arc::new(ProtoSchema::parse(&schema.schema, options)?))
    }
}

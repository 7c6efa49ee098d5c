//! Avro schema support
//!
//! Built on `apache_avro`. Payloads are converted with `Value::from(json)` and resolved
//! against the schema before encoding; decoded values are turned back into JSON.
//!
//! Avro is the only kind that supports writer/reader evolution on decode.

use super::{CompiledSchema, ErrorHook, Schema, SchemaTypeHelper};
use crate::config::SchemaOptions;
use crate::error::{RegistryClientError, Result};
use crate::references::ResolvedReference;
use crate::types::{ConfluentSchema, SchemaType, Subject};
use apache_avro::schema::{Name, RecordSchema};
use apache_avro::types::Value as AvroValue;
use apache_avro::Schema as RawAvroSchema;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Compiled Avro schema plus the schemas its named references resolve to.
#[derive(Debug, Clone)]
pub struct AvroSchema {
    schema: RawAvroSchema,
    referenced: Vec<RawAvroSchema>,
}

impl AvroSchema {
    /// Parse an Avro schema, making the named types of `referenced` available to it.
    pub fn parse(schema: &str, referenced: &[String]) -> Result<Self> {
        if referenced.is_empty() {
            let schema = RawAvroSchema::parse_str(schema).map_err(|e| {
                RegistryClientError::InvalidSchema(format!("Invalid Avro schema: {}", e))
            })?;
            return Ok(Self {
                schema,
                referenced: Vec::new(),
            });
        }

        let inputs: Vec<&str> = referenced
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(schema))
            .collect();

        let mut parsed = RawAvroSchema::parse_list(&inputs).map_err(|e| {
            RegistryClientError::InvalidSchema(format!("Invalid Avro schema: {}", e))
        })?;

        let schema = parsed.pop().ok_or_else(|| {
            RegistryClientError::InvalidSchema("Avro schema list parsed to nothing".to_string())
        })?;

        Ok(Self {
            schema,
            referenced: parsed,
        })
    }

    pub fn raw(&self) -> &RawAvroSchema {
        &self.schema
    }

    /// Fully qualified name of a named schema (record, enum, fixed).
    pub fn name(&self) -> Option<&Name> {
        self.schema.name()
    }

    /// Structural equality: identical type and field structure.
    pub fn equals(&self, other: &AvroSchema) -> bool {
        self.schema == other.schema
    }

    /// Every schema whose names the encoder and decoder may look up.
    fn schemata(&self) -> Vec<&RawAvroSchema> {
        self.referenced
            .iter()
            .chain(std::iter::once(&self.schema))
            .collect()
    }

    /// Decode data written with `writer`, resolving it into this (reader) schema.
    pub fn from_buffer_with_writer(&self, buffer: &[u8], writer: &AvroSchema) -> Result<Value> {
        let mut reader = buffer;
        let value = apache_avro::from_avro_datum_schemata(
            &writer.schema,
            writer.schemata(),
            &mut reader,
            Some(&self.schema),
        )
        .map_err(|e| {
            RegistryClientError::Deserialization(format!(
                "Failed to resolve Avro data from writer schema: {}",
                e
            ))
        })?;

        avro_to_json(value)
    }

    fn names(&self) -> HashMap<String, &RawAvroSchema> {
        let mut names = HashMap::new();
        for schema in self.schemata() {
            collect_names(schema, &mut names);
        }
        names
    }
}

impl Schema for AvroSchema {
    fn schema_type(&self) -> SchemaType {
        SchemaType::Avro
    }

    fn to_buffer(&self, payload: &Value) -> Result<Vec<u8>> {
        // Resolution narrows JSON integers with `as`, so ranges are checked here first.
        let mut paths = Vec::new();
        let mut hook = |path: String| paths.push(path);
        if !self.is_valid(payload, Some(&mut hook)) {
            return Err(RegistryClientError::Validation {
                message: "Payload does not match Avro schema".to_string(),
                paths,
            });
        }

        let value = AvroValue::from(payload.clone())
            .resolve_schemata(&self.schema, self.schemata())
            .map_err(|e| {
                RegistryClientError::Serialization(format!(
                    "Payload does not match Avro schema: {}",
                    e
                ))
            })?;

        apache_avro::to_avro_datum_schemata(&self.schema, self.schemata(), value)
            .map_err(|e| RegistryClientError::Serialization(e.to_string()))
    }

    fn from_buffer(&self, buffer: &[u8]) -> Result<Value> {
        let mut reader = buffer;
        let value =
            apache_avro::from_avro_datum_schemata(&self.schema, self.schemata(), &mut reader, None)
                .map_err(|e| RegistryClientError::Deserialization(e.to_string()))?;

        avro_to_json(value)
    }

    fn is_valid(&self, payload: &Value, error_hook: Option<ErrorHook<'_>>) -> bool {
        let names = self.names();
        let mut invalid = Vec::new();
        check_value(payload, &self.schema, &names, &mut Vec::new(), &mut invalid);

        if let Some(hook) = error_hook {
            for path in &invalid {
                hook(path.clone());
            }
        }
        invalid.is_empty()
    }

    fn as_avro(&self) -> Option<&AvroSchema> {
        Some(self)
    }
}

fn avro_to_json(value: AvroValue) -> Result<Value> {
    Value::try_from(value).map_err(|e| {
        RegistryClientError::Deserialization(format!("Avro value has no JSON form: {}", e))
    })
}

fn collect_names<'a>(schema: &'a RawAvroSchema, names: &mut HashMap<String, &'a RawAvroSchema>) {
    match schema {
        RawAvroSchema::Record(RecordSchema { name, fields, .. }) => {
            names.insert(name.fullname(None), schema);
            for field in fields {
                collect_names(&field.schema, names);
            }
        }
        RawAvroSchema::Enum(e) => {
            names.insert(e.name.fullname(None), schema);
        }
        RawAvroSchema::Fixed(f) => {
            names.insert(f.name.fullname(None), schema);
        }
        RawAvroSchema::Array(array) => collect_names(&array.items, names),
        RawAvroSchema::Map(map) => collect_names(&map.types, names),
        RawAvroSchema::Union(union) => {
            for variant in union.variants() {
                collect_names(variant, names);
            }
        }
        _ => {}
    }
}

fn join_path(path: &[String]) -> String {
    if path.is_empty() {
        "$".to_string()
    } else {
        path.join(".")
    }
}

/// Walk a JSON payload alongside an Avro schema, pushing the path of every mismatch.
fn check_value(
    value: &Value,
    schema: &RawAvroSchema,
    names: &HashMap<String, &RawAvroSchema>,
    path: &mut Vec<String>,
    invalid: &mut Vec<String>,
) {
    if !matches_schema(value, schema, names, path, invalid) {
        invalid.push(join_path(path));
    }
}

/// `true` when `value` fits `schema` at this level. Nested mismatches are reported into
/// `invalid` directly so every failing leaf is listed.
fn matches_schema(
    value: &Value,
    schema: &RawAvroSchema,
    names: &HashMap<String, &RawAvroSchema>,
    path: &mut Vec<String>,
    invalid: &mut Vec<String>,
) -> bool {
    match schema {
        RawAvroSchema::Null => value.is_null(),
        RawAvroSchema::Boolean => value.is_boolean(),
        RawAvroSchema::Int | RawAvroSchema::Date | RawAvroSchema::TimeMillis => value
            .as_i64()
            .map(|n| i32::try_from(n).is_ok())
            .unwrap_or(false),
        RawAvroSchema::Long
        | RawAvroSchema::TimeMicros
        | RawAvroSchema::TimestampMillis
        | RawAvroSchema::TimestampMicros
        | RawAvroSchema::LocalTimestampMillis
        | RawAvroSchema::LocalTimestampMicros => value.is_i64(),
        RawAvroSchema::Float | RawAvroSchema::Double => value.is_number(),
        RawAvroSchema::String | RawAvroSchema::Uuid => value.is_string(),
        RawAvroSchema::Bytes | RawAvroSchema::Fixed(_) | RawAvroSchema::Decimal(_) => {
            value.is_string()
                || value.as_array().is_some_and(|items| {
                    items
                        .iter()
                        .all(|b| b.as_u64().is_some_and(|b| b <= u8::MAX as u64))
                })
        }
        RawAvroSchema::Enum(e) => value
            .as_str()
            .is_some_and(|symbol| e.symbols.iter().any(|s| s == symbol)),
        RawAvroSchema::Array(array) => match value.as_array() {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    path.push(i.to_string());
                    check_value(item, &array.items, names, path, invalid);
                    path.pop();
                }
                true
            }
            None => false,
        },
        RawAvroSchema::Map(map) => match value.as_object() {
            Some(entries) => {
                for (key, item) in entries {
                    path.push(key.clone());
                    check_value(item, &map.types, names, path, invalid);
                    path.pop();
                }
                true
            }
            None => false,
        },
        RawAvroSchema::Union(union) => union.variants().iter().any(|variant| {
            let mut scratch = Vec::new();
            matches_schema(value, variant, names, path, &mut scratch) && scratch.is_empty()
        }),
        RawAvroSchema::Record(record) => match value.as_object() {
            Some(object) => {
                for field in &record.fields {
                    path.push(field.name.clone());
                    match object.get(&field.name) {
                        Some(field_value) => {
                            check_value(field_value, &field.schema, names, path, invalid)
                        }
                        None if field.default.is_some() => {}
                        None => invalid.push(join_path(path)),
                    }
                    path.pop();
                }
                true
            }
            None => false,
        },
        RawAvroSchema::Ref { name } => match names.get(&name.fullname(None)) {
            Some(resolved) => matches_schema(value, resolved, names, path, invalid),
            None => true,
        },
        _ => true,
    }
}

/// Avro behavior
#[derive(Debug, Default, Clone, Copy)]
pub struct AvroHelper;

impl SchemaTypeHelper for AvroHelper {
    fn schema_type(&self) -> SchemaType {
        SchemaType::Avro
    }

    fn validate(&self, schema: &dyn Schema) -> Result<()> {
        let avro = schema.as_avro().ok_or_else(|| {
            RegistryClientError::InvalidSchema(format!(
                "Expected an Avro schema, got {}",
                schema.schema_type()
            ))
        })?;

        match avro.name() {
            Some(name) if !name.name.is_empty() => Ok(()),
            _ => Err(RegistryClientError::InvalidSchema(
                "Avro schema must be a named type (record, enum or fixed)".to_string(),
            )),
        }
    }

    fn get_subject(
        &self,
        _schema: &ConfluentSchema,
        compiled: &dyn Schema,
        separator: &str,
    ) -> Result<Subject> {
        let name = compiled
            .as_avro()
            .and_then(AvroSchema::name)
            .ok_or_else(|| RegistryClientError::Argument("Invalid name: schema has no name".into()))?;

        match name.namespace.as_deref() {
            Some(namespace) if !namespace.is_empty() => Ok(Subject::new(format!(
                "{}{}{}",
                namespace, separator, name.name
            ))),
            _ => Err(RegistryClientError::Argument(format!(
                "Invalid namespace: schema '{}' has no namespace, pass an explicit subject",
                name.name
            ))),
        }
    }

    fn update_options_from_schema_references(
        &self,
        referenced: &[ResolvedReference],
        mut options: SchemaOptions,
    ) -> SchemaOptions {
        for reference in referenced {
            if !options
                .avro
                .referenced_schemas
                .contains(&reference.schema.schema)
            {
                options
                    .avro
                    .referenced_schemas
                    .push(reference.schema.schema.clone());
            }
        }
        options
    }

    fn compile(&self, schema: &ConfluentSchema, options: &SchemaOptions) -> Result<CompiledSchema> {
        let compiled = AvroSchema::parse(&schema.schema, &options.avro.referenced_schemas)?;
        Ok(Arc::new(compiled))
    }
}

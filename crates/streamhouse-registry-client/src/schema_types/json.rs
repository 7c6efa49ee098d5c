//! JSON Schema support
//!
//! Payloads are validated with `jsonschema` and written as plain JSON bytes.

use super::{CompiledSchema, ErrorHook, Schema, SchemaTypeHelper};
use crate::config::SchemaOptions;
use crate::error::{RegistryClientError, Result};
use crate::references::ResolvedReference;
use crate::types::{ConfluentSchema, SchemaType, Subject};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Compiled JSON Schema
pub struct JsonSchema {
    schema: Value,
    validator: jsonschema::Validator,
}

impl fmt::Debug for JsonSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSchema")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl JsonSchema {
    pub fn parse(schema: &str, options: &SchemaOptions) -> Result<Self> {
        let schema: Value = serde_json::from_str(schema).map_err(|e| {
            RegistryClientError::InvalidSchema(format!("Invalid JSON schema: {}", e))
        })?;

        let mut builder = jsonschema::options();
        for (uri, document) in &options.json.referenced_schemas {
            let contents: Value = serde_json::from_str(document).map_err(|e| {
                RegistryClientError::InvalidSchema(format!(
                    "Invalid referenced JSON schema '{}': {}",
                    uri, e
                ))
            })?;
            let resource = jsonschema::Resource::from_contents(contents).map_err(|e| {
                RegistryClientError::InvalidSchema(format!(
                    "Invalid referenced JSON schema '{}': {}",
                    uri, e
                ))
            })?;
            builder.with_resource(uri.clone(), resource);
        }

        let validator = builder.build(&schema).map_err(|e| {
            RegistryClientError::InvalidSchema(format!("Failed to compile JSON schema: {}", e))
        })?;

        Ok(Self { schema, validator })
    }

    pub fn raw(&self) -> &Value {
        &self.schema
    }
}

impl Schema for JsonSchema {
    fn schema_type(&self) -> SchemaType {
        SchemaType::Json
    }

    fn to_buffer(&self, payload: &Value) -> Result<Vec<u8>> {
        let paths: Vec<String> = self
            .validator
            .iter_errors(payload)
            .map(|e| e.instance_path.to_string())
            .collect();

        if !paths.is_empty() {
            return Err(RegistryClientError::Validation {
                message: "Payload does not match JSON schema".to_string(),
                paths,
            });
        }

        Ok(serde_json::to_vec(payload)?)
    }

    fn from_buffer(&self, buffer: &[u8]) -> Result<Value> {
        serde_json::from_slice(buffer).map_err(|e| {
            RegistryClientError::Deserialization(format!("Payload is not valid JSON: {}", e))
        })
    }

    fn is_valid(&self, payload: &Value, error_hook: Option<ErrorHook<'_>>) -> bool {
        match error_hook {
            Some(hook) => {
                let mut valid = true;
                for error in self.validator.iter_errors(payload) {
                    valid = false;
                    hook(error.instance_path.to_string());
                }
                valid
            }
            None => self.validator.is_valid(payload),
        }
    }
}

/// JSON Schema behavior
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonHelper;

impl SchemaTypeHelper for JsonHelper {
    fn schema_type(&self) -> SchemaType {
        SchemaType::Json
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
            "Cannot derive a subject from a JSON schema, pass an explicit subject".to_string(),
        ))
    }

    fn update_options_from_schema_references(
        &self,
        referenced: &[ResolvedReference],
        mut options: SchemaOptions,
    ) -> SchemaOptions {
        for reference in referenced {
            options
                .json
                .referenced_schemas
                .entry(reference.name.clone())
                .or_insert_with(|| reference.schema.schema.clone());
        }
        options
    }

    fn compile(&self, schema: &ConfluentSchema, options: &SchemaOptions) -> Result<CompiledSchema> {
        Ok(Arc::new(JsonSchema::parse(&schema.schema, options)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PERSON: &str = r#"{
        "type": "object",
        "properties": {
            "name": {"type": "string"},
            "age": {"type": "integer", "minimum": 0}
        },
        "required": ["name"]
    }"#;

    fn compile(schema: &str, options: &SchemaOptions) -> CompiledSchema {
        JsonHelper
            .compile(&ConfluentSchema::json(schema), options)
            .unwrap()
    }

    #[test]
    fn test_round_trip() {
        let schema = compile(PERSON, &SchemaOptions::default());
        let payload = json!({"name": "Ada", "age": 36});

        let buffer = schema.to_buffer(&payload).unwrap();
        assert_eq!(buffer, serde_json::to_vec(&payload).unwrap());
        assert_eq!(schema.from_buffer(&buffer).unwrap(), payload);
    }

    #[test]
    fn test_to_buffer_reports_validation_paths() {
        let schema = compile(PERSON, &SchemaOptions::default());
        let err = schema.to_buffer(&json!({"name": "Ada", "age": -1})).unwrap_err();

        match err {
            RegistryClientError::Validation { paths, .. } => assert_eq!(paths, vec!["/age"]),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_is_valid_hook() {
        let schema = compile(PERSON, &SchemaOptions::default());
        let mut paths = Vec::new();
        let mut hook = |path: String| paths.push(path);

        assert!(!schema.is_valid(&json!({"name": 5}), Some(&mut hook)));
        assert_eq!(paths, vec!["/name".to_string()]);
        assert!(schema.is_valid(&json!({"name": "x"}), None));
    }

    #[test]
    fn test_from_buffer_rejects_garbage() {
        let schema = compile(PERSON, &SchemaOptions::default());
        assert!(matches!(
            schema.from_buffer(b"{not json"),
            Err(RegistryClientError::Deserialization(_))
        ));
    }

    #[test]
    fn test_referenced_schema_resolution() {
        let address = r#"{
            "type": "object",
            "properties": {"city": {"type": "string"}},
            "required": ["city"]
        }"#;
        let options = JsonHelper.update_options_from_schema_references(
            &[ResolvedReference {
                name: "https://schemas.acme.com/address.json".to_string(),
                schema: ConfluentSchema::json(address),
            }],
            SchemaOptions::default(),
        );

        let schema = compile(
            r#"{
                "type": "object",
                "properties": {
                    "address": {"$ref": "https://schemas.acme.com/address.json"}
                }
            }"#,
            &options,
        );

        assert!(schema.is_valid(&json!({"address": {"city": "Oslo"}}), None));
        assert!(!schema.is_valid(&json!({"address": {}}), None));
    }

    #[test]
    fn test_get_subject_requires_explicit_subject() {
        let schema = compile(PERSON, &SchemaOptions::default());
        let err = JsonHelper
            .get_subject(&ConfluentSchema::json(PERSON), schema.as_ref(), ".")
            .unwrap_err();
        assert!(matches!(err, RegistryClientError::Argument(_)));
    }

    #[test]
    fn test_invalid_schema_rejected() {
        let result = JsonHelper.compile(&ConfluentSchema::json("{oops"), &SchemaOptions::default());
        assert!(matches!(result, Err(RegistryClientError::InvalidSchema(_))));
    }
}

//! Core registry client types
//!
//! Value types shared by the wire codec, the schema helpers and the facade, plus the
//! Confluent REST records exchanged with the registry.

use crate::error::{RegistryClientError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Registry id of a schema body. Unique per body, not per subject+version.
pub type RegistryId = u32;

/// Schema kind (Avro, Protobuf, JSON Schema)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SchemaType {
    #[default]
    Avro,
    Protobuf,
    Json,
}

impl SchemaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaType::Avro => "AVRO",
            SchemaType::Protobuf => "PROTOBUF",
            SchemaType::Json => "JSON",
        }
    }

    /// Value of the `schemaType` field sent to the registry.
    ///
    /// Avro is the registry default and is sent without a type.
    pub fn registry_field(&self) -> Option<SchemaType> {
        match self {
            SchemaType::Avro => None,
            other => Some(*other),
        }
    }

    /// Parse the `schemaType` field of a registry record; an absent field means Avro.
    pub fn from_registry_field(field: Option<&str>) -> Result<Self> {
        match field {
            None => Ok(SchemaType::Avro),
            Some(s) => s.parse(),
        }
    }
}

impl FromStr for SchemaType {
    type Err = RegistryClientError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "AVRO" => Ok(SchemaType::Avro),
            "PROTOBUF" => Ok(SchemaType::Protobuf),
            "JSON" => Ok(SchemaType::Json),
            other => Err(RegistryClientError::UnsupportedSchemaType(other.to_string())),
        }
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compatibility level of a subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompatibilityMode {
    /// New schema can read data written with old schema
    #[default]
    Backward,

    /// Old schema can read data written with new schema
    Forward,

    /// Both backward and forward compatible
    Full,

    /// Backward compatible with all previous versions
    BackwardTransitive,

    /// Forward compatible with all previous versions
    ForwardTransitive,

    /// Full compatibility with all previous versions
    FullTransitive,

    /// No compatibility checking
    None,
}

impl CompatibilityMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompatibilityMode::Backward => "BACKWARD",
            CompatibilityMode::Forward => "FORWARD",
            CompatibilityMode::Full => "FULL",
            CompatibilityMode::BackwardTransitive => "BACKWARD_TRANSITIVE",
            CompatibilityMode::ForwardTransitive => "FORWARD_TRANSITIVE",
            CompatibilityMode::FullTransitive => "FULL_TRANSITIVE",
            CompatibilityMode::None => "NONE",
        }
    }
}

impl FromStr for CompatibilityMode {
    type Err = RegistryClientError;

    /// Case-insensitive, registries are not consistent about the casing they return.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "BACKWARD" => Ok(CompatibilityMode::Backward),
            "FORWARD" => Ok(CompatibilityMode::Forward),
            "FULL" => Ok(CompatibilityMode::Full),
            "BACKWARD_TRANSITIVE" => Ok(CompatibilityMode::BackwardTransitive),
            "FORWARD_TRANSITIVE" => Ok(CompatibilityMode::ForwardTransitive),
            "FULL_TRANSITIVE" => Ok(CompatibilityMode::FullTransitive),
            "NONE" => Ok(CompatibilityMode::None),
            other => Err(RegistryClientError::Config(format!(
                "Unknown compatibility level '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for CompatibilityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to another registered schema
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaReference {
    pub name: String,
    pub subject: String,
    pub version: i32,
}

impl SchemaReference {
    pub fn new(name: impl Into<String>, subject: impl Into<String>, version: i32) -> Self {
        Self {
            name: name.into(),
            subject: subject.into(),
            version,
        }
    }

    /// Identity used to deduplicate reference graphs.
    pub fn key(&self) -> String {
        format!("{}-{}-{}", self.name, self.subject, self.version)
    }
}

/// A schema as registered: kind, text and references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfluentSchema {
    #[serde(rename = "schemaType", default)]
    pub schema_type: SchemaType,

    pub schema: String,

    #[serde(default)]
    pub references: Vec<SchemaReference>,
}

impl ConfluentSchema {
    pub fn new(schema_type: SchemaType, schema: impl Into<String>) -> Self {
        Self {
            schema_type,
            schema: schema.into(),
            references: Vec::new(),
        }
    }

    pub fn avro(schema: impl Into<String>) -> Self {
        Self::new(SchemaType::Avro, schema)
    }

    pub fn protobuf(schema: impl Into<String>) -> Self {
        Self::new(SchemaType::Protobuf, schema)
    }

    pub fn json(schema: impl Into<String>) -> Self {
        Self::new(SchemaType::Json, schema)
    }

    pub fn with_references(mut self, references: Vec<SchemaReference>) -> Self {
        self.references = references;
        self
    }
}

/// Input accepted by `register` and `get_registry_id_by_schema`.
///
/// `RawAvro` is the legacy form: a bare Avro schema document, normalized into an
/// Avro `ConfluentSchema` without references.
#[derive(Debug, Clone)]
pub enum SchemaInput {
    Confluent(ConfluentSchema),
    RawAvro(serde_json::Value),
}

impl SchemaInput {
    pub fn into_confluent_schema(self) -> ConfluentSchema {
        match self {
            SchemaInput::Confluent(schema) => schema,
            SchemaInput::RawAvro(raw) => ConfluentSchema::avro(raw.to_string()),
        }
    }
}

impl From<ConfluentSchema> for SchemaInput {
    fn from(schema: ConfluentSchema) -> Self {
        SchemaInput::Confluent(schema)
    }
}

impl From<serde_json::Value> for SchemaInput {
    fn from(raw: serde_json::Value) -> Self {
        SchemaInput::RawAvro(raw)
    }
}

/// A named evolution lineage in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub name: String,
}

impl Subject {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Subject version selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Number(i32),
    Latest,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Number(v) => write!(f, "{}", v),
            Version::Latest => f.write_str("latest"),
        }
    }
}

impl From<i32> for Version {
    fn from(v: i32) -> Self {
        Version::Number(v)
    }
}

/// Result of a successful `register`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredSchema {
    pub id: RegistryId,
}

// ============================================================================
// Registry REST records
// ============================================================================

/// Body of `POST /subjects/{subject}/versions`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterSchemaRequest {
    #[serde(rename = "schemaType", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<SchemaType>,

    pub schema: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<SchemaReference>,
}

impl From<&ConfluentSchema> for RegisterSchemaRequest {
    fn from(schema: &ConfluentSchema) -> Self {
        Self {
            schema_type: schema.schema_type.registry_field(),
            schema: schema.schema.clone(),
            references: schema.references.clone(),
        }
    }
}

/// Body of `POST /subjects/{subject}` (already-registered lookup)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupSchemaRequest {
    #[serde(rename = "schemaType", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<SchemaType>,

    pub schema: String,
}

impl From<&ConfluentSchema> for LookupSchemaRequest {
    fn from(schema: &ConfluentSchema) -> Self {
        Self {
            schema_type: schema.schema_type.registry_field(),
            schema: schema.schema.clone(),
        }
    }
}

/// Schema registration response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterSchemaResponse {
    pub id: RegistryId,
}

/// Raw schema record as returned by the registry.
///
/// `schemaType` is kept as text so unknown kinds surface as `UnsupportedSchemaType`
/// instead of a parse failure.
pub trait RawSchemaRecord {
    fn schema_text(&self) -> &str;
    fn schema_type_field(&self) -> Option<&str>;
    fn reference_list(&self) -> &[SchemaReference];
}

/// Response of `GET /subjects/{subject}/versions/{version}` and `POST /subjects/{subject}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectVersionResponse {
    #[serde(default)]
    pub subject: String,

    #[serde(default)]
    pub version: i32,

    pub id: RegistryId,

    pub schema: String,

    #[serde(rename = "schemaType", default, skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,

    #[serde(default)]
    pub references: Vec<SchemaReference>,
}

impl RawSchemaRecord for SubjectVersionResponse {
    fn schema_text(&self) -> &str {
        &self.schema
    }

    fn schema_type_field(&self) -> Option<&str> {
        self.schema_type.as_deref()
    }

    fn reference_list(&self) -> &[SchemaReference] {
        &self.references
    }
}

/// Response of `GET /schemas/ids/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaByIdResponse {
    pub schema: String,

    #[serde(rename = "schemaType", default, skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,

    #[serde(default)]
    pub references: Vec<SchemaReference>,
}

impl RawSchemaRecord for SchemaByIdResponse {
    fn schema_text(&self) -> &str {
        &self.schema
    }

    fn schema_type_field(&self) -> Option<&str> {
        self.schema_type.as_deref()
    }

    fn reference_list(&self) -> &[SchemaReference] {
        &self.references
    }
}

/// Response of `GET /config/{subject}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectConfigResponse {
    #[serde(rename = "compatibilityLevel")]
    pub compatibility_level: String,
}

/// Body of `PUT /config/{subject}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfigRequest {
    pub compatibility: CompatibilityMode,
}

//! StreamHouse Registry Client
//!
//! Client for Confluent-compatible schema registries: registers schemas, encodes payloads
//! into the schema-tagged wire envelope and decodes them back.
//!
//! # Features
//!
//! - **Schema Formats**: Avro, Protobuf, JSON Schema, with schema references
//! - **Wire Format**: `[0x00][registry id, 4 bytes big-endian][payload]`
//! - **Caching**: compiled schemas cached by registry id, one registry fetch per id even
//!   under concurrent cache misses
//! - **Compatibility**: subject compatibility checked before registering, set on first
//!   registration
//! - **Schema Evolution**: Avro payloads decoded into a caller-supplied reader schema
//!
//! # Usage
//!
//! ```ignore
//! use serde_json::json;
//! use streamhouse_registry_client::{
//!     ClientOptions, ConfluentSchema, RegisterOptions, RegistryConfig, SchemaRegistryClient,
//! };
//!
//! let client = SchemaRegistryClient::from_config(
//!     RegistryConfig::new("http://localhost:8081"),
//!     ClientOptions::default(),
//! )?;
//!
//! let schema = r#"{"type": "record", "name": "User", "namespace": "com.acme",
//!                  "fields": [{"name": "name", "type": "string"}]}"#;
//! let registered = client
//!     .register(ConfluentSchema::avro(schema), RegisterOptions::default())
//!     .await?;
//!
//! let bytes = client.encode(Some(registered.id), &json!({"name": "Ada"})).await?;
//! let user = client.decode(Some(&bytes), None).await?;
//! ```

pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod references;
pub mod retry;
pub mod schema_types;
pub mod single_flight;
pub mod types;
pub mod wire;

pub use api::{HttpRegistryApi, RegistryApi};
pub use client::SchemaRegistryClient;
pub use config::{
    AvroDecodeOptions, AvroOptions, BasicAuth, ClientOptions, DecodeOptions, JsonOptions,
    ProtobufOptions, RegisterOptions, RegistryConfig, SchemaOptions,
};
pub use error::{RegistryClientError, Result};
pub use references::ResolvedReference;
pub use retry::RetryPolicy;
pub use schema_types::{helper_for, CompiledSchema, Schema, SchemaTypeHelper};
pub use types::*;

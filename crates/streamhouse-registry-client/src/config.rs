//! Client configuration
//!
//! Two layers:
//!
//! - [`RegistryConfig`]: how to reach the registry (host, credentials, timeout, retries).
//!   Can be loaded from the environment with [`RegistryConfig::from_env`].
//! - Schema options: per-kind compiler options ([`SchemaOptions`]), per-call register
//!   options ([`RegisterOptions`]) and decode options ([`DecodeOptions`]).
//!
//! # Environment Variables
//!
//! - `SCHEMA_REGISTRY_URL`: registry base URL (required)
//! - `SCHEMA_REGISTRY_USERNAME` / `SCHEMA_REGISTRY_PASSWORD`: basic auth (optional)
//! - `SCHEMA_REGISTRY_CLIENT_ID`: sent as `User-Agent` (default: `Confluent_Schema_Registry`)

use crate::error::{RegistryClientError, Result};
use crate::retry::RetryPolicy;
use crate::types::{CompatibilityMode, SchemaType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Default separator between namespace and name in derived subjects
pub const DEFAULT_SEPARATOR: &str = ".";

/// Default client id
pub const DEFAULT_CLIENT_ID: &str = "Confluent_Schema_Registry";

/// Basic auth credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

/// Registry transport configuration
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Base URL, e.g. `http://localhost:8081`
    pub host: String,

    /// Sent as `User-Agent` on every request
    pub client_id: String,

    pub auth: Option<BasicAuth>,

    /// Per-request timeout. Default: 10s
    pub timeout: Duration,

    /// Retry policy for transient transport failures
    pub retry: RetryPolicy,
}

impl RegistryConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            auth: None,
            timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some(BasicAuth {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Load configuration from `SCHEMA_REGISTRY_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = lookup("SCHEMA_REGISTRY_URL")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| RegistryClientError::Config("SCHEMA_REGISTRY_URL is not set".into()))?;

        let mut config = Self::new(host);

        if let Some(client_id) = lookup("SCHEMA_REGISTRY_CLIENT_ID").filter(|s| !s.is_empty()) {
            config.client_id = client_id;
        }

        match (
            lookup("SCHEMA_REGISTRY_USERNAME"),
            lookup("SCHEMA_REGISTRY_PASSWORD"),
        ) {
            (Some(username), Some(password)) => {
                config.auth = Some(BasicAuth { username, password });
            }
            (Some(_), None) => {
                return Err(RegistryClientError::Config(
                    "SCHEMA_REGISTRY_USERNAME is set without SCHEMA_REGISTRY_PASSWORD".into(),
                ));
            }
            _ => {}
        }

        Ok(config)
    }
}

/// Avro compiler options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvroOptions {
    /// Raw Avro schemas whose named types the compiled schema may refer to.
    pub referenced_schemas: Vec<String>,
}

/// Protobuf compiler options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtobufOptions {
    /// Message to encode/decode. Either fully qualified (`com.acme.Order`) or relative to
    /// the file's package. Defaults to the first message of the file.
    pub message_name: Option<String>,

    /// Import path -> `.proto` source for files the schema imports.
    pub imports: BTreeMap<String, String>,
}

/// JSON Schema compiler options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonOptions {
    /// `$ref` URI -> JSON Schema document.
    pub referenced_schemas: BTreeMap<String, String>,
}

/// Compiler options for every schema kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaOptions {
    pub avro: AvroOptions,
    pub protobuf: ProtobufOptions,
    pub json: JsonOptions,
}

/// Options owned by the client and applied to every schema it compiles
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    #[serde(rename = "forSchemaOptions")]
    pub for_schema_options: SchemaOptions,
}

/// Options for a single `register` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterOptions {
    /// Compatibility level the subject must have. `None` skips the check and leaves a new
    /// subject on the registry's global level.
    pub compatibility: Option<CompatibilityMode>,

    /// Joins namespace and name when the subject is derived from the schema.
    pub separator: String,

    /// Explicit subject; required for Protobuf and JSON schemas.
    pub subject: Option<String>,
}

impl Default for RegisterOptions {
    fn default() -> Self {
        Self {
            compatibility: Some(CompatibilityMode::Backward),
            separator: DEFAULT_SEPARATOR.to_string(),
            subject: None,
        }
    }
}

impl RegisterOptions {
    pub fn subject(subject: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            ..Self::default()
        }
    }

    pub fn with_compatibility(mut self, compatibility: CompatibilityMode) -> Self {
        self.compatibility = Some(compatibility);
        self
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }
}

/// Avro decode options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvroDecodeOptions {
    /// Schema to decode into; data is resolved from the writer schema when they differ.
    #[serde(rename = "readerSchema")]
    pub reader_schema: Option<String>,
}

/// Options for a single `decode` call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    #[serde(rename = "AVRO")]
    pub avro: AvroDecodeOptions,
}

impl DecodeOptions {
    pub fn with_avro_reader_schema(reader_schema: impl Into<String>) -> Self {
        Self {
            avro: AvroDecodeOptions {
                reader_schema: Some(reader_schema.into()),
            },
        }
    }

    /// Reader schema supplied for the given kind. Only Avro supports evolution on decode.
    pub fn reader_schema_for(&self, schema_type: SchemaType) -> Option<&str> {
        match schema_type {
            SchemaType::Avro => self.avro.reader_schema.as_deref(),
            SchemaType::Protobuf | SchemaType::Json => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_register_options_defaults() {
        let opts = RegisterOptions::default();
        assert_eq!(opts.compatibility, Some(CompatibilityMode::Backward));
        assert_eq!(opts.separator, ".");
        assert!(opts.subject.is_none());
    }

    #[test]
    fn test_register_options_partial_deserialize_keeps_defaults() {
        let opts: RegisterOptions = serde_json::from_str(r#"{"separator": "-"}"#).unwrap();
        assert_eq!(opts.separator, "-");
        assert_eq!(opts.compatibility, Some(CompatibilityMode::Backward));

        let opts: RegisterOptions =
            serde_json::from_str(r#"{"compatibility": "FULL", "subject": "orders-value"}"#)
                .unwrap();
        assert_eq!(opts.compatibility, Some(CompatibilityMode::Full));
        assert_eq!(opts.subject.as_deref(), Some("orders-value"));
    }

    #[test]
    fn test_decode_options_reader_schema_only_for_avro() {
        let opts = DecodeOptions::with_avro_reader_schema(r#"{"type":"string"}"#);
        assert!(opts.reader_schema_for(SchemaType::Avro).is_some());
        assert!(opts.reader_schema_for(SchemaType::Protobuf).is_none());
        assert!(opts.reader_schema_for(SchemaType::Json).is_none());
    }

    #[test]
    fn test_decode_options_deserialize() {
        let opts: DecodeOptions =
            serde_json::from_str(r#"{"AVRO": {"readerSchema": "\"string\""}}"#).unwrap();
        assert_eq!(opts.avro.reader_schema.as_deref(), Some("\"string\""));
    }

    #[test]
    fn test_client_options_deserialize() {
        let opts: ClientOptions = serde_json::from_str(
            r#"{"forSchemaOptions": {"protobuf": {"message_name": "Order"}}}"#,
        )
        .unwrap();
        assert_eq!(
            opts.for_schema_options.protobuf.message_name.as_deref(),
            Some("Order")
        );
        assert!(opts.for_schema_options.avro.referenced_schemas.is_empty());
    }

    #[test]
    fn test_registry_config_from_env() {
        let config = RegistryConfig::from_lookup(lookup_from(&[
            ("SCHEMA_REGISTRY_URL", "http://registry:8081"),
            ("SCHEMA_REGISTRY_USERNAME", "svc"),
            ("SCHEMA_REGISTRY_PASSWORD", "secret"),
            ("SCHEMA_REGISTRY_CLIENT_ID", "orders-service"),
        ]))
        .unwrap();

        assert_eq!(config.host, "http://registry:8081");
        assert_eq!(config.client_id, "orders-service");
        assert_eq!(
            config.auth,
            Some(BasicAuth {
                username: "svc".into(),
                password: "secret".into()
            })
        );
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_registry_config_from_env_defaults() {
        let config =
            RegistryConfig::from_lookup(lookup_from(&[("SCHEMA_REGISTRY_URL", "http://r")]))
                .unwrap();
        assert_eq!(config.client_id, DEFAULT_CLIENT_ID);
        assert!(config.auth.is_none());
    }

    #[test]
    fn test_registry_config_from_env_requires_url() {
        let err = RegistryConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, RegistryClientError::Config(_)));
    }

    #[test]
    fn test_registry_config_from_env_rejects_username_without_password() {
        let err = RegistryConfig::from_lookup(lookup_from(&[
            ("SCHEMA_REGISTRY_URL", "http://r"),
            ("SCHEMA_REGISTRY_USERNAME", "svc"),
        ]))
        .unwrap_err();
        assert!(matches!(err, RegistryClientError::Config(_)));
    }
}

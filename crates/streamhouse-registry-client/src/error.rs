//! Error types for registry client operations.
//!
//! Every public operation either resolves with a typed result or fails with one of the
//! variants below. Errors are `Clone` so that callers waiting on the same in-flight schema
//! fetch all observe the same failure.
//!
//! ## Error Categories
//!
//! - **Caller input**: `Argument`, `MalformedMessage`
//! - **Payload**: `Validation`, `Serialization`, `Deserialization`
//! - **Schema**: `InvalidSchema`, `UnsupportedSchemaType`
//! - **Registry**: `Registry`, `NotFound`, `Compatibility`
//! - **Setup**: `Config`
//!
//! ## Examples
//!
//! ```ignore
//! use streamhouse_registry_client::RegistryClientError;
//!
//! match client.encode(Some(id), &payload).await {
//!     Ok(bytes) => producer.send(bytes).await?,
//!     Err(RegistryClientError::Validation { paths, .. }) => {
//!         eprintln!("payload rejected at {:?}", paths);
//!     }
//!     Err(e) => return Err(e.into()),
//! }
//! ```

use thiserror::Error;

/// Convenience type alias for `Result<T, RegistryClientError>`.
pub type Result<T> = std::result::Result<T, RegistryClientError>;

#[derive(Debug, Clone, Error)]
pub enum RegistryClientError {
    /// Malformed input handed to encode/decode (missing id, missing buffer, bad magic byte)
    /// or a subject that cannot be derived.
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// Payload does not conform to the schema.
    ///
    /// `paths` lists the offending field paths, e.g. `["order.quantity"]`.
    #[error("Payload validation failed: {message} (invalid paths: {paths:?})")]
    Validation { message: String, paths: Vec<String> },

    /// The subject already has a compatibility level different from the requested one.
    ///
    /// The registry's existing policy is authoritative and is never changed by the client.
    #[error("Compatibility error: {0}")]
    Compatibility(String),

    /// A registry operation failed.
    ///
    /// `status` carries the HTTP status when the registry answered at all.
    #[error("Schema registry error{}: {message}", .status.map(|s| format!(" (status {})", s)).unwrap_or_default())]
    Registry {
        status: Option<u16>,
        message: String,
    },

    /// A lookup whose absence is the signaled condition.
    #[error("Not found in schema registry: {0}")]
    NotFound(String),

    /// Schema text could not be compiled or failed structural validation.
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// Wire envelope is too short to carry a magic byte and a registry id.
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// The registry returned a schema type this client does not know.
    #[error("Unsupported schema type: {0}")]
    UnsupportedSchemaType(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RegistryClientError {
    /// Build a registry error from an HTTP status and response body.
    pub fn registry(status: Option<u16>, message: impl Into<String>) -> Self {
        RegistryClientError::Registry {
            status,
            message: message.into(),
        }
    }

    /// HTTP status of a failed registry call, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            RegistryClientError::Registry { status, .. } => *status,
            _ => None,
        }
    }

    /// `true` when the registry answered 404.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl From<serde_json::Error> for RegistryClientError {
    fn from(e: serde_json::Error) -> Self {
        RegistryClientError::Serialization(e.to_string())
    }
}

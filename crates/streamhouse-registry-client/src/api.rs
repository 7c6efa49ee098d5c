//! Registry API collaborator
//!
//! [`RegistryApi`] is the small request surface the client core depends on. The core never
//! talks HTTP itself, which keeps it testable against in-memory doubles.
//!
//! [`HttpRegistryApi`] implements it over the Confluent REST API with `reqwest`:
//!
//! | Operation               | Endpoint                                   |
//! |-------------------------|--------------------------------------------|
//! | `subject_config`        | `GET /config/{subject}`                    |
//! | `update_subject_config` | `PUT /config/{subject}`                    |
//! | `register`              | `POST /subjects/{subject}/versions`        |
//! | `registered`            | `POST /subjects/{subject}`                 |
//! | `version`               | `GET /subjects/{subject}/versions/{v}`     |
//! | `latest_version`        | `GET /subjects/{subject}/versions/latest`  |
//! | `find_schema`           | `GET /schemas/ids/{id}`                    |

use crate::config::RegistryConfig;
use crate::error::{RegistryClientError, Result};
use crate::retry::retry_with_backoff;
use crate::types::*;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Content type of the Confluent REST API
pub const SCHEMA_REGISTRY_CONTENT_TYPE: &str = "application/vnd.schemaregistry.v1+json";

/// Registry operations consumed by the client facade.
///
/// Failures carry the HTTP status in [`RegistryClientError::Registry`] so callers can tell a
/// 404 apart from other failures.
#[async_trait]
pub trait RegistryApi: Send + Sync {
    /// Subject-level compatibility config. 404 when the subject has none.
    async fn subject_config(&self, subject: &str) -> Result<SubjectConfigResponse>;

    /// Set subject-level compatibility.
    async fn update_subject_config(
        &self,
        subject: &str,
        compatibility: CompatibilityMode,
    ) -> Result<()>;

    /// Register a schema body under a subject.
    async fn register(
        &self,
        subject: &str,
        request: &RegisterSchemaRequest,
    ) -> Result<RegisterSchemaResponse>;

    /// Look up a schema body already registered under a subject. 404 when it never was.
    async fn registered(
        &self,
        subject: &str,
        request: &LookupSchemaRequest,
    ) -> Result<SubjectVersionResponse>;

    /// Fetch one version of a subject.
    async fn version(&self, subject: &str, version: Version) -> Result<SubjectVersionResponse>;

    /// Fetch the latest version of a subject.
    async fn latest_version(&self, subject: &str) -> Result<SubjectVersionResponse> {
        self.version(subject, Version::Latest).await
    }

    /// Fetch a schema body by registry id.
    async fn find_schema(&self, id: RegistryId) -> Result<SchemaByIdResponse>;
}

/// Error body returned by Confluent-compatible registries
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    error_code: Option<i64>,
    message: String,
}

/// HTTP client for the registry REST API
pub struct HttpRegistryApi {
    base_url: Url,
    http_client: reqwest::Client,
    config: RegistryConfig,
}

impl HttpRegistryApi {
    pub fn new(config: RegistryConfig) -> Result<Self> {
        let base_url = Url::parse(&config.host).map_err(|e| {
            RegistryClientError::Config(format!("Invalid registry host '{}': {}", config.host, e))
        })?;

        if base_url.cannot_be_a_base() {
            return Err(RegistryClientError::Config(format!(
                "Registry host '{}' cannot be used as a base URL",
                config.host
            )));
        }

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.client_id.clone())
            .build()
            .map_err(|e| {
                RegistryClientError::Config(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            base_url,
            http_client,
            config,
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Append percent-encoded path segments to the base URL.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> Result<T> {
        retry_with_backoff(&self.config.retry, || {
            self.call_once(method.clone(), url.clone(), body.as_ref())
        })
        .await
    }

    async fn call_once<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&serde_json::Value>,
    ) -> Result<T> {
        let mut request = self
            .http_client
            .request(method.clone(), url.clone())
            .header(ACCEPT, SCHEMA_REGISTRY_CONTENT_TYPE);

        if let Some(auth) = &self.config.auth {
            request = request.basic_auth(&auth.username, Some(&auth.password));
        }

        if let Some(body) = body {
            request = request
                .header(CONTENT_TYPE, SCHEMA_REGISTRY_CONTENT_TYPE)
                .body(serde_json::to_vec(body)?);
        }

        let response = request.send().await.map_err(|e| {
            RegistryClientError::registry(None, format!("{} {} failed: {}", method, url.path(), e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(ErrorResponse {
                    error_code: Some(code),
                    message,
                }) => format!("{} (error code {})", message, code),
                Ok(ErrorResponse { message, .. }) => message,
                Err(_) => body,
            };

            tracing::debug!(
                method = %method,
                path = url.path(),
                status = status.as_u16(),
                "Schema registry request failed"
            );

            return Err(RegistryClientError::registry(
                Some(status.as_u16()),
                format!("{} {}: {}", method, url.path(), message),
            ));
        }

        response.json::<T>().await.map_err(|e| {
            RegistryClientError::Deserialization(format!(
                "Failed to parse response of {} {}: {}",
                method,
                url.path(),
                e
            ))
        })
    }
}

#[async_trait]
impl RegistryApi for HttpRegistryApi {
    async fn subject_config(&self, subject: &str) -> Result<SubjectConfigResponse> {
        self.call(Method::GET, self.url(&["config", subject]), None)
            .await
    }

    async fn update_subject_config(
        &self,
        subject: &str,
        compatibility: CompatibilityMode,
    ) -> Result<()> {
        let body = serde_json::to_value(UpdateConfigRequest { compatibility })?;
        let _: serde_json::Value = self
            .call(Method::PUT, self.url(&["config", subject]), Some(body))
            .await?;

        tracing::debug!(subject = subject, compatibility = %compatibility, "Subject config updated");
        Ok(())
    }

    async fn register(
        &self,
        subject: &str,
        request: &RegisterSchemaRequest,
    ) -> Result<RegisterSchemaResponse> {
        let body = serde_json::to_value(request)?;
        self.call(
            Method::POST,
            self.url(&["subjects", subject, "versions"]),
            Some(body),
        )
        .await
    }

    async fn registered(
        &self,
        subject: &str,
        request: &LookupSchemaRequest,
    ) -> Result<SubjectVersionResponse> {
        let body = serde_json::to_value(request)?;
        self.call(Method::POST, self.url(&["subjects", subject]), Some(body))
            .await
    }

    async fn version(&self, subject: &str, version: Version) -> Result<SubjectVersionResponse> {
        let version = version.to_string();
        self.call(
            Method::GET,
            self.url(&["subjects", subject, "versions", &version]),
            None,
        )
        .await
    }

    async fn find_schema(&self, id: RegistryId) -> Result<SchemaByIdResponse> {
        let id = id.to_string();
        self.call(Method::GET, self.url(&["schemas", "ids", &id]), None)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_building_encodes_subject() {
        let api = HttpRegistryApi::new(RegistryConfig::new("http://localhost:8081/registry/"))
            .unwrap();
        let url = api.url(&["subjects", "com.acme/orders value", "versions"]);
        assert_eq!(
            url.as_str(),
            "http://localhost:8081/registry/subjects/com.acme%2Forders%20value/versions"
        );
    }

    #[test]
    fn test_invalid_host_rejected() {
        let result = HttpRegistryApi::new(RegistryConfig::new("not a url"));
        assert!(matches!(result, Err(RegistryClientError::Config(_))));
    }
}

//! In-memory registry used by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use streamhouse_registry_client::api::RegistryApi;
use streamhouse_registry_client::{
    CompatibilityMode, LookupSchemaRequest, RegisterSchemaRequest, RegisterSchemaResponse,
    RegistryClientError, RegistryId, Result, SchemaByIdResponse, SchemaReference,
    SubjectConfigResponse, SubjectVersionResponse, Version,
};

#[derive(Default)]
struct State {
    next_id: RegistryId,
    schemas: HashMap<RegistryId, SchemaByIdResponse>,
    subjects: HashMap<String, Vec<SubjectVersionResponse>>,
    configs: HashMap<String, String>,
    version_requests: Vec<(String, Version)>,
}

/// Registry double that records how often each operation is called.
#[derive(Default)]
pub struct MockRegistryApi {
    state: Mutex<State>,
    find_schema_delay: Option<Duration>,
    failing_config: Option<u16>,
    pub find_schema_calls: AtomicUsize,
    pub subject_config_calls: AtomicUsize,
    pub register_calls: AtomicUsize,
    pub update_config_calls: AtomicUsize,
}

impl MockRegistryApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every `find_schema` answer so concurrent cache misses overlap.
    pub fn with_find_schema_delay(mut self, delay: Duration) -> Self {
        self.find_schema_delay = Some(delay);
        self
    }

    /// Make `subject_config` fail with the given status.
    pub fn with_failing_config(mut self, status: u16) -> Self {
        self.failing_config = Some(status);
        self
    }

    pub fn set_config(&self, subject: &str, level: &str) {
        self.state
            .lock()
            .unwrap()
            .configs
            .insert(subject.to_string(), level.to_string());
    }

    pub fn config(&self, subject: &str) -> Option<String> {
        self.state.lock().unwrap().configs.get(subject).cloned()
    }

    /// Store a schema under a subject without going through the client.
    pub fn seed(
        &self,
        subject: &str,
        schema_type: Option<&str>,
        schema: &str,
        references: Vec<SchemaReference>,
    ) -> RegistryId {
        self.store(
            subject,
            schema_type.map(str::to_string),
            schema.to_string(),
            references,
        )
    }

    pub fn version_requests(&self) -> Vec<(String, Version)> {
        self.state.lock().unwrap().version_requests.clone()
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn store(
        &self,
        subject: &str,
        schema_type: Option<String>,
        schema: String,
        references: Vec<SchemaReference>,
    ) -> RegistryId {
        let mut state = self.state.lock().unwrap();

        let existing = state
            .schemas
            .iter()
            .find(|(_, s)| s.schema == schema && s.schema_type == schema_type)
            .map(|(id, _)| *id);

        let id = match existing {
            Some(id) => id,
            None => {
                state.next_id += 1;
                let id = state.next_id;
                state.schemas.insert(
                    id,
                    SchemaByIdResponse {
                        schema: schema.clone(),
                        schema_type: schema_type.clone(),
                        references: references.clone(),
                    },
                );
                id
            }
        };

        let versions = state.subjects.entry(subject.to_string()).or_default();
        if !versions.iter().any(|v| v.id == id) {
            let version = versions.len() as i32 + 1;
            versions.push(SubjectVersionResponse {
                subject: subject.to_string(),
                version,
                id,
                schema,
                schema_type,
                references,
            });
        }
        id
    }
}

fn not_found(message: String) -> RegistryClientError {
    RegistryClientError::registry(Some(404), message)
}

#[async_trait]
impl RegistryApi for MockRegistryApi {
    async fn subject_config(&self, subject: &str) -> Result<SubjectConfigResponse> {
        self.subject_config_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = self.failing_config {
            return Err(RegistryClientError::registry(Some(status), "config unavailable"));
        }

        self.config(subject)
            .map(|compatibility_level| SubjectConfigResponse {
                compatibility_level,
            })
            .ok_or_else(|| not_found(format!("Subject '{}' not found", subject)))
    }

    async fn update_subject_config(
        &self,
        subject: &str,
        compatibility: CompatibilityMode,
    ) -> Result<()> {
        self.update_config_calls.fetch_add(1, Ordering::SeqCst);
        self.set_config(subject, compatibility.as_str());
        Ok(())
    }

    async fn register(
        &self,
        subject: &str,
        request: &RegisterSchemaRequest,
    ) -> Result<RegisterSchemaResponse> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        let id = self.store(
            subject,
            request.schema_type.map(|t| t.as_str().to_string()),
            request.schema.clone(),
            request.references.clone(),
        );
        Ok(RegisterSchemaResponse { id })
    }

    async fn registered(
        &self,
        subject: &str,
        request: &LookupSchemaRequest,
    ) -> Result<SubjectVersionResponse> {
        let schema_type = request.schema_type.map(|t| t.as_str().to_string());
        let state = self.state.lock().unwrap();
        state
            .subjects
            .get(subject)
            .and_then(|versions| {
                versions
                    .iter()
                    .find(|v| v.schema == request.schema && v.schema_type == schema_type)
            })
            .cloned()
            .ok_or_else(|| not_found("Schema not found".to_string()))
    }

    async fn version(&self, subject: &str, version: Version) -> Result<SubjectVersionResponse> {
        let mut state = self.state.lock().unwrap();
        state.version_requests.push((subject.to_string(), version));

        let versions = state
            .subjects
            .get(subject)
            .ok_or_else(|| not_found(format!("Subject '{}' not found", subject)))?;

        let found = match version {
            Version::Latest => versions.last(),
            Version::Number(n) => versions.iter().find(|v| v.version == n),
        };
        found
            .cloned()
            .ok_or_else(|| not_found(format!("Version {} not found", version)))
    }

    async fn find_schema(&self, id: RegistryId) -> Result<SchemaByIdResponse> {
        self.find_schema_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.find_schema_delay {
            tokio::time::sleep(delay).await;
        }

        self.state
            .lock()
            .unwrap()
            .schemas
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(format!("Schema {} not found", id)))
    }
}

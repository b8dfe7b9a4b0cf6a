//! MLflow-compatible tracking server client (REST API 2.0)

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use super::{ModelArtifact, TrackingBackend};
use crate::config::Credentials;
use crate::experiment::{
    runs_uri, ArtifactRecord, ExperimentRecord, MetricRecord, ModelVersion, RunRecord,
    RunStatus,
};
use crate::{Error, Result};

const RESOURCE_DOES_NOT_EXIST: &str = "RESOURCE_DOES_NOT_EXIST";
const RESOURCE_ALREADY_EXISTS: &str = "RESOURCE_ALREADY_EXISTS";

/// Tracking store backed by a remote server.
///
/// Requests are sent one at a time with basic auth when credentials are set,
/// and wait on the server for as long as it takes.
/// Artifacts are uploaded through the server's `mlflow-artifacts` proxy,
/// which requires run artifact URIs of the form `mlflow-artifacts:/...`.
pub struct RestStore {
    base: String,
    authorization: Option<String>,
    agent: ureq::Agent,
    artifact_roots: HashMap<String, String>,
}

impl std::fmt::Debug for RestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestStore")
            .field("base", &self.base)
            .field("authenticated", &self.authorization.is_some())
            .finish_non_exhaustive()
    }
}

impl RestStore {
    /// Client for the server at `base`.
    #[must_use]
    pub fn new(base: Url, credentials: Option<Credentials>) -> Self {
        let authorization = credentials.map(|c| {
            let token = STANDARD.encode(format!("{}:{}", c.username, c.password));
            format!("Basic {token}")
        });
        // ureq defaults: no read or write timeout.
        let agent = ureq::AgentBuilder::new().build();
        Self {
            base: base.as_str().trim_end_matches('/').to_string(),
            authorization,
            agent,
            artifact_roots: HashMap::new(),
        }
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/api/2.0/mlflow/{endpoint}", self.base)
    }

    fn with_auth(&self, request: ureq::Request) -> ureq::Request {
        match &self.authorization {
            Some(value) => request.set("Authorization", value),
            None => request,
        }
    }

    fn get<T: DeserializeOwned>(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = self.api_url(endpoint);
        let mut request = self.with_auth(self.agent.get(&url));
        for (key, value) in query {
            request = request.query(key, value);
        }
        tracing::debug!(%url, "GET");
        let response = request.call().map_err(|err| map_error(&url, err))?;
        parse_body(&url, response)
    }

    fn post<T: DeserializeOwned>(&self, endpoint: &str, body: &impl Serialize) -> Result<T> {
        let url = self.api_url(endpoint);
        tracing::debug!(%url, "POST");
        let response = self
            .with_auth(self.agent.post(&url))
            .set("Content-Type", "application/json")
            .send_json(body)
            .map_err(|err| map_error(&url, err))?;
        parse_body(&url, response)
    }

    fn artifact_root(&mut self, run_id: &str) -> Result<String> {
        if let Some(root) = self.artifact_roots.get(run_id) {
            return Ok(root.clone());
        }
        let response: GetRunResponse = self.get("runs/get", &[("run_id", run_id)])?;
        let root = response
            .run
            .info
            .artifact_uri
            .ok_or_else(|| Error::NotFound(format!("artifact URI of run '{run_id}'")))?;
        self.artifact_roots.insert(run_id.to_string(), root.clone());
        Ok(root)
    }

    fn upload(&self, artifact_root: &str, key: &str, bytes: &[u8]) -> Result<()> {
        let root = Url::parse(artifact_root)
            .ok()
            .filter(|url| url.scheme() == "mlflow-artifacts")
            .ok_or_else(|| {
                Error::Unsupported(format!(
                    "artifact upload to '{artifact_root}' (only mlflow-artifacts URIs are proxied)"
                ))
            })?;
        let url = format!(
            "{}/api/2.0/mlflow-artifacts/artifacts/{}/{key}",
            self.base,
            root.path().trim_matches('/')
        );
        tracing::debug!(%url, bytes = bytes.len(), "PUT");
        self.with_auth(self.agent.put(&url))
            .set("Content-Type", "application/octet-stream")
            .send_bytes(bytes)
            .map_err(|err| map_error(&url, err))?;
        Ok(())
    }
}

impl TrackingBackend for RestStore {
    fn get_experiment_by_name(&mut self, name: &str) -> Result<Option<ExperimentRecord>> {
        match self.get::<GetExperimentResponse>("experiments/get-by-name", &[("experiment_name", name)]) {
            Ok(response) => Ok(Some(response.experiment.into_record())),
            Err(Error::TrackingApi { code, .. }) if code == RESOURCE_DOES_NOT_EXIST => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn create_experiment(&mut self, name: &str) -> Result<ExperimentRecord> {
        let created: CreateExperimentResponse =
            self.post("experiments/create", &json!({ "name": name }))?;
        let response: GetExperimentResponse = self.get(
            "experiments/get",
            &[("experiment_id", created.experiment_id.as_str())],
        )?;
        Ok(response.experiment.into_record())
    }

    fn create_run(&mut self, experiment_id: &str, run_name: &str) -> Result<RunRecord> {
        let body = json!({
            "experiment_id": experiment_id,
            "run_name": run_name,
            "start_time": Utc::now().timestamp_millis(),
        });
        let response: CreateRunResponse = self.post("runs/create", &body)?;
        let run = response.run.info.into_record();
        if let Some(root) = run.artifact_uri() {
            self.artifact_roots.insert(run.run_id().to_string(), root.to_string());
        }
        tracing::info!(run_id = run.run_id(), "Created remote run");
        Ok(run)
    }

    fn log_param(&mut self, run_id: &str, key: &str, value: &str) -> Result<()> {
        let body = json!({ "run_id": run_id, "key": key, "value": value });
        let _: Value = self.post("runs/log-parameter", &body)?;
        Ok(())
    }

    fn log_metric(&mut self, run_id: &str, key: &str, value: f64, step: u64) -> Result<()> {
        let metric = MetricRecord::new(run_id, key, value, step);
        let _: Value = self.post("runs/log-metric", &metric)?;
        Ok(())
    }

    fn log_artifact(&mut self, run_id: &str, artifact: &ModelArtifact) -> Result<Vec<ArtifactRecord>> {
        let root = self.artifact_root(run_id)?;
        let mut records = Vec::with_capacity(artifact.files().len());
        for file in artifact.files() {
            let key = artifact.key_for(file);
            self.upload(&root, &key, &file.bytes)?;
            records.push(ArtifactRecord::new(run_id, &key, &file.bytes));
        }
        tracing::info!(
            run_id,
            artifact_path = artifact.artifact_path(),
            files = records.len(),
            "Uploaded model artifact"
        );
        Ok(records)
    }

    fn register_model(&mut self, name: &str, run_id: &str, artifact_path: &str) -> Result<ModelVersion> {
        match self.post::<Value>("registered-models/create", &json!({ "name": name })) {
            Ok(_) => tracing::info!(name, "Created registered model"),
            Err(Error::TrackingApi { code, .. }) if code == RESOURCE_ALREADY_EXISTS => {
                tracing::info!(name, "Registered model already exists");
            }
            Err(err) => return Err(err),
        }
        let body = json!({
            "name": name,
            "source": runs_uri(run_id, artifact_path),
            "run_id": run_id,
        });
        let response: CreateModelVersionResponse = self.post("model-versions/create", &body)?;
        Ok(ModelVersion::new(
            response.model_version.name,
            response.model_version.version,
            run_id,
            artifact_path,
        ))
    }

    fn finish_run(&mut self, run: &mut RunRecord, status: RunStatus) -> Result<()> {
        run.complete(status);
        let end_time = run.ended_at().map(|t| t.timestamp_millis());
        let body = json!({
            "run_id": run.run_id(),
            "status": status.as_mlflow_str(),
            "end_time": end_time,
        });
        let response: UpdateRunResponse = self.post("runs/update", &body)?;
        if let Some(info) = response.run_info {
            if let Some(remote) = RunStatus::from_mlflow_str(&info.status) {
                let ended_at = info
                    .end_time
                    .and_then(|m| m.value())
                    .and_then(DateTime::from_timestamp_millis)
                    .or_else(|| run.ended_at());
                run.apply_remote_state(remote, ended_at);
            }
        }
        Ok(())
    }
}

fn parse_body<T: DeserializeOwned>(url: &str, response: ureq::Response) -> Result<T> {
    let text = response.into_string().map_err(|err| Error::Transport {
        endpoint: url.to_string(),
        message: err.to_string(),
    })?;
    let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
    Ok(serde_json::from_str(text)?)
}

fn map_error(url: &str, err: ureq::Error) -> Error {
    match err {
        ureq::Error::Status(status, response) => {
            let body = response.into_string().unwrap_or_default();
            let parsed: Option<ApiErrorBody> = serde_json::from_str(&body).ok();
            let (code, message) = match parsed {
                Some(ApiErrorBody {
                    error_code: Some(code),
                    message,
                }) => (code, message.unwrap_or_default()),
                _ => ("HTTP_ERROR".to_string(), body),
            };
            Error::TrackingApi {
                status,
                code,
                message,
            }
        }
        ureq::Error::Transport(transport) => Error::Transport {
            endpoint: url.to_string(),
            message: transport.to_string(),
        },
    }
}

/// int64 fields arrive as numbers or as strings depending on the server.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Millis {
    Number(i64),
    Text(String),
}

impl Millis {
    fn value(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error_code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExperimentPayload {
    experiment_id: String,
    name: String,
    artifact_location: Option<String>,
    lifecycle_stage: Option<String>,
    creation_time: Option<Millis>,
}

impl ExperimentPayload {
    fn into_record(self) -> ExperimentRecord {
        let mut builder = ExperimentRecord::builder(self.experiment_id, self.name);
        if let Some(created) = self
            .creation_time
            .and_then(|m| m.value())
            .and_then(DateTime::from_timestamp_millis)
        {
            builder = builder.created_at(created);
        }
        if let Some(stage) = self.lifecycle_stage {
            builder = builder.lifecycle_stage(stage);
        }
        if let Some(location) = self.artifact_location {
            builder = builder.artifact_location(location);
        }
        builder.build()
    }
}

#[derive(Debug, Deserialize)]
struct GetExperimentResponse {
    experiment: ExperimentPayload,
}

#[derive(Debug, Deserialize)]
struct CreateExperimentResponse {
    experiment_id: String,
}

#[derive(Debug, Deserialize)]
struct RunInfoPayload {
    run_id: String,
    experiment_id: String,
    run_name: Option<String>,
    status: String,
    start_time: Option<Millis>,
    end_time: Option<Millis>,
    artifact_uri: Option<String>,
    lifecycle_stage: Option<String>,
}

impl RunInfoPayload {
    fn into_record(self) -> RunRecord {
        let mut builder = RunRecord::builder(self.run_id, self.experiment_id);
        if let Some(name) = self.run_name {
            builder = builder.run_name(name);
        }
        let started = self
            .start_time
            .and_then(|m| m.value())
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or_else(Utc::now);
        builder = builder.running_since(started);
        if let Some(stage) = self.lifecycle_stage {
            builder = builder.lifecycle_stage(stage);
        }
        if let Some(uri) = self.artifact_uri {
            builder = builder.artifact_uri(uri);
        }
        let mut run = builder.build();
        if let Some(status) = RunStatus::from_mlflow_str(&self.status) {
            let ended = self
                .end_time
                .and_then(|m| m.value())
                .and_then(DateTime::from_timestamp_millis);
            run.apply_remote_state(status, ended);
        }
        run
    }
}

#[derive(Debug, Deserialize)]
struct RunPayload {
    info: RunInfoPayload,
}

#[derive(Debug, Deserialize)]
struct CreateRunResponse {
    run: RunPayload,
}

#[derive(Debug, Deserialize)]
struct GetRunResponse {
    run: RunPayload,
}

#[derive(Debug, Deserialize)]
struct UpdateRunResponse {
    run_info: Option<RunInfoPayload>,
}

#[derive(Debug, Deserialize)]
struct ModelVersionPayload {
    name: String,
    version: String,
}

#[derive(Debug, Deserialize)]
struct CreateModelVersionResponse {
    model_version: ModelVersionPayload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_auth_header() {
        let store = RestStore::new(
            Url::parse("https://tracking.example/repo.mlflow/").unwrap(),
            Some(Credentials::new("alice", "s3cret")),
        );
        assert_eq!(store.authorization.as_deref(), Some("Basic YWxpY2U6czNjcmV0"));
        assert_eq!(
            store.api_url("runs/create"),
            "https://tracking.example/repo.mlflow/api/2.0/mlflow/runs/create"
        );
        assert!(!format!("{store:?}").contains("s3cret"));
    }

    #[test]
    fn test_millis_accepts_number_or_string() {
        let n: Millis = serde_json::from_str("1700000000000").unwrap();
        let s: Millis = serde_json::from_str("\"1700000000000\"").unwrap();
        assert_eq!(n.value(), Some(1_700_000_000_000));
        assert_eq!(s.value(), Some(1_700_000_000_000));
    }

    #[test]
    fn test_run_info_into_record() {
        let info: RunInfoPayload = serde_json::from_value(json!({
            "run_id": "abc",
            "experiment_id": "7",
            "run_name": "rf-default-model",
            "status": "RUNNING",
            "start_time": 1_700_000_000_000_i64,
            "artifact_uri": "mlflow-artifacts:/7/abc/artifacts",
            "lifecycle_stage": "active"
        }))
        .unwrap();
        let run = info.into_record();
        assert_eq!(run.status(), RunStatus::Running);
        assert_eq!(run.run_name(), Some("rf-default-model"));
        assert_eq!(run.started_at().unwrap().timestamp_millis(), 1_700_000_000_000);
        assert_eq!(run.artifact_uri(), Some("mlflow-artifacts:/7/abc/artifacts"));
    }

    #[test]
    fn test_upload_rejects_non_proxied_root() {
        let store = RestStore::new(Url::parse("http://127.0.0.1:1").unwrap(), None);
        let err = store.upload("s3://bucket/1/abc/artifacts", "model/MLmodel", b"{}").unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }
}

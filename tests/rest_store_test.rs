//! Remote tracking store tests against a scripted local HTTP server

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;

use attrition_ml::config::{Credentials, TrainingConfig};
use attrition_ml::dataset::{Dataset, FeatureMatrix};
use attrition_ml::experiment::RunStatus;
use attrition_ml::tracking::{RegisterModel, RestStore, TrackingBackend};
use attrition_ml::trainer::{run_training, BaselineTrainer};
use attrition_ml::Error;
use serde_json::{json, Value};
use url::Url;

// ============================================================================
// Scripted Server
// ============================================================================

#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    path: String,
    authorization: Option<String>,
    body: Vec<u8>,
}

impl Recorded {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }
}

type Router = fn(&str, &str) -> (u16, Value);

/// Serve every connection with `router`, recording requests in order.
fn serve(router: Router) -> (Url, Arc<Mutex<Vec<Recorded>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();
            let mut parts = request_line.split_whitespace();
            let method = parts.next().unwrap_or_default().to_string();
            let target = parts.next().unwrap_or_default().to_string();

            let mut content_length = 0usize;
            let mut authorization = None;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    match name.trim().to_ascii_lowercase().as_str() {
                        "content-length" => content_length = value.trim().parse().unwrap_or(0),
                        "authorization" => authorization = Some(value.trim().to_string()),
                        _ => {}
                    }
                }
            }
            let mut body = vec![0u8; content_length];
            reader.read_exact(&mut body).unwrap();

            let path = target.split('?').next().unwrap_or_default().to_string();
            let (status, payload) = router(&method, &path);
            sink.lock().unwrap().push(Recorded {
                method,
                path,
                authorization,
                body,
            });

            let payload = payload.to_string();
            let response = format!(
                "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{payload}",
                payload.len()
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });
    (Url::parse(&format!("http://{addr}/")).unwrap(), log)
}

fn run_info(status: &str) -> Value {
    let end_time = if status == "RUNNING" {
        Value::Null
    } else {
        json!("1700000005000")
    };
    json!({
        "run_id": "abc123",
        "experiment_id": "12",
        "run_name": "rf-default-model",
        "status": status,
        "start_time": 1_700_000_000_000_i64,
        "end_time": end_time,
        "artifact_uri": "mlflow-artifacts:/12/abc123/artifacts",
        "lifecycle_stage": "active"
    })
}

fn mlflow_server(method: &str, path: &str) -> (u16, Value) {
    let endpoint = path.trim_start_matches("/api/2.0/mlflow/");
    match (method, endpoint) {
        ("GET", "experiments/get-by-name") => (
            404,
            json!({"error_code": "RESOURCE_DOES_NOT_EXIST", "message": "Could not find experiment"}),
        ),
        ("POST", "experiments/create") => (200, json!({"experiment_id": "12"})),
        ("GET", "experiments/get") => (
            200,
            json!({"experiment": {
                "experiment_id": "12",
                "name": "attrition_prediction",
                "artifact_location": "mlflow-artifacts:/12",
                "lifecycle_stage": "active",
                "creation_time": 1_700_000_000_000_i64
            }}),
        ),
        ("POST", "runs/create") => (200, json!({"run": {"info": run_info("RUNNING")}})),
        ("POST", "runs/log-parameter" | "runs/log-metric") => (200, json!({})),
        ("POST", "runs/update") => (200, json!({"run_info": run_info("FINISHED")})),
        ("POST", "registered-models/create") => (
            400,
            json!({"error_code": "RESOURCE_ALREADY_EXISTS", "message": "Registered Model already exists"}),
        ),
        ("POST", "model-versions/create") => (
            200,
            json!({"model_version": {"name": "rf_model", "version": "3"}}),
        ),
        ("PUT", _) if path.starts_with("/api/2.0/mlflow-artifacts/artifacts/") => (200, json!({})),
        _ => (404, json!({"error_code": "ENDPOINT_NOT_FOUND", "message": path})),
    }
}

fn failing_param_server(method: &str, path: &str) -> (u16, Value) {
    if path.ends_with("runs/log-parameter") {
        return (500, json!({"error_code": "INTERNAL_ERROR", "message": "database is locked"}));
    }
    mlflow_server(method, path)
}

fn toy() -> Dataset {
    let rows: Vec<Vec<f64>> = (0..20)
        .map(|i| vec![f64::from(i), f64::from(i % 4)])
        .collect();
    let labels = (0..20).map(|i| usize::from(i >= 10)).collect();
    Dataset::new(
        vec!["Age".to_string(), "JobLevel".to_string()],
        "Attrition",
        FeatureMatrix::from_rows(&rows).unwrap(),
        labels,
    )
    .unwrap()
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_missing_experiment_is_none_then_created() {
    let (base, log) = serve(mlflow_server);
    let mut store = RestStore::new(base, None);

    assert!(store.get_experiment_by_name("attrition_prediction").unwrap().is_none());
    let experiment = store.create_experiment("attrition_prediction").unwrap();

    assert_eq!(experiment.experiment_id(), "12");
    assert_eq!(experiment.artifact_location(), Some("mlflow-artifacts:/12"));
    assert_eq!(experiment.created_at().timestamp_millis(), 1_700_000_000_000);

    let requests = log.lock().unwrap();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[1].json()["name"], "attrition_prediction");
}

#[test]
fn test_full_tracked_run() {
    let (base, log) = serve(mlflow_server);
    let mut store = RestStore::new(base, Some(Credentials::new("alice", "s3cret")));
    let publisher = RegisterModel::new("rf_model");

    let summary = run_training(
        &TrainingConfig::default(),
        &toy(),
        &mut BaselineTrainer::new(),
        &mut store,
        &publisher,
        &mut Vec::new(),
    )
    .unwrap();

    assert_eq!(summary.run.run_id(), "abc123");
    assert_eq!(summary.run.status(), RunStatus::Success);
    assert_eq!(summary.run.ended_at().unwrap().timestamp_millis(), 1_700_000_005_000);
    let version = summary.model_version.unwrap();
    assert_eq!(version.version(), "3");
    assert_eq!(version.source(), "runs:/abc123/model");

    let requests = log.lock().unwrap();
    assert!(requests
        .iter()
        .all(|r| r.authorization.as_deref() == Some("Basic YWxpY2U6czNjcmV0")));

    let count = |suffix: &str| requests.iter().filter(|r| r.path.ends_with(suffix)).count();
    assert_eq!(count("runs/create"), 1);
    assert_eq!(count("runs/log-parameter"), 8);
    assert_eq!(count("runs/log-metric"), 4);

    let metric = requests
        .iter()
        .find(|r| r.path.ends_with("runs/log-metric"))
        .unwrap()
        .json();
    assert_eq!(metric["run_id"], "abc123");
    assert_eq!(metric["key"], "test accuracy");
    assert_eq!(metric["step"], 0);
    assert!(metric["timestamp"].as_i64().unwrap() > 1_700_000_000_000);

    let uploads: Vec<&str> = requests
        .iter()
        .filter(|r| r.method == "PUT")
        .map(|r| r.path.as_str())
        .collect();
    assert!(uploads.contains(&"/api/2.0/mlflow-artifacts/artifacts/12/abc123/artifacts/model/model.json"));
    assert!(uploads.contains(&"/api/2.0/mlflow-artifacts/artifacts/12/abc123/artifacts/model/MLmodel"));

    let version_request = requests
        .iter()
        .find(|r| r.path.ends_with("model-versions/create"))
        .unwrap();
    assert_eq!(version_request.json()["source"], "runs:/abc123/model");
    assert_eq!(version_request.json()["run_id"], "abc123");

    let last = requests.last().unwrap();
    assert!(last.path.ends_with("runs/update"));
    assert_eq!(last.json()["status"], "FINISHED");
}

#[test]
fn test_server_error_marks_run_failed() {
    let (base, log) = serve(failing_param_server);
    let mut store = RestStore::new(base, None);
    let publisher = RegisterModel::new("rf_model");

    let err = run_training(
        &TrainingConfig::default(),
        &toy(),
        &mut BaselineTrainer::new(),
        &mut store,
        &publisher,
        &mut Vec::new(),
    )
    .unwrap_err();

    match err {
        Error::TrackingApi {
            status,
            code,
            message,
        } => {
            assert_eq!(status, 500);
            assert_eq!(code, "INTERNAL_ERROR");
            assert_eq!(message, "database is locked");
        }
        other => panic!("unexpected error: {other}"),
    }

    let requests = log.lock().unwrap();
    assert_eq!(requests.iter().filter(|r| r.method == "PUT").count(), 0);
    let last = requests.last().unwrap();
    assert!(last.path.ends_with("runs/update"));
    assert_eq!(last.json()["status"], "FAILED");
}

#[test]
fn test_unreachable_server_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut store = RestStore::new(Url::parse(&format!("http://{addr}")).unwrap(), None);
    let err = store.get_experiment_by_name("attrition_prediction").unwrap_err();
    assert!(matches!(err, Error::Transport { .. }));
}

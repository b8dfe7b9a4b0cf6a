//! Prediction endpoint smoke test
//!
//! Sends a fixed number of JSON prediction requests to a running model
//! server, one at a time, cycling through sample payloads. Failures are
//! printed and counted; they never stop the loop.

use std::fmt;
use std::io::{self, Write};
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Model server endpoint used when nothing else is configured.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000/predict";
/// Requests per smoke test.
pub const DEFAULT_NUM_REQUESTS: usize = 10;
/// Pause after each request.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(50);

/// Columns-plus-rows table, the server's `split` input orientation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataframeSplit {
    /// Column names
    pub columns: Vec<String>,
    /// Row values, one inner vector per row
    pub data: Vec<Vec<serde_json::Value>>,
}

/// Request body for the prediction endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferencePayload {
    /// Input table
    pub dataframe_split: DataframeSplit,
}

impl InferencePayload {
    /// Single-row payload.
    #[must_use]
    pub fn single_row(columns: &[&str], row: Vec<serde_json::Value>) -> Self {
        Self {
            dataframe_split: DataframeSplit {
                columns: columns.iter().map(ToString::to_string).collect(),
                data: vec![row],
            },
        }
    }
}

const SAMPLE_COLUMNS: [&str; 10] = [
    "MonthlyIncome",
    "Age",
    "TotalWorkingYears",
    "OverTime",
    "MonthlyRate",
    "DailyRate",
    "EmployeeId",
    "DistanceFromHome",
    "HourlyRate",
    "NumCompaniesWorked",
];

/// The two built-in employee samples, normalized like the training data.
#[must_use]
pub fn sample_payloads() -> Vec<InferencePayload> {
    use serde_json::json;
    vec![
        InferencePayload::single_row(
            &SAMPLE_COLUMNS,
            vec![
                json!(0.078_304_370_721_432_3),
                json!(0.357_142_857_142_857_1),
                json!(0.175),
                json!(0),
                json!(0.183_738_205_179_682_7),
                json!(0.588_403_722_261_989_9),
                json!(1140),
                json!(0.035_714_285_714_285_7),
                json!(0.685_714_285_714_285_7),
                json!(0.444_444_444_444_444_4),
            ],
        ),
        InferencePayload::single_row(
            &SAMPLE_COLUMNS,
            vec![
                json!(0.05),
                json!(0.28),
                json!(0.10),
                json!(0),
                json!(0.15),
                json!(0.40),
                json!(2001),
                json!(0.02),
                json!(0.55),
                json!(0.22),
            ],
        ),
    ]
}

/// Smoke test settings.
#[derive(Debug, Clone)]
pub struct SmokeTestConfig {
    /// Prediction URL
    pub endpoint: String,
    /// Total requests to send
    pub num_requests: usize,
    /// Sleep after every request
    pub delay: Duration,
    /// Payloads, request `i` sends `samples[i % samples.len()]`
    pub samples: Vec<InferencePayload>,
}

impl Default for SmokeTestConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            num_requests: DEFAULT_NUM_REQUESTS,
            delay: DEFAULT_DELAY,
            samples: sample_payloads(),
        }
    }
}

impl SmokeTestConfig {
    /// Defaults with `INFERENCE_URL` applied.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(url) = std::env::var("INFERENCE_URL")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
        {
            config.endpoint = url;
        }
        config
    }

    /// Set the endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the request count.
    #[must_use]
    pub const fn with_num_requests(mut self, num_requests: usize) -> Self {
        self.num_requests = num_requests;
        self
    }

    /// Set the delay.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Why one prediction request failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestFailure {
    /// No connection could be made
    Connection(String),
    /// Server answered with a 4xx/5xx status
    Http {
        /// Status code
        status: u16,
        /// Response body
        body: String,
    },
    /// 2xx response whose body is not JSON
    MalformedJson(String),
    /// Anything else
    Other(String),
}

impl fmt::Display for RequestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(msg) => write!(f, "Connection error: {msg}"),
            Self::Http { status, body } => write!(f, "HTTP error: {status} - {body}"),
            Self::MalformedJson(body) => write!(f, "Failed to parse JSON response: {body}"),
            Self::Other(msg) => write!(f, "Unexpected error: {msg}"),
        }
    }
}

impl std::error::Error for RequestFailure {}

/// Sequential client for the prediction endpoint.
#[derive(Debug, Clone)]
pub struct InferenceClient {
    endpoint: String,
    agent: ureq::Agent,
}

impl InferenceClient {
    /// Client for `endpoint`.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        // ureq defaults: a slow prediction is waited on, not failed.
        let agent = ureq::AgentBuilder::new().build();
        Self {
            endpoint: endpoint.into(),
            agent,
        }
    }

    /// Endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST one payload and parse the JSON answer.
    ///
    /// Any syntactically valid JSON body is a success, including `null`,
    /// `[]` and `{}`.
    ///
    /// # Errors
    ///
    /// Returns the [`RequestFailure`] kind that matches what went wrong.
    pub fn send(&self, payload: &InferencePayload) -> std::result::Result<serde_json::Value, RequestFailure> {
        let response = self
            .agent
            .post(&self.endpoint)
            .set("Content-Type", "application/json")
            .send_json(payload);
        match response {
            Ok(response) => {
                let body = response
                    .into_string()
                    .map_err(|err| RequestFailure::Other(err.to_string()))?;
                serde_json::from_str(&body).map_err(|_| RequestFailure::MalformedJson(body))
            }
            Err(ureq::Error::Status(status, response)) => Err(RequestFailure::Http {
                status,
                body: response.into_string().unwrap_or_default(),
            }),
            Err(ureq::Error::Transport(transport)) => Err(classify_transport(&transport)),
        }
    }
}

fn classify_transport(transport: &ureq::Transport) -> RequestFailure {
    match transport.kind() {
        ureq::ErrorKind::ConnectionFailed | ureq::ErrorKind::Dns => {
            RequestFailure::Connection(transport.to_string())
        }
        _ => RequestFailure::Other(transport.to_string()),
    }
}

/// Send one payload with a fresh client.
///
/// # Errors
///
/// See [`InferenceClient::send`].
pub fn send_inference_request(
    endpoint: &str,
    payload: &InferencePayload,
) -> std::result::Result<serde_json::Value, RequestFailure> {
    InferenceClient::new(endpoint).send(payload)
}

/// Tally of a smoke test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmokeReport {
    /// Requests sent
    pub total: usize,
    /// Requests answered with valid JSON
    pub succeeded: usize,
    /// Failure per failed request number (1-based)
    pub failures: Vec<(usize, RequestFailure)>,
}

impl SmokeReport {
    /// Requests that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.total - self.succeeded
    }
}

impl fmt::Display for SmokeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {} succeeded", self.succeeded, self.total)
    }
}

/// Run the smoke test, printing progress to `out`.
///
/// Request failures are printed and counted. The summary line is always
/// printed.
///
/// # Errors
///
/// Only fails if writing to `out` fails.
pub fn run_smoke_test<W: Write>(config: &SmokeTestConfig, out: &mut W) -> io::Result<SmokeReport> {
    let client = InferenceClient::new(&config.endpoint);
    let n = config.num_requests;
    writeln!(out, "Sending {n} requests to {}...", client.endpoint())?;

    let mut report = SmokeReport {
        total: n,
        succeeded: 0,
        failures: Vec::new(),
    };
    for i in 0..n {
        let outcome = if config.samples.is_empty() {
            Err(RequestFailure::Other("no sample payloads configured".to_string()))
        } else {
            let index = i % config.samples.len();
            writeln!(out, "[{}/{n}] Sending request with sample {}...", i + 1, index + 1)?;
            client.send(&config.samples[index])
        };

        match outcome {
            Ok(body) => {
                report.succeeded += 1;
                tracing::debug!(request = i + 1, response = %body, "Prediction succeeded");
            }
            Err(failure) => {
                writeln!(out, "{failure}")?;
                writeln!(out, "Request {} failed.", i + 1)?;
                tracing::warn!(request = i + 1, error = %failure, "Prediction failed");
                report.failures.push((i + 1, failure));
            }
        }
        thread::sleep(config.delay);
    }

    writeln!(out)?;
    writeln!(out, "Finished sending {n} requests.")?;
    writeln!(out, "{report}")?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_payload_shape() {
        let samples = sample_payloads();
        assert_eq!(samples.len(), 2);
        for sample in &samples {
            assert_eq!(sample.dataframe_split.columns.len(), 10);
            assert_eq!(sample.dataframe_split.data[0].len(), 10);
        }
        let body = serde_json::to_value(&samples[0]).unwrap();
        assert_eq!(body["dataframe_split"]["columns"][6], "EmployeeId");
        assert_eq!(body["dataframe_split"]["data"][0][6], 1140);
    }

    #[test]
    fn test_defaults() {
        let config = SmokeTestConfig::default();
        assert_eq!(config.endpoint, "http://127.0.0.1:8000/predict");
        assert_eq!(config.num_requests, 10);
        assert_eq!(config.delay, Duration::from_millis(50));
    }

    #[test]
    fn test_failure_messages_are_distinct() {
        let messages = [
            RequestFailure::Connection("refused".into()).to_string(),
            RequestFailure::Http {
                status: 500,
                body: "oops".into(),
            }
            .to_string(),
            RequestFailure::MalformedJson("<html>".into()).to_string(),
            RequestFailure::Other("x".into()).to_string(),
        ];
        assert!(messages[1].contains("500 - oops"));
        for (i, a) in messages.iter().enumerate() {
            for b in &messages[i + 1..] {
                assert_ne!(a.split(':').next(), b.split(':').next());
            }
        }
    }

    #[test]
    fn test_unreachable_endpoint_counts_failures() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = SmokeTestConfig::default()
            .with_endpoint(format!("http://{addr}/predict"))
            .with_num_requests(2)
            .with_delay(Duration::ZERO);
        let mut out = Vec::new();
        let report = run_smoke_test(&config, &mut out).unwrap();
        assert_eq!(report.succeeded, 0);
        assert_eq!(report.failed(), 2);
        assert!(matches!(report.failures[0].1, RequestFailure::Connection(_)));
        assert!(String::from_utf8(out).unwrap().contains("0 / 2 succeeded"));
    }
}

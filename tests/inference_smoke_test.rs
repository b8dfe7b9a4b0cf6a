//! Prediction endpoint smoke test against a local HTTP server

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use attrition_ml::inference::{
    run_smoke_test, sample_payloads, send_inference_request, RequestFailure, SmokeTestConfig,
};

/// Answer `count` requests with `status` and `body`, forwarding each request
/// body to the returned channel.
fn serve(count: usize, status: u16, body: &'static str) -> (String, mpsc::Receiver<String>) {
    serve_after(Duration::ZERO, count, status, body)
}

/// Like [`serve`], holding each answer back for `latency`.
fn serve_after(
    latency: Duration,
    count: usize,
    status: u16,
    body: &'static str,
) -> (String, mpsc::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for stream in listener.incoming().take(count) {
            let mut stream = stream.unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap_or(0);
                    }
                }
            }
            let mut request = vec![0u8; content_length];
            reader.read_exact(&mut request).unwrap();
            let _ = tx.send(String::from_utf8_lossy(&request).into_owned());
            thread::sleep(latency);

            let response = format!(
                "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });
    (format!("http://{addr}/predict"), rx)
}

fn config(endpoint: &str, n: usize) -> SmokeTestConfig {
    SmokeTestConfig::default()
        .with_endpoint(endpoint)
        .with_num_requests(n)
        .with_delay(Duration::ZERO)
}

#[test]
fn test_all_requests_succeed() {
    let (endpoint, requests) = serve(4, 200, r#"{"predictions": [0]}"#);
    let mut out = Vec::new();

    let report = run_smoke_test(&config(&endpoint, 4), &mut out).unwrap();

    assert_eq!(report.succeeded, 4);
    assert_eq!(report.failed(), 0);
    assert_eq!(report.to_string(), "4 / 4 succeeded");

    let printed = String::from_utf8(out).unwrap();
    assert!(printed.starts_with(&format!("Sending 4 requests to {endpoint}...")));
    assert!(printed.contains("[1/4] Sending request with sample 1..."));
    assert!(printed.contains("[2/4] Sending request with sample 2..."));
    assert!(printed.contains("[3/4] Sending request with sample 1..."));
    assert!(printed.contains("Finished sending 4 requests."));
    assert!(printed.trim_end().ends_with("4 / 4 succeeded"));

    let first: serde_json::Value = serde_json::from_str(&requests.recv().unwrap()).unwrap();
    assert_eq!(first["dataframe_split"]["columns"].as_array().unwrap().len(), 10);
    assert_eq!(first["dataframe_split"]["data"][0][6], 1140);
}

#[test]
fn test_server_errors_are_counted() {
    let (endpoint, _requests) = serve(3, 500, r#"{"error": "model not loaded"}"#);
    let mut out = Vec::new();

    let report = run_smoke_test(&config(&endpoint, 3), &mut out).unwrap();

    assert_eq!(report.succeeded, 0);
    assert_eq!(report.failures.len(), 3);
    assert!(matches!(
        report.failures[0].1,
        RequestFailure::Http { status: 500, .. }
    ));

    let printed = String::from_utf8(out).unwrap();
    assert!(printed.contains("HTTP error: 500 - "));
    assert!(printed.contains("Request 3 failed."));
    assert!(printed.trim_end().ends_with("0 / 3 succeeded"));
}

#[test]
fn test_non_json_body_is_a_failure() {
    let (endpoint, _requests) = serve(1, 200, "<html>ok</html>");
    let payload = &sample_payloads()[0];

    let failure = send_inference_request(&endpoint, payload).unwrap_err();

    assert_eq!(failure, RequestFailure::MalformedJson("<html>ok</html>".to_string()));
    assert!(failure.to_string().starts_with("Failed to parse JSON response:"));
}

#[test]
fn test_any_json_counts_as_success() {
    let (endpoint, _requests) = serve(1, 200, "null");
    let payload = &sample_payloads()[1];

    let body = send_inference_request(&endpoint, payload).unwrap();
    assert!(body.is_null());
}

#[test]
fn test_slow_prediction_is_waited_on() {
    // Longer than any fixed read timeout a client might impose.
    let (endpoint, _requests) = serve_after(Duration::from_secs(31), 1, 200, r#"{"predictions": [0]}"#);
    let mut out = Vec::new();

    let report = run_smoke_test(&config(&endpoint, 1), &mut out).unwrap();

    assert_eq!(report.succeeded, 1);
    assert!(report.failures.is_empty());
    assert!(String::from_utf8(out).unwrap().trim_end().ends_with("1 / 1 succeeded"));
}

//! Metric Record - one `log-metric` data point

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// One metric data point, serialized exactly as the tracking server's
/// `runs/log-metric` request body.
///
/// `timestamp` is milliseconds since the Unix epoch, stamped when the record
/// is created. Held-out evaluation metrics use step 0.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricRecord {
    run_id: String,
    key: String,
    value: f64,
    timestamp: i64,
    step: u64,
}

impl MetricRecord {
    /// Data point for `key` logged now.
    #[must_use]
    pub fn new(run_id: impl Into<String>, key: impl Into<String>, value: f64, step: u64) -> Self {
        Self {
            run_id: run_id.into(),
            key: key.into(),
            value,
            timestamp: Utc::now().timestamp_millis(),
            step,
        }
    }

    /// Run the point belongs to.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Metric name, e.g. `test accuracy`.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Metric value.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }

    /// Logging time in Unix milliseconds.
    #[must_use]
    pub const fn timestamp_ms(&self) -> i64 {
        self.timestamp
    }

    /// Step number.
    #[must_use]
    pub const fn step(&self) -> u64 {
        self.step
    }
}

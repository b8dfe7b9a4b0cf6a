//! Error types for attrition-ml
//!
//! Messages name the file, column or endpoint involved so a failed run can be
//! diagnosed from the log alone.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// attrition-ml error types
#[derive(Error, Debug)]
pub enum Error {
    /// Required column missing from the dataset header
    #[error("Missing column '{column}' in dataset\nAvailable columns: {available:?}")]
    MissingColumn {
        /// Column that was requested
        column: String,
        /// Columns present in the header
        available: Vec<String>,
    },

    /// A cell could not be parsed as a number
    #[error("Parse error at line {line}, column '{column}': cannot read {value:?} as a number")]
    Parse {
        /// 1-based line number in the source file (header is line 1)
        line: usize,
        /// Column name
        column: String,
        /// Raw cell content
        value: String,
    },

    /// Caller supplied data or parameters that cannot be used
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Metric computation failed
    #[error("Metric error: {0}")]
    Metric(String),

    /// The learning library rejected the parameters or the data
    #[error("Learner error: {0}")]
    Learner(#[from] linfa::Error),

    /// Tracking server answered with an error payload
    #[error("Tracking API error (HTTP {status}) {code}: {message}")]
    TrackingApi {
        /// HTTP status code
        status: u16,
        /// MLflow `error_code`, e.g. `RESOURCE_DOES_NOT_EXIST`
        code: String,
        /// Server-provided message
        message: String,
    },

    /// Network transport failed before a response was received
    #[error("Transport error talking to {endpoint}: {message}")]
    Transport {
        /// URL that was being called
        endpoint: String,
        /// Underlying error
        message: String,
    },

    /// Tracking URI scheme is not supported
    #[error("Unsupported tracking URI '{0}'\nUse http(s):// for a tracking server or file:// / a plain path for a local store")]
    UnsupportedUri(String),

    /// A param was logged twice with different values
    #[error("Param '{key}' already logged for run {run_id} with value {existing:?}, refusing {new:?}")]
    ParamConflict {
        /// Run that owns the param
        run_id: String,
        /// Param key
        key: String,
        /// Value already stored
        existing: String,
        /// Value that was rejected
        new: String,
    },

    /// Experiment, run or model was not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation not available on this backend
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

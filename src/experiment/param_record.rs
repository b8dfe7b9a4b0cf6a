//! Param Record - string-valued hyperparameters of a run

use serde::{Deserialize, Serialize};

/// Param Record holds one `key = value` hyperparameter of a run.
///
/// Values are stored as rendered strings (`None`, `True`, `100`). A key is
/// written at most once per run; logging it again with another value is an
/// error in every backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParamRecord {
    run_id: String,
    key: String,
    value: String,
}

impl ParamRecord {
    /// Create a new param record.
    #[must_use]
    pub fn new(run_id: impl Into<String>, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            key: key.into(),
            value: value.into(),
        }
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the param key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the rendered value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

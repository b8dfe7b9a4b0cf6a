//! Run Record - one training invocation inside an experiment

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Run is created but not yet started.
    Pending,
    /// Run is currently executing.
    Running,
    /// Run completed successfully.
    Success,
    /// Run failed with an error.
    Failed,
    /// Run was cancelled by user or system.
    Cancelled,
}

impl RunStatus {
    /// Status name on the tracking server's wire format.
    #[must_use]
    pub const fn as_mlflow_str(self) -> &'static str {
        match self {
            Self::Pending => "SCHEDULED",
            Self::Running => "RUNNING",
            Self::Success => "FINISHED",
            Self::Failed => "FAILED",
            Self::Cancelled => "KILLED",
        }
    }

    /// Parse the tracking server's status name.
    #[must_use]
    pub fn from_mlflow_str(value: &str) -> Option<Self> {
        match value {
            "SCHEDULED" => Some(Self::Pending),
            "RUNNING" => Some(Self::Running),
            "FINISHED" => Some(Self::Success),
            "FAILED" => Some(Self::Failed),
            "KILLED" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Whether the run has closed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_mlflow_str())
    }
}

/// Run Record represents a single execution of an experiment.
///
/// A run is created open, collects params, metrics and artifacts, and is
/// closed exactly once with a terminal status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunRecord {
    run_id: String,
    experiment_id: String,
    run_name: Option<String>,
    status: RunStatus,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    lifecycle_stage: String,
    artifact_uri: Option<String>,
}

impl RunRecord {
    /// Create a new run record in Pending status.
    ///
    /// # Arguments
    ///
    /// * `run_id` - Unique identifier for the run
    /// * `experiment_id` - ID of the parent experiment
    #[must_use]
    pub fn new(run_id: impl Into<String>, experiment_id: impl Into<String>) -> Self {
        Self::builder(run_id, experiment_id).build()
    }

    /// Create a builder for constructing a run record with optional fields.
    #[must_use]
    pub fn builder(
        run_id: impl Into<String>,
        experiment_id: impl Into<String>,
    ) -> RunRecordBuilder {
        RunRecordBuilder::new(run_id, experiment_id)
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the parent experiment ID.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Get the human-readable run name, if set.
    #[must_use]
    pub fn run_name(&self) -> Option<&str> {
        self.run_name.as_deref()
    }

    /// Get the current run status.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// Get the start timestamp, if the run has started.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Get the end timestamp, if the run has completed.
    #[must_use]
    pub const fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Get the lifecycle stage (`active` or `deleted`).
    #[must_use]
    pub fn lifecycle_stage(&self) -> &str {
        &self.lifecycle_stage
    }

    /// Get the root URI of the run's artifacts, if the backend reports one.
    #[must_use]
    pub fn artifact_uri(&self) -> Option<&str> {
        self.artifact_uri.as_deref()
    }

    /// Start the run, transitioning from Pending to Running.
    ///
    /// Sets the `started_at` timestamp to now.
    pub fn start(&mut self) {
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Complete the run with the given final status.
    ///
    /// Sets the `ended_at` timestamp to now.
    ///
    /// # Arguments
    ///
    /// * `status` - Final status (Success, Failed, or Cancelled)
    pub fn complete(&mut self, status: RunStatus) {
        self.status = status;
        self.ended_at = Some(Utc::now());
    }

    /// Overwrite status and end time with values reported by a backend.
    pub(crate) fn apply_remote_state(&mut self, status: RunStatus, ended_at: Option<DateTime<Utc>>) {
        self.status = status;
        self.ended_at = ended_at;
    }
}

/// Builder for `RunRecord`.
#[derive(Debug)]
#[allow(clippy::struct_field_names)]
pub struct RunRecordBuilder {
    run_id: String,
    experiment_id: String,
    run_name: Option<String>,
    status: RunStatus,
    started_at: Option<DateTime<Utc>>,
    lifecycle_stage: String,
    artifact_uri: Option<String>,
}

impl RunRecordBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(run_id: impl Into<String>, experiment_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            experiment_id: experiment_id.into(),
            run_name: None,
            status: RunStatus::Pending,
            started_at: None,
            lifecycle_stage: "active".to_string(),
            artifact_uri: None,
        }
    }

    /// Set the run name.
    #[must_use]
    pub fn run_name(mut self, name: impl Into<String>) -> Self {
        self.run_name = Some(name.into());
        self
    }

    /// Mark the run as already running since `started_at`.
    #[must_use]
    pub const fn running_since(mut self, started_at: DateTime<Utc>) -> Self {
        self.status = RunStatus::Running;
        self.started_at = Some(started_at);
        self
    }

    /// Set the lifecycle stage.
    #[must_use]
    pub fn lifecycle_stage(mut self, stage: impl Into<String>) -> Self {
        self.lifecycle_stage = stage.into();
        self
    }

    /// Set the artifact root URI.
    #[must_use]
    pub fn artifact_uri(mut self, uri: impl Into<String>) -> Self {
        self.artifact_uri = Some(uri.into());
        self
    }

    /// Build the `RunRecord`.
    #[must_use]
    pub fn build(self) -> RunRecord {
        RunRecord {
            run_id: self.run_id,
            experiment_id: self.experiment_id,
            run_name: self.run_name,
            status: self.status,
            started_at: self.started_at,
            ended_at: None,
            lifecycle_stage: self.lifecycle_stage,
            artifact_uri: self.artifact_uri,
        }
    }
}

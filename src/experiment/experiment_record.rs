//! Experiment Record - named grouping of runs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Experiment Record represents a tracked experiment.
///
/// Experiments are looked up by name; at most one exists per name in a
/// backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExperimentRecord {
    experiment_id: String,
    name: String,
    created_at: DateTime<Utc>,
    lifecycle_stage: String,
    artifact_location: Option<String>,
}

impl ExperimentRecord {
    /// Create a new experiment record with the given ID and name.
    ///
    /// # Arguments
    ///
    /// * `experiment_id` - Unique identifier for the experiment
    /// * `name` - Human-readable name for the experiment
    ///
    /// # Returns
    ///
    /// A new active `ExperimentRecord` with the current timestamp.
    #[must_use]
    pub fn new(experiment_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::builder(experiment_id, name).build()
    }

    /// Create a builder for constructing an experiment record with optional fields.
    #[must_use]
    pub fn builder(
        experiment_id: impl Into<String>,
        name: impl Into<String>,
    ) -> ExperimentRecordBuilder {
        ExperimentRecordBuilder::new(experiment_id, name)
    }

    /// Get the experiment ID.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Get the experiment name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Get the lifecycle stage (`active` or `deleted`).
    #[must_use]
    pub fn lifecycle_stage(&self) -> &str {
        &self.lifecycle_stage
    }

    /// Get the artifact root for runs of this experiment, if known.
    #[must_use]
    pub fn artifact_location(&self) -> Option<&str> {
        self.artifact_location.as_deref()
    }
}

/// Builder for `ExperimentRecord`.
#[derive(Debug)]
pub struct ExperimentRecordBuilder {
    experiment_id: String,
    name: String,
    created_at: DateTime<Utc>,
    lifecycle_stage: String,
    artifact_location: Option<String>,
}

impl ExperimentRecordBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(experiment_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            name: name.into(),
            created_at: Utc::now(),
            lifecycle_stage: "active".to_string(),
            artifact_location: None,
        }
    }

    /// Set a custom creation timestamp (useful for deserialization/testing).
    #[must_use]
    pub const fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Set the lifecycle stage.
    #[must_use]
    pub fn lifecycle_stage(mut self, stage: impl Into<String>) -> Self {
        self.lifecycle_stage = stage.into();
        self
    }

    /// Set the artifact location.
    #[must_use]
    pub fn artifact_location(mut self, location: impl Into<String>) -> Self {
        self.artifact_location = Some(location.into());
        self
    }

    /// Build the `ExperimentRecord`.
    #[must_use]
    pub fn build(self) -> ExperimentRecord {
        ExperimentRecord {
            experiment_id: self.experiment_id,
            name: self.name,
            created_at: self.created_at,
            lifecycle_stage: self.lifecycle_stage,
            artifact_location: self.artifact_location,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_experiment_record_new() {
        let record = ExperimentRecord::new("test-id", "test-name");
        assert_eq!(record.experiment_id(), "test-id");
        assert_eq!(record.name(), "test-name");
        assert_eq!(record.lifecycle_stage(), "active");
    }

    #[test]
    fn test_experiment_record_builder() {
        let record = ExperimentRecord::builder("test-id", "test-name")
            .artifact_location("mlflow-artifacts:/1")
            .build();

        assert_eq!(record.artifact_location(), Some("mlflow-artifacts:/1"));
    }
}

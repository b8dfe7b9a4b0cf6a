//! Experiment Store - in-memory tracking backend
//!
//! Holds everything a run logs in hash maps and vectors. Used by tests and
//! for dry runs that should not touch disk or network.

use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use super::{
    ArtifactRecord, ExperimentRecord, MetricRecord, ModelVersion, ParamRecord, RunRecord,
    RunStatus,
};
use crate::tracking::{ModelArtifact, TrackingBackend};
use crate::{Error, Result};

/// In-memory store for experiment tracking data.
///
/// Experiment ids are sequential integers starting at 1, run ids are
/// hyphen-less UUIDv4 strings. Registered model versions count up from 1
/// per model name.
#[derive(Debug, Default)]
pub struct ExperimentStore {
    experiments: HashMap<String, ExperimentRecord>,
    runs: HashMap<String, RunRecord>,
    params: Vec<ParamRecord>,
    metrics: Vec<MetricRecord>,
    artifacts: Vec<ArtifactRecord>,
    artifact_bytes: HashMap<String, Vec<u8>>,
    model_versions: HashMap<String, Vec<ModelVersion>>,
}

impl ExperimentStore {
    /// Create a new empty experiment store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the store is empty (no experiments, runs, or metrics).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty() && self.runs.is_empty() && self.metrics.is_empty()
    }

    /// Get the number of experiments in the store.
    #[must_use]
    pub fn experiment_count(&self) -> usize {
        self.experiments.len()
    }

    /// Get the number of runs in the store.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Get the number of metrics in the store.
    #[must_use]
    pub fn metric_count(&self) -> usize {
        self.metrics.len()
    }

    /// Get an experiment by ID.
    #[must_use]
    pub fn get_experiment(&self, experiment_id: &str) -> Option<&ExperimentRecord> {
        self.experiments.get(experiment_id)
    }

    /// Get a run by ID.
    #[must_use]
    pub fn get_run(&self, run_id: &str) -> Option<&RunRecord> {
        self.runs.get(run_id)
    }

    /// Get all runs for an experiment.
    #[must_use]
    pub fn get_runs_for_experiment(&self, experiment_id: &str) -> Vec<&RunRecord> {
        self.runs
            .values()
            .filter(|run| run.experiment_id() == experiment_id)
            .collect()
    }

    /// Params logged for a run, in logging order.
    #[must_use]
    pub fn get_params_for_run(&self, run_id: &str) -> Vec<&ParamRecord> {
        self.params.iter().filter(|p| p.run_id() == run_id).collect()
    }

    /// Get metrics for a specific run and key, ordered by step.
    ///
    /// ## Example
    ///
    /// ```rust
    /// use attrition_ml::experiment::ExperimentStore;
    /// use attrition_ml::tracking::TrackingBackend;
    ///
    /// let mut store = ExperimentStore::new();
    /// let experiment = store.create_experiment("attrition_prediction")?;
    /// let run = store.create_run(experiment.experiment_id(), "rf-default-model")?;
    ///
    /// store.log_metric(run.run_id(), "test accuracy", 0.87, 0)?;
    ///
    /// let accuracy = store.get_metrics_for_run(run.run_id(), "test accuracy");
    /// assert_eq!(accuracy.len(), 1);
    /// # Ok::<(), attrition_ml::Error>(())
    /// ```
    #[must_use]
    pub fn get_metrics_for_run(&self, run_id: &str, key: &str) -> Vec<MetricRecord> {
        let mut metrics: Vec<MetricRecord> = self
            .metrics
            .iter()
            .filter(|m| m.run_id() == run_id && m.key() == key)
            .cloned()
            .collect();
        metrics.sort_by_key(MetricRecord::step);
        metrics
    }

    /// Artifact files logged for a run.
    #[must_use]
    pub fn get_artifacts_for_run(&self, run_id: &str) -> Vec<&ArtifactRecord> {
        self.artifacts.iter().filter(|a| a.run_id() == run_id).collect()
    }

    /// Content of a logged artifact file.
    #[must_use]
    pub fn artifact_bytes(&self, run_id: &str, key: &str) -> Option<&[u8]> {
        self.artifact_bytes
            .get(&artifact_slot(run_id, key))
            .map(Vec::as_slice)
    }

    /// Registered versions of a model, oldest first.
    #[must_use]
    pub fn model_versions(&self, name: &str) -> &[ModelVersion] {
        self.model_versions
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn require_run(&self, run_id: &str) -> Result<()> {
        if self.runs.contains_key(run_id) {
            Ok(())
        } else {
            Err(Error::NotFound(format!("run '{run_id}'")))
        }
    }
}

impl TrackingBackend for ExperimentStore {
    fn get_experiment_by_name(&mut self, name: &str) -> Result<Option<ExperimentRecord>> {
        Ok(self
            .experiments
            .values()
            .find(|e| e.name() == name && e.lifecycle_stage() == "active")
            .cloned())
    }

    fn create_experiment(&mut self, name: &str) -> Result<ExperimentRecord> {
        if self.get_experiment_by_name(name)?.is_some() {
            return Err(Error::InvalidInput(format!(
                "experiment '{name}' already exists"
            )));
        }
        let id = (self.experiments.len() + 1).to_string();
        let experiment = ExperimentRecord::new(&id, name);
        self.experiments.insert(id, experiment.clone());
        Ok(experiment)
    }

    fn create_run(&mut self, experiment_id: &str, run_name: &str) -> Result<RunRecord> {
        if !self.experiments.contains_key(experiment_id) {
            return Err(Error::NotFound(format!("experiment '{experiment_id}'")));
        }
        let run_id = Uuid::new_v4().simple().to_string();
        let run = RunRecord::builder(&run_id, experiment_id)
            .run_name(run_name)
            .running_since(Utc::now())
            .artifact_uri(format!("memory:/{experiment_id}/{run_id}/artifacts"))
            .build();
        self.runs.insert(run_id, run.clone());
        Ok(run)
    }

    fn log_param(&mut self, run_id: &str, key: &str, value: &str) -> Result<()> {
        self.require_run(run_id)?;
        if let Some(existing) = self
            .params
            .iter()
            .find(|p| p.run_id() == run_id && p.key() == key)
        {
            if existing.value() == value {
                return Ok(());
            }
            return Err(Error::ParamConflict {
                run_id: run_id.to_string(),
                key: key.to_string(),
                existing: existing.value().to_string(),
                new: value.to_string(),
            });
        }
        self.params.push(ParamRecord::new(run_id, key, value));
        Ok(())
    }

    fn log_metric(&mut self, run_id: &str, key: &str, value: f64, step: u64) -> Result<()> {
        self.require_run(run_id)?;
        self.metrics.push(MetricRecord::new(run_id, key, value, step));
        Ok(())
    }

    fn log_artifact(&mut self, run_id: &str, artifact: &ModelArtifact) -> Result<Vec<ArtifactRecord>> {
        self.require_run(run_id)?;
        let mut records = Vec::with_capacity(artifact.files().len());
        for file in artifact.files() {
            let key = artifact.key_for(file);
            self.artifact_bytes
                .insert(artifact_slot(run_id, &key), file.bytes.clone());
            records.push(ArtifactRecord::new(run_id, &key, &file.bytes));
        }
        self.artifacts.extend(records.iter().cloned());
        Ok(records)
    }

    fn register_model(&mut self, name: &str, run_id: &str, artifact_path: &str) -> Result<ModelVersion> {
        self.require_run(run_id)?;
        let versions = self.model_versions.entry(name.to_string()).or_default();
        let version = ModelVersion::new(name, (versions.len() + 1).to_string(), run_id, artifact_path);
        versions.push(version.clone());
        Ok(version)
    }

    fn finish_run(&mut self, run: &mut RunRecord, status: RunStatus) -> Result<()> {
        let stored = self
            .runs
            .get_mut(run.run_id())
            .ok_or_else(|| Error::NotFound(format!("run '{}'", run.run_id())))?;
        run.complete(status);
        *stored = run.clone();
        Ok(())
    }
}

fn artifact_slot(run_id: &str, key: &str) -> String {
    format!("{run_id}/{key}")
}

//! Experiment tracking backends
//!
//! A [`TrackingBackend`] stores experiments, runs, params, metrics and model
//! artifacts. Three implementations ship with the crate:
//!
//! - [`RestStore`]: an MLflow-compatible tracking server over HTTP(S)
//! - [`FileStore`]: a directory tree on local disk
//! - [`ExperimentStore`](crate::experiment::ExperimentStore): in memory
//!
//! [`open_backend`] picks the first two from a [`TrackingConfig`]; the
//! registration policy is chosen separately by [`publisher_for`].

mod artifact;
mod file_store;
mod publisher;
mod rest;

use std::io::Write;

pub use artifact::{ArtifactFile, ColumnSpec, ColumnType, ModelArtifact, ModelSignature};
pub use file_store::FileStore;
pub use publisher::{publisher_for, LogOnly, ModelPublisher, RegisterModel};
pub use rest::RestStore;

use crate::config::{TrackingConfig, TrackingUri};
use crate::experiment::{ArtifactRecord, ExperimentRecord, ModelVersion, RunRecord, RunStatus};
use crate::Result;

/// Storage for experiments and the runs filed under them.
///
/// Calls are synchronous and never retried. Any error aborts the caller's
/// pipeline.
pub trait TrackingBackend {
    /// Look up an active experiment by exact name.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read. A missing experiment
    /// is `Ok(None)`.
    fn get_experiment_by_name(&mut self, name: &str) -> Result<Option<ExperimentRecord>>;

    /// Create an experiment.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken or the backend cannot be written.
    fn create_experiment(&mut self, name: &str) -> Result<ExperimentRecord>;

    /// Open a new run in `experiment_id`, already in Running status.
    ///
    /// # Errors
    ///
    /// Returns an error if the experiment does not exist or the backend
    /// cannot be written.
    fn create_run(&mut self, experiment_id: &str, run_name: &str) -> Result<RunRecord>;

    /// Record a param. Re-logging the same value is accepted; a different
    /// value is an error.
    ///
    /// # Errors
    ///
    /// Returns an error on a conflicting value or a backend failure.
    fn log_param(&mut self, run_id: &str, key: &str, value: &str) -> Result<()>;

    /// Record a metric at `step`.
    ///
    /// # Errors
    ///
    /// Returns an error on a backend failure.
    fn log_metric(&mut self, run_id: &str, key: &str, value: f64, step: u64) -> Result<()>;

    /// Store every file of `artifact` under the run's artifact root.
    ///
    /// # Errors
    ///
    /// Returns an error if any file cannot be stored.
    fn log_artifact(&mut self, run_id: &str, artifact: &ModelArtifact) -> Result<Vec<ArtifactRecord>>;

    /// Register the artifact at `artifact_path` of `run_id` as a new version
    /// of the named model, creating the model on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend has no model registry or the call
    /// fails.
    fn register_model(&mut self, name: &str, run_id: &str, artifact_path: &str) -> Result<ModelVersion>;

    /// Close `run` with a terminal `status` and record the end time.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn finish_run(&mut self, run: &mut RunRecord, status: RunStatus) -> Result<()>;
}

/// Fetch the experiment called `name`, creating it if absent.
///
/// Prints one line to `out` saying which of the two happened.
///
/// # Errors
///
/// Propagates backend errors, and IO errors from writing to `out`.
pub fn get_or_create_experiment<W: Write>(
    backend: &mut dyn TrackingBackend,
    name: &str,
    out: &mut W,
) -> Result<ExperimentRecord> {
    if let Some(experiment) = backend.get_experiment_by_name(name)? {
        writeln!(out, "Experiment '{name}' already exists")?;
        tracing::info!(experiment_id = experiment.experiment_id(), "Using existing experiment");
        return Ok(experiment);
    }
    let experiment = backend.create_experiment(name)?;
    writeln!(
        out,
        "Experiment '{name}' created with ID: {}",
        experiment.experiment_id()
    )?;
    tracing::info!(experiment_id = experiment.experiment_id(), "Created experiment");
    Ok(experiment)
}

/// Open the backend named by `config.tracking_uri`.
///
/// # Errors
///
/// Returns an error for an unsupported URI or an unusable local directory.
pub fn open_backend(config: &TrackingConfig) -> Result<Box<dyn TrackingBackend>> {
    match config.uri()? {
        TrackingUri::Remote(url) => {
            tracing::info!(%url, "Using remote tracking server");
            Ok(Box::new(RestStore::new(url, config.credentials.clone())))
        }
        TrackingUri::Local(root) => {
            tracing::info!(root = %root.display(), "Using local file store");
            Ok(Box::new(FileStore::open(root)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::ExperimentStore;

    #[test]
    fn test_get_or_create_is_idempotent() {
        let mut store = ExperimentStore::new();
        let mut out = Vec::new();

        let first = get_or_create_experiment(&mut store, "attrition_prediction", &mut out).unwrap();
        let second = get_or_create_experiment(&mut store, "attrition_prediction", &mut out).unwrap();

        assert_eq!(first.experiment_id(), second.experiment_id());
        assert_eq!(store.experiment_count(), 1);
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("created with ID"));
        assert!(printed.contains("already exists"));
    }

    #[test]
    fn test_open_backend_rejects_unknown_scheme() {
        let config = TrackingConfig {
            tracking_uri: "s3://bucket/mlruns".to_string(),
            ..TrackingConfig::default()
        };
        assert!(open_backend(&config).is_err());
    }

    #[test]
    fn test_open_backend_local_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrackingConfig::local(dir.path().join("mlruns"));
        assert!(open_backend(&config).is_ok());
        assert!(dir.path().join("mlruns").is_dir());
    }
}

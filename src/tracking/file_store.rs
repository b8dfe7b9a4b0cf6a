//! Local directory tracking store
//!
//! ```text
//! <root>/<experiment_id>/meta.json
//! <root>/<experiment_id>/<run_id>/meta.json
//!                                /params.json     {"key": "value", ...}
//!                                /metrics.json    [MetricRecord, ...]
//!                                /artifacts/<artifact_path>/<file>
//! ```

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use super::{ModelArtifact, TrackingBackend};
use crate::experiment::{
    ArtifactRecord, ExperimentRecord, MetricRecord, ModelVersion, RunRecord, RunStatus,
};
use crate::{Error, Result};

const META_FILE: &str = "meta.json";
const PARAMS_FILE: &str = "params.json";
const METRICS_FILE: &str = "metrics.json";
const ARTIFACTS_DIR: &str = "artifacts";

/// Tracking store rooted at a local directory.
///
/// Experiment ids are increasing integers starting at 1. Run ids are
/// hyphen-less UUIDv4 strings. The store has no model registry.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open the store at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Store root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of an existing run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no experiment holds the run.
    pub fn run_dir(&self, run_id: &str) -> Result<PathBuf> {
        if run_id.is_empty() || run_id.contains(['/', '\\', '.']) {
            return Err(Error::NotFound(format!("run '{run_id}'")));
        }
        for experiment_dir in self.experiment_dirs()? {
            let candidate = experiment_dir.join(run_id);
            if candidate.join(META_FILE).is_file() {
                return Ok(candidate);
            }
        }
        Err(Error::NotFound(format!("run '{run_id}'")))
    }

    /// Read back a run's metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if the run does not exist or cannot be parsed.
    pub fn get_run(&self, run_id: &str) -> Result<RunRecord> {
        read_json(&self.run_dir(run_id)?.join(META_FILE))
    }

    /// Read back a run's params.
    ///
    /// # Errors
    ///
    /// Returns an error if the run does not exist or cannot be parsed.
    pub fn params(&self, run_id: &str) -> Result<BTreeMap<String, String>> {
        read_json(&self.run_dir(run_id)?.join(PARAMS_FILE))
    }

    /// Read back a run's metrics in logging order.
    ///
    /// # Errors
    ///
    /// Returns an error if the run does not exist or cannot be parsed.
    pub fn metrics(&self, run_id: &str) -> Result<Vec<MetricRecord>> {
        read_json(&self.run_dir(run_id)?.join(METRICS_FILE))
    }

    /// Runs of an experiment, unordered.
    ///
    /// # Errors
    ///
    /// Returns an error if the experiment directory cannot be read.
    pub fn list_runs(&self, experiment_id: &str) -> Result<Vec<RunRecord>> {
        let dir = self.root.join(experiment_id);
        if !dir.join(META_FILE).is_file() {
            return Err(Error::NotFound(format!("experiment '{experiment_id}'")));
        }
        let mut runs = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            let meta = path.join(META_FILE);
            if path.is_dir() && meta.is_file() {
                runs.push(read_json(&meta)?);
            }
        }
        Ok(runs)
    }

    fn experiment_dirs(&self) -> Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.is_dir() && path.join(META_FILE).is_file() {
                dirs.push(path);
            }
        }
        Ok(dirs)
    }

    fn next_experiment_id(&self) -> Result<u64> {
        let mut max = 0;
        for dir in self.experiment_dirs()? {
            if let Some(id) = dir
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.parse::<u64>().ok())
            {
                max = max.max(id);
            }
        }
        Ok(max + 1)
    }
}

impl TrackingBackend for FileStore {
    fn get_experiment_by_name(&mut self, name: &str) -> Result<Option<ExperimentRecord>> {
        for dir in self.experiment_dirs()? {
            let experiment: ExperimentRecord = read_json(&dir.join(META_FILE))?;
            if experiment.name() == name && experiment.lifecycle_stage() == "active" {
                return Ok(Some(experiment));
            }
        }
        Ok(None)
    }

    fn create_experiment(&mut self, name: &str) -> Result<ExperimentRecord> {
        if name.trim().is_empty() {
            return Err(Error::InvalidInput("experiment name is empty".to_string()));
        }
        if self.get_experiment_by_name(name)?.is_some() {
            return Err(Error::InvalidInput(format!(
                "experiment '{name}' already exists"
            )));
        }
        let id = self.next_experiment_id()?.to_string();
        let dir = self.root.join(&id);
        fs::create_dir_all(&dir)?;
        let experiment = ExperimentRecord::builder(&id, name)
            .artifact_location(dir.display().to_string())
            .build();
        write_json(&dir.join(META_FILE), &experiment)?;
        Ok(experiment)
    }

    fn create_run(&mut self, experiment_id: &str, run_name: &str) -> Result<RunRecord> {
        let experiment_dir = self.root.join(experiment_id);
        if !experiment_dir.join(META_FILE).is_file() {
            return Err(Error::NotFound(format!("experiment '{experiment_id}'")));
        }
        let run_id = Uuid::new_v4().simple().to_string();
        let run_dir = experiment_dir.join(&run_id);
        let artifacts = run_dir.join(ARTIFACTS_DIR);
        fs::create_dir_all(&artifacts)?;

        let run = RunRecord::builder(&run_id, experiment_id)
            .run_name(run_name)
            .running_since(Utc::now())
            .artifact_uri(artifacts.display().to_string())
            .build();
        write_json(&run_dir.join(META_FILE), &run)?;
        write_json(&run_dir.join(PARAMS_FILE), &BTreeMap::<String, String>::new())?;
        write_json(&run_dir.join(METRICS_FILE), &Vec::<MetricRecord>::new())?;
        tracing::debug!(run_id = %run_id, path = %run_dir.display(), "Created run directory");
        Ok(run)
    }

    fn log_param(&mut self, run_id: &str, key: &str, value: &str) -> Result<()> {
        let path = self.run_dir(run_id)?.join(PARAMS_FILE);
        let mut params: BTreeMap<String, String> = read_json(&path)?;
        if let Some(existing) = params.get(key) {
            if existing == value {
                return Ok(());
            }
            return Err(Error::ParamConflict {
                run_id: run_id.to_string(),
                key: key.to_string(),
                existing: existing.clone(),
                new: value.to_string(),
            });
        }
        params.insert(key.to_string(), value.to_string());
        write_json(&path, &params)
    }

    fn log_metric(&mut self, run_id: &str, key: &str, value: f64, step: u64) -> Result<()> {
        let path = self.run_dir(run_id)?.join(METRICS_FILE);
        let mut metrics: Vec<MetricRecord> = read_json(&path)?;
        metrics.push(MetricRecord::new(run_id, key, value, step));
        write_json(&path, &metrics)
    }

    fn log_artifact(&mut self, run_id: &str, artifact: &ModelArtifact) -> Result<Vec<ArtifactRecord>> {
        let artifact_path = artifact.artifact_path().trim_matches('/');
        if artifact_path.is_empty() || artifact_path.split('/').any(|part| part == "..") {
            return Err(Error::InvalidInput(format!(
                "invalid artifact path '{}'",
                artifact.artifact_path()
            )));
        }
        let base = self.run_dir(run_id)?.join(ARTIFACTS_DIR).join(artifact_path);
        fs::create_dir_all(&base)?;

        let mut records = Vec::with_capacity(artifact.files().len());
        for file in artifact.files() {
            fs::write(base.join(&file.path), &file.bytes)?;
            records.push(ArtifactRecord::new(run_id, &artifact.key_for(file), &file.bytes));
        }
        tracing::info!(
            run_id,
            artifact_path,
            files = records.len(),
            "Logged model artifact"
        );
        Ok(records)
    }

    fn register_model(&mut self, name: &str, _run_id: &str, _artifact_path: &str) -> Result<ModelVersion> {
        Err(Error::Unsupported(format!(
            "model registry is not available in a file store (model '{name}')"
        )))
    }

    fn finish_run(&mut self, run: &mut RunRecord, status: RunStatus) -> Result<()> {
        let path = self.run_dir(run.run_id())?.join(META_FILE);
        run.complete(status);
        write_json(&path, run)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}

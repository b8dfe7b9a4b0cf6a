//! Training pipeline
//!
//! [`run_training`] drives one tracked run end to end:
//!
//! ```text
//! validate config → stratified split → get/create experiment → open run
//!   → fit → predict test rows → log params + metrics → publish model
//!   → close run (FINISHED, or FAILED on any error)
//! ```
//!
//! What gets fitted is up to the [`ModelTrainer`]: [`BaselineTrainer`] fits a
//! default forest, [`GridSearchTrainer`] tunes one by cross-validated grid
//! search.

mod baseline;
mod tuning;

use std::io::{self, Write};

pub use baseline::BaselineTrainer;
pub use tuning::GridSearchTrainer;

use crate::config::TrainingConfig;
use crate::dataset::{train_test_split, Dataset, FeatureMatrix};
use crate::experiment::{ArtifactRecord, ModelVersion, RunRecord, RunStatus};
use crate::metrics::ClassificationReport;
use crate::model::RandomForestClassifier;
use crate::tracking::{
    get_or_create_experiment, open_backend, publisher_for, ModelArtifact, ModelPublisher,
    TrackingBackend,
};
use crate::{Error, Result};

/// Prefix of every logged hyperparameter key.
pub const PARAM_PREFIX: &str = "tuned_";

/// A model-fitting strategy plugged into [`run_training`].
pub trait ModelTrainer {
    /// Run name shown in the tracking UI.
    fn run_name(&self) -> &str;

    /// Artifact directory for the fitted model.
    fn artifact_path(&self) -> &str;

    /// Name the model is registered under on remote backends.
    fn registered_model_name(&self) -> &str;

    /// Fit on the training split.
    ///
    /// # Errors
    ///
    /// Returns an error if fitting fails.
    fn fit(&mut self, train: &Dataset) -> Result<()>;

    /// Predict labels for `x`.
    ///
    /// # Errors
    ///
    /// Returns an error if the trainer is not fitted or `x` has the wrong
    /// width.
    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<usize>>;

    /// Params to log, keys already prefixed with [`PARAM_PREFIX`].
    ///
    /// # Errors
    ///
    /// Returns an error if the params are only known after fitting.
    fn get_params(&self) -> Result<Vec<(String, String)>>;

    /// Metrics logged besides the four held-out scores.
    fn extra_metrics(&self) -> Vec<(String, f64)> {
        Vec::new()
    }

    /// Fitted model to publish.
    fn model(&self) -> Option<&RandomForestClassifier>;

    /// Print anything worth showing after fitting.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `out` fails.
    fn report(&self, _out: &mut dyn Write) -> io::Result<()> {
        Ok(())
    }
}

/// Prefix each param name with [`PARAM_PREFIX`].
#[must_use]
pub fn prefixed(params: Vec<(String, String)>) -> Vec<(String, String)> {
    params
        .into_iter()
        .map(|(key, value)| (format!("{PARAM_PREFIX}{key}"), value))
        .collect()
}

/// Outcome of a closed run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Run as closed by the backend
    pub run: RunRecord,
    /// Held-out scores
    pub report: ClassificationReport,
    /// Logged params, in logging order
    pub params: Vec<(String, String)>,
    /// Stored artifact files
    pub artifacts: Vec<ArtifactRecord>,
    /// Registered version, when the publisher registers
    pub model_version: Option<ModelVersion>,
}

impl RunSummary {
    /// Print the run info block: ids, status, epoch-millisecond times and
    /// lifecycle stage.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `out` fails.
    pub fn print_run_info<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        let millis = |t: Option<chrono::DateTime<chrono::Utc>>| {
            t.map_or_else(|| "None".to_string(), |t| t.timestamp_millis().to_string())
        };
        writeln!(out, "run_id: {}", self.run.run_id())?;
        writeln!(out, "experiment_id: {}", self.run.experiment_id())?;
        writeln!(out, "status: {}", self.run.status())?;
        writeln!(out, "start_time: {}", millis(self.run.started_at()))?;
        writeln!(out, "end_time: {}", millis(self.run.ended_at()))?;
        writeln!(out, "lifecycle_stage: {}", self.run.lifecycle_stage())
    }
}

/// Run one tracked training job on an already loaded dataset.
///
/// Exactly one run is created. If anything fails after the run is opened,
/// the run is closed with status FAILED and the original error is returned.
///
/// # Errors
///
/// Returns the first error from validation, splitting, the backend, the
/// trainer or the publisher. No step is retried.
pub fn run_training<W: Write>(
    config: &TrainingConfig,
    data: &Dataset,
    trainer: &mut dyn ModelTrainer,
    backend: &mut dyn TrackingBackend,
    publisher: &dyn ModelPublisher,
    out: &mut W,
) -> Result<RunSummary> {
    config.validate()?;
    let split = train_test_split(data, config.test_size, config.random_state)?;
    tracing::info!(
        train_rows = split.train.len(),
        test_rows = split.test.len(),
        positive_rate = data.positive_rate(),
        "Split dataset"
    );

    let experiment = get_or_create_experiment(backend, &config.tracking.experiment_name, out)?;
    let mut run = backend.create_run(experiment.experiment_id(), trainer.run_name())?;
    tracing::info!(
        run_id = run.run_id(),
        run_name = trainer.run_name(),
        "Started run"
    );

    let run_id = run.run_id().to_string();
    let outcome = execute_run(&run_id, &split.train, &split.test, trainer, backend, publisher, out);

    match outcome {
        Ok((report, params, artifacts, model_version)) => {
            backend.finish_run(&mut run, RunStatus::Success)?;
            tracing::info!(run_id = %run_id, accuracy = report.accuracy, "Run finished");
            Ok(RunSummary {
                run,
                report,
                params,
                artifacts,
                model_version,
            })
        }
        Err(err) => {
            tracing::error!(run_id = %run_id, error = %err, "Run failed");
            if let Err(close_err) = backend.finish_run(&mut run, RunStatus::Failed) {
                tracing::warn!(run_id = %run_id, error = %close_err, "Could not mark run as failed");
            }
            Err(err)
        }
    }
}

type RunOutcome = (
    ClassificationReport,
    Vec<(String, String)>,
    Vec<ArtifactRecord>,
    Option<ModelVersion>,
);

fn execute_run<W: Write>(
    run_id: &str,
    train: &Dataset,
    test: &Dataset,
    trainer: &mut dyn ModelTrainer,
    backend: &mut dyn TrackingBackend,
    publisher: &dyn ModelPublisher,
    out: &mut W,
) -> Result<RunOutcome> {
    trainer.fit(train)?;
    trainer.report(out)?;

    let predictions = trainer.predict(test.features())?;
    let report = ClassificationReport::evaluate(test.labels(), &predictions)?;

    let params = trainer.get_params()?;
    for (key, value) in &params {
        backend.log_param(run_id, key, value)?;
    }
    for (key, value) in report.as_metrics() {
        backend.log_metric(run_id, key, value, 0)?;
    }
    for (key, value) in trainer.extra_metrics() {
        backend.log_metric(run_id, &key, value, 0)?;
    }

    let model = trainer
        .model()
        .ok_or_else(|| Error::InvalidInput("trainer produced no model".to_string()))?;
    let artifact = ModelArtifact::from_forest(trainer.artifact_path(), model, train)?;
    let (artifacts, model_version) = publisher.publish(backend, run_id, &artifact)?;

    Ok((report, params, artifacts, model_version))
}

/// Load the dataset, open the configured backend, pick the registration
/// policy from the tracking URI and run `trainer`.
///
/// # Errors
///
/// Returns an error if the dataset cannot be loaded, the tracking URI is
/// unsupported, or the run fails.
pub fn train_from_config<W: Write>(
    config: &TrainingConfig,
    trainer: &mut dyn ModelTrainer,
    out: &mut W,
) -> Result<RunSummary> {
    config.validate()?;
    let data = Dataset::from_csv(&config.dataset_path, &config.label_column)?;
    let uri = config.tracking.uri()?;
    let mut backend = open_backend(&config.tracking)?;
    let publisher = publisher_for(&uri, trainer.registered_model_name());
    run_training(config, &data, trainer, backend.as_mut(), publisher.as_ref(), out)
}

//! Train the default-hyperparameter forest and record it as one tracked run.
//!
//! Environment: `ATTRITION_DATASET`, `MLFLOW_TRACKING_URI`,
//! `MLFLOW_TRACKING_USERNAME`/`MLFLOW_TRACKING_PASSWORD` (or `USERNAME`/`TOKEN`),
//! `RUST_LOG`.

use std::io::{self, Write};

use anyhow::Context;
use attrition_ml::config::TrainingConfig;
use attrition_ml::logging::{self, LoggingConfig};
use attrition_ml::trainer::{train_from_config, BaselineTrainer};

fn main() -> anyhow::Result<()> {
    logging::init(&LoggingConfig::default()).context("failed to initialize logging")?;

    let config = TrainingConfig::from_env();
    tracing::info!(
        dataset = %config.dataset_path.display(),
        tracking_uri = %config.tracking.tracking_uri,
        "Starting baseline training"
    );

    let mut out = io::stdout();
    let mut trainer = BaselineTrainer::new();
    let summary = train_from_config(&config, &mut trainer, &mut out)
        .with_context(|| format!("baseline training on {} failed", config.dataset_path.display()))?;
    summary.print_run_info(&mut out)?;
    out.flush()?;
    Ok(())
}

//! Grid-search the forest hyperparameters, refit the best candidate and
//! record it as one tracked run.
//!
//! Reads the same environment variables as `train_baseline`.

use std::io::{self, Write};

use anyhow::Context;
use attrition_ml::config::TrainingConfig;
use attrition_ml::logging::{self, LoggingConfig};
use attrition_ml::trainer::{train_from_config, GridSearchTrainer};

fn main() -> anyhow::Result<()> {
    logging::init(&LoggingConfig::default()).context("failed to initialize logging")?;

    let config = TrainingConfig::from_env();
    tracing::info!(
        dataset = %config.dataset_path.display(),
        tracking_uri = %config.tracking.tracking_uri,
        "Starting hyperparameter tuning"
    );

    let mut out = io::stdout();
    let mut trainer = GridSearchTrainer::new();
    let summary = train_from_config(&config, &mut trainer, &mut out)
        .with_context(|| format!("tuning on {} failed", config.dataset_path.display()))?;
    summary.print_run_info(&mut out)?;
    out.flush()?;
    Ok(())
}

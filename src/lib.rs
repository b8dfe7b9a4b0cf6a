//! # attrition-ml: Tracked Random-Forest Training for Employee Attrition
//!
//! **Version**: 0.1.0
//!
//! Trains a binary attrition classifier on a pre-processed CSV, records each
//! training invocation as a run in an experiment-tracking backend, and
//! smoke-tests a deployed prediction endpoint.
//!
//! ## Entry Points
//!
//! - **Baseline**: default random forest, all params logged
//!   ([`trainer::BaselineTrainer`])
//! - **Tuning**: 81-candidate grid × 5 stratified folds, best refit
//!   ([`trainer::GridSearchTrainer`])
//! - **Smoke test**: sequential JSON requests against `/predict`
//!   ([`inference::run_smoke_test`])
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use attrition_ml::config::{TrackingConfig, TrainingConfig};
//! use attrition_ml::trainer::{train_from_config, BaselineTrainer};
//!
//! let config = TrainingConfig::default()
//!     .with_dataset_path("employee_preprocessing.csv")
//!     .with_tracking(TrackingConfig::local("mlruns"));
//!
//! let mut trainer = BaselineTrainer::new();
//! let summary = train_from_config(&config, &mut trainer, &mut std::io::stdout())?;
//! summary.print_run_info(&mut std::io::stdout())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod dataset;
pub mod error;
pub mod experiment;
pub mod inference;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod model_selection;
pub mod tracking;
pub mod trainer;

pub use error::{Error, Result};

//! Experiment tracking records
//!
//! The data a tracking backend stores for each training invocation.
//!
//! ## Schema Overview
//!
//! ```text
//! ExperimentRecord (1) ──< RunRecord (N)
//!                              │
//!                              ├──< ParamRecord (N)   [key -> rendered value]
//!                              ├──< MetricRecord (N)  [key, step -> f64]
//!                              ├──< ArtifactRecord (N) [path -> sha256]
//!                              └──< ModelVersion (0..1 per registered name)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use attrition_ml::experiment::{ExperimentRecord, RunRecord, MetricRecord, RunStatus};
//!
//! let experiment = ExperimentRecord::new("1", "attrition_prediction");
//!
//! let mut run = RunRecord::builder("run-001", experiment.experiment_id())
//!     .run_name("rf-default-model")
//!     .build();
//! run.start();
//!
//! let metric = MetricRecord::new(run.run_id(), "test accuracy", 0.87, 0);
//! assert_eq!(metric.step(), 0);
//!
//! run.complete(RunStatus::Success);
//! assert_eq!(run.status().to_string(), "FINISHED");
//! ```

mod artifact_record;
mod experiment_record;
mod metric_record;
mod model_version;
mod param_record;
mod run_record;
mod store;

pub use artifact_record::ArtifactRecord;
pub use experiment_record::{ExperimentRecord, ExperimentRecordBuilder};
pub use metric_record::MetricRecord;
pub use model_version::{runs_uri, ModelVersion};
pub use param_record::ParamRecord;
pub use run_record::{RunRecord, RunRecordBuilder, RunStatus};
pub use store::ExperimentStore;

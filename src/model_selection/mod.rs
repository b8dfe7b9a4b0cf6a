//! Cross-validation and hyperparameter search.
//!
//! - [`StratifiedKFold`]: label-balanced folds
//! - [`ParamGrid`]: Cartesian grid over the four tuned forest axes
//! - [`GridSearchCv`]: exhaustive search scored by mean fold accuracy
//!
//! linfa's `Dataset::fold` is unstratified and linfa has no grid search, so
//! both live here around the linfa-backed forest.

mod grid;
mod kfold;

pub use grid::{CandidateScore, GridSearchCv, GridSearchResult, ParamGrid};
pub use kfold::{Fold, StratifiedKFold};

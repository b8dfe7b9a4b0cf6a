//! Exhaustive grid search with cross-validation

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use super::{Fold, StratifiedKFold};
use crate::dataset::Dataset;
use crate::model::{ForestParams, RandomForestClassifier};
use crate::{Error, Result};

/// Discrete values for the four tuned forest axes.
///
/// Candidates are enumerated with the axis names in alphabetical order
/// (`max_depth`, `min_samples_leaf`, `min_samples_split`, `n_estimators`),
/// the last axis varying fastest. That order is also the tie-break order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamGrid {
    /// Candidate maximum depths
    pub max_depth: Vec<Option<usize>>,
    /// Candidate minimum leaf sizes
    pub min_samples_leaf: Vec<usize>,
    /// Candidate minimum split sizes
    pub min_samples_split: Vec<usize>,
    /// Candidate tree counts
    pub n_estimators: Vec<usize>,
}

impl ParamGrid {
    /// The 3×3×3×3 grid swept by the tuning trainer.
    #[must_use]
    pub fn attrition() -> Self {
        Self {
            max_depth: vec![None, Some(10), Some(20)],
            min_samples_leaf: vec![1, 2, 4],
            min_samples_split: vec![2, 5, 10],
            n_estimators: vec![50, 100, 150],
        }
    }

    /// Number of combinations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.max_depth.len()
            * self.min_samples_leaf.len()
            * self.min_samples_split.len()
            * self.n_estimators.len()
    }

    /// Whether any axis is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every combination applied on top of `base`, in enumeration order.
    #[must_use]
    pub fn candidates(&self, base: &ForestParams) -> Vec<ForestParams> {
        let mut out = Vec::with_capacity(self.len());
        for &max_depth in &self.max_depth {
            for &min_samples_leaf in &self.min_samples_leaf {
                for &min_samples_split in &self.min_samples_split {
                    for &n_estimators in &self.n_estimators {
                        out.push(ForestParams {
                            max_depth,
                            min_samples_leaf,
                            min_samples_split,
                            n_estimators,
                            ..base.clone()
                        });
                    }
                }
            }
        }
        out
    }
}

/// Cross-validation outcome for one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateScore {
    /// Candidate parameters
    pub params: ForestParams,
    /// Validation accuracy per fold, in fold order
    pub fold_scores: Vec<f64>,
    /// Mean of `fold_scores`
    pub mean_score: f64,
    /// Population standard deviation of `fold_scores`
    pub std_score: f64,
    /// 1 for the best mean; equal means share the lowest rank
    pub rank: usize,
}

/// Outcome of [`GridSearchCv::fit`].
#[derive(Debug, Clone)]
pub struct GridSearchResult {
    /// One entry per candidate, in enumeration order
    pub candidates: Vec<CandidateScore>,
    /// Index of the selected candidate
    pub best_index: usize,
    /// Forest refitted on the full training set with the best parameters
    pub best_estimator: RandomForestClassifier,
}

impl GridSearchResult {
    /// Parameters of the selected candidate.
    #[must_use]
    pub fn best_params(&self) -> &ForestParams {
        &self.candidates[self.best_index].params
    }

    /// Mean validation accuracy of the selected candidate.
    #[must_use]
    pub fn best_score(&self) -> f64 {
        self.candidates[self.best_index].mean_score
    }
}

/// Grid search over forest parameters scored by mean fold accuracy.
///
/// With the `rayon` feature, all (candidate, fold) fits run on rayon's global
/// pool. Each fit seeds its own forest from `base.random_state`, so scores do
/// not depend on scheduling.
#[derive(Debug, Clone)]
pub struct GridSearchCv {
    base: ForestParams,
    grid: ParamGrid,
    cv: StratifiedKFold,
}

impl GridSearchCv {
    /// Create a search over `grid`, filling the untuned fields from `base`.
    #[must_use]
    pub const fn new(base: ForestParams, grid: ParamGrid, cv: StratifiedKFold) -> Self {
        Self { base, grid, cv }
    }

    /// Parameter grid.
    #[must_use]
    pub const fn grid(&self) -> &ParamGrid {
        &self.grid
    }

    /// Cross-validator.
    #[must_use]
    pub const fn cv(&self) -> &StratifiedKFold {
        &self.cv
    }

    /// Score every candidate, pick the best and refit it on all of `train`.
    ///
    /// The best candidate is the first in enumeration order whose mean fold
    /// accuracy equals the maximum.
    ///
    /// # Errors
    ///
    /// Returns an error if the grid is empty, folds cannot be built, or any
    /// fit fails.
    pub fn fit(&self, train: &Dataset) -> Result<GridSearchResult> {
        if self.grid.is_empty() {
            return Err(Error::InvalidInput("parameter grid has an empty axis".to_string()));
        }
        let candidates = self.grid.candidates(&self.base);
        let folds = self.cv.split(train.labels())?;
        let fold_data: Vec<(Dataset, Dataset)> = folds
            .iter()
            .map(|Fold { train: fit_rows, test: val_rows }| {
                (train.subset(fit_rows), train.subset(val_rows))
            })
            .collect();

        let n_folds = fold_data.len();
        tracing::info!(
            "Fitting {} folds for each of {} candidates, totalling {} fits",
            n_folds,
            candidates.len(),
            n_folds * candidates.len()
        );

        let jobs = 0..candidates.len() * n_folds;
        #[cfg(feature = "rayon")]
        let jobs = jobs.into_par_iter();
        let scores: Vec<f64> = jobs
            .map(|job| -> Result<f64> {
                let (candidate, fold) = (job / n_folds, job % n_folds);
                let params = &candidates[candidate];
                let (fit_set, val_set) = &fold_data[fold];
                let mut forest = RandomForestClassifier::new(params.clone());
                forest.fit(fit_set)?;
                let score = forest.score(val_set)?;
                tracing::debug!(
                    "[CV {}/{}] END max_depth={}, min_samples_leaf={}, min_samples_split={}, n_estimators={}; score={:.3}",
                    fold + 1,
                    n_folds,
                    params.max_depth.map_or_else(|| "None".to_string(), |d| d.to_string()),
                    params.min_samples_leaf,
                    params.min_samples_split,
                    params.n_estimators,
                    score
                );
                Ok(score)
            })
            .collect::<Result<Vec<f64>>>()?;

        let mut results: Vec<CandidateScore> = candidates
            .into_iter()
            .zip(scores.chunks(n_folds))
            .map(|(params, fold_scores)| {
                let (mean_score, std_score) = mean_std(fold_scores);
                CandidateScore {
                    params,
                    fold_scores: fold_scores.to_vec(),
                    mean_score,
                    std_score,
                    rank: 0,
                }
            })
            .collect();

        let means: Vec<f64> = results.iter().map(|c| c.mean_score).collect();
        for candidate in &mut results {
            candidate.rank = 1 + means.iter().filter(|&&m| m > candidate.mean_score).count();
        }
        let best_index = first_max(&means);

        let best_params = results[best_index].params.clone();
        tracing::info!(
            best_index,
            best_score = results[best_index].mean_score,
            "Refitting best candidate on the full training split"
        );
        let mut best_estimator = RandomForestClassifier::new(best_params);
        best_estimator.fit(train)?;

        Ok(GridSearchResult {
            candidates: results,
            best_index,
            best_estimator,
        })
    }
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Index of the first maximum.
fn first_max(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

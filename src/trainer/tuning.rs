//! Grid-searched forest

use std::io::{self, Write};

use super::{prefixed, ModelTrainer};
use crate::config::DEFAULT_RANDOM_STATE;
use crate::dataset::{Dataset, FeatureMatrix};
use crate::model::{ForestParams, RandomForestClassifier};
use crate::model_selection::{GridSearchCv, GridSearchResult, ParamGrid, StratifiedKFold};
use crate::{Error, Result};

/// Folds per candidate.
pub const CV_SPLITS: usize = 5;

/// Tunes a forest by 5-fold stratified grid search and keeps the refitted
/// best estimator.
///
/// Logs only the four tuned params of the best candidate, plus the
/// `best_cv_score` metric.
#[derive(Debug, Clone)]
pub struct GridSearchTrainer {
    search: GridSearchCv,
    result: Option<GridSearchResult>,
}

impl GridSearchTrainer {
    /// Run name.
    pub const RUN_NAME: &'static str = "rf-tuning-model";
    /// Artifact path.
    pub const ARTIFACT_PATH: &'static str = "model-tuning";
    /// Registered model name.
    pub const REGISTERED_MODEL_NAME: &'static str = "rf_model_tuning";

    /// The 81-candidate grid, shuffled 5-fold CV and forests all seeded 42.
    #[must_use]
    pub fn new() -> Self {
        Self::with_search(GridSearchCv::new(
            ForestParams::default().with_random_state(DEFAULT_RANDOM_STATE),
            ParamGrid::attrition(),
            StratifiedKFold::new(CV_SPLITS).with_random_state(DEFAULT_RANDOM_STATE),
        ))
    }

    /// Trainer around a custom search.
    #[must_use]
    pub const fn with_search(search: GridSearchCv) -> Self {
        Self {
            search,
            result: None,
        }
    }

    /// Search outcome, after fitting.
    #[must_use]
    pub const fn result(&self) -> Option<&GridSearchResult> {
        self.result.as_ref()
    }

    fn fitted(&self) -> Result<&GridSearchResult> {
        self.result
            .as_ref()
            .ok_or_else(|| Error::InvalidInput("grid search has not been fitted".to_string()))
    }
}

impl Default for GridSearchTrainer {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelTrainer for GridSearchTrainer {
    fn run_name(&self) -> &str {
        Self::RUN_NAME
    }

    fn artifact_path(&self) -> &str {
        Self::ARTIFACT_PATH
    }

    fn registered_model_name(&self) -> &str {
        Self::REGISTERED_MODEL_NAME
    }

    fn fit(&mut self, train: &Dataset) -> Result<()> {
        let result = self.search.fit(train)?;
        tracing::info!(
            best_score = result.best_score(),
            best_index = result.best_index,
            "Grid search finished"
        );
        self.result = Some(result);
        Ok(())
    }

    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<usize>> {
        self.fitted()?.best_estimator.predict(x)
    }

    fn get_params(&self) -> Result<Vec<(String, String)>> {
        Ok(prefixed(self.fitted()?.best_params().tuned_param_list()))
    }

    fn extra_metrics(&self) -> Vec<(String, f64)> {
        self.result
            .as_ref()
            .map(|r| vec![("best_cv_score".to_string(), r.best_score())])
            .unwrap_or_default()
    }

    fn model(&self) -> Option<&RandomForestClassifier> {
        self.result.as_ref().map(|r| &r.best_estimator)
    }

    fn report(&self, out: &mut dyn Write) -> io::Result<()> {
        let Some(result) = &self.result else {
            return Ok(());
        };
        let rendered: Vec<String> = result
            .best_params()
            .tuned_param_list()
            .into_iter()
            .map(|(key, value)| format!("'{key}': {value}"))
            .collect();
        writeln!(out, "Best hyperparameters found: {{{}}}", rendered.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy() -> Dataset {
        let rows: Vec<Vec<f64>> = (0..24)
            .map(|i| vec![f64::from(i), f64::from(i % 5)])
            .collect();
        let labels = (0..24).map(|i| usize::from(i >= 12)).collect();
        Dataset::new(
            vec!["Age".into(), "NumCompaniesWorked".into()],
            "Attrition",
            FeatureMatrix::from_rows(&rows).unwrap(),
            labels,
        )
        .unwrap()
    }

    fn small_trainer() -> GridSearchTrainer {
        GridSearchTrainer::with_search(GridSearchCv::new(
            ForestParams::default().with_random_state(42),
            ParamGrid {
                max_depth: vec![None, Some(2)],
                min_samples_leaf: vec![1],
                min_samples_split: vec![2],
                n_estimators: vec![5],
            },
            StratifiedKFold::new(3).with_random_state(42),
        ))
    }

    #[test]
    fn test_names_and_defaults() {
        let trainer = GridSearchTrainer::new();
        assert_eq!(trainer.run_name(), "rf-tuning-model");
        assert_eq!(trainer.artifact_path(), "model-tuning");
        assert_eq!(trainer.registered_model_name(), "rf_model_tuning");
        assert_eq!(trainer.search.grid().len(), 81);
        assert_eq!(trainer.search.cv().n_splits(), CV_SPLITS);
    }

    #[test]
    fn test_params_require_fit() {
        let trainer = small_trainer();
        assert!(trainer.get_params().is_err());
        assert!(trainer.extra_metrics().is_empty());
        assert!(trainer.model().is_none());
    }

    #[test]
    fn test_fit_logs_only_tuned_params() {
        let mut trainer = small_trainer();
        trainer.fit(&toy()).unwrap();
        let params = trainer.get_params().unwrap();
        let keys: Vec<&str> = params.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "tuned_max_depth",
                "tuned_min_samples_leaf",
                "tuned_min_samples_split",
                "tuned_n_estimators"
            ]
        );
        assert_eq!(trainer.extra_metrics()[0].0, "best_cv_score");

        let mut out = Vec::new();
        trainer.report(&mut out).unwrap();
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.starts_with("Best hyperparameters found: {'max_depth': "));
    }
}

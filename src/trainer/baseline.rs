//! Default-hyperparameter forest

use super::{prefixed, ModelTrainer};
use crate::dataset::{Dataset, FeatureMatrix};
use crate::model::{ForestParams, RandomForestClassifier};
use crate::{Error, Result};

/// Fits one forest with default parameters and no fixed seed.
///
/// Logs every forest parameter.
#[derive(Debug, Clone)]
pub struct BaselineTrainer {
    model: RandomForestClassifier,
}

impl BaselineTrainer {
    /// Run name.
    pub const RUN_NAME: &'static str = "rf-default-model";
    /// Artifact path.
    pub const ARTIFACT_PATH: &'static str = "model";
    /// Registered model name.
    pub const REGISTERED_MODEL_NAME: &'static str = "rf_model";

    /// Trainer with [`ForestParams::default`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_params(ForestParams::default())
    }

    /// Trainer with explicit params, e.g. a fixed seed in tests.
    #[must_use]
    pub const fn with_params(params: ForestParams) -> Self {
        Self {
            model: RandomForestClassifier::new(params),
        }
    }
}

impl Default for BaselineTrainer {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelTrainer for BaselineTrainer {
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
        tracing::info!(
            rows = train.len(),
            n_estimators = self.model.params().n_estimators,
            "Fitting baseline forest"
        );
        self.model.fit(train)
    }

    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<usize>> {
        self.model.predict(x)
    }

    fn get_params(&self) -> Result<Vec<(String, String)>> {
        Ok(prefixed(self.model.params().to_param_list()))
    }

    fn model(&self) -> Option<&RandomForestClassifier> {
        self.model.is_fitted().then_some(&self.model)
    }
}

impl BaselineTrainer {
    /// Fitted forest.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] before fitting.
    pub fn fitted(&self) -> Result<&RandomForestClassifier> {
        self.model()
            .ok_or_else(|| Error::InvalidInput("baseline forest is not fitted".to_string()))
    }
}

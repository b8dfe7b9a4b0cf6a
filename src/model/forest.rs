//! Bagged ensemble of linfa decision trees.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use linfa::traits::{Fit, Predict};
use linfa_ensemble::RandomForest;
use linfa_trees::DecisionTree;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use super::ForestParams;
use crate::dataset::{Dataset, FeatureMatrix};
use crate::{Error, Result};

/// Random forest classifier.
///
/// Fitting is delegated to `linfa-ensemble`: each tree is grown on a
/// bootstrap sample of the training rows restricted to a random column
/// subset. Predictions count the trees' votes per class and pick the most
/// voted class (lowest label on ties).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    params: ForestParams,
    trees: Vec<DecisionTree<f64, usize>>,
    tree_columns: Vec<Vec<usize>>,
    n_classes: usize,
    feature_names: Vec<String>,
}

impl RandomForestClassifier {
    /// Create an unfitted forest.
    #[must_use]
    pub const fn new(params: ForestParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
            tree_columns: Vec::new(),
            n_classes: 0,
            feature_names: Vec::new(),
        }
    }

    /// Hyperparameters.
    #[must_use]
    pub const fn params(&self) -> &ForestParams {
        &self.params
    }

    /// Fitted trees, empty before [`fit`](Self::fit).
    #[must_use]
    pub fn trees(&self) -> &[DecisionTree<f64, usize>] {
        &self.trees
    }

    /// Feature names seen during fitting.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Whether the forest has been fitted.
    #[must_use]
    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    /// Fit the forest on a dataset, replacing any previous fit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for invalid parameters, an empty
    /// dataset or a dataset without feature columns, and [`Error::Learner`]
    /// if linfa rejects the derived ensemble parameters.
    pub fn fit(&mut self, data: &Dataset) -> Result<()> {
        self.params.validate()?;
        if data.is_empty() {
            return Err(Error::InvalidInput("cannot fit on an empty dataset".to_string()));
        }
        let x = data.features();
        if x.n_cols() == 0 {
            return Err(Error::InvalidInput("dataset has no feature columns".to_string()));
        }

        let records = to_records(x)?;
        let targets = Array1::from(data.labels().to_vec());
        let train = linfa::DatasetBase::new(records, targets)
            .with_feature_names(data.feature_names().to_vec());

        let fitted: std::result::Result<RandomForest<f64, usize>, linfa::Error> =
            self.params.ensemble(x.n_cols()).fit(&train);
        let ensemble = fitted?;

        self.trees = ensemble.models;
        self.tree_columns = ensemble.model_features;
        self.n_classes = data.labels().iter().max().map_or(1, |&m| m + 1).max(2);
        self.feature_names = data.feature_names().to_vec();
        Ok(())
    }

    /// Share of tree votes per class, one row per sample.
    ///
    /// # Errors
    ///
    /// Returns an error if the forest is unfitted or the column count differs
    /// from training.
    pub fn predict_proba(&self, x: &FeatureMatrix) -> Result<Vec<Vec<f64>>> {
        self.check_input(x)?;
        let records = to_records(x)?;
        let mut votes = vec![vec![0usize; self.n_classes]; x.n_rows()];
        for (tree, columns) in self.trees.iter().zip(&self.tree_columns) {
            let view = records.select(Axis(1), columns);
            let predicted: Array1<usize> = tree.predict(&view);
            for (row, &label) in votes.iter_mut().zip(predicted.iter()) {
                if let Some(slot) = row.get_mut(label) {
                    *slot += 1;
                }
            }
        }

        let n_trees = self.trees.len() as f64;
        Ok(votes
            .into_iter()
            .map(|row| row.into_iter().map(|v| v as f64 / n_trees).collect())
            .collect())
    }

    /// Predicted label per sample.
    ///
    /// # Errors
    ///
    /// Same conditions as [`predict_proba`](Self::predict_proba).
    pub fn predict(&self, x: &FeatureMatrix) -> Result<Vec<usize>> {
        Ok(self.predict_proba(x)?.iter().map(|p| argmax(p)).collect())
    }

    /// Accuracy on a labelled dataset.
    ///
    /// # Errors
    ///
    /// Same conditions as [`predict_proba`](Self::predict_proba), plus metric
    /// errors for an empty dataset.
    pub fn score(&self, data: &Dataset) -> Result<f64> {
        let predictions = self.predict(data.features())?;
        crate::metrics::accuracy(data.labels(), &predictions)
    }

    /// Write the fitted forest as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// Read a forest written by [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Serialize to JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    fn check_input(&self, x: &FeatureMatrix) -> Result<()> {
        if !self.is_fitted() {
            return Err(Error::InvalidInput("forest is not fitted".to_string()));
        }
        if x.n_cols() != self.feature_names.len() {
            return Err(Error::InvalidInput(format!(
                "expected {} feature columns, got {}",
                self.feature_names.len(),
                x.n_cols()
            )));
        }
        Ok(())
    }
}

fn to_records(x: &FeatureMatrix) -> Result<Array2<f64>> {
    Array2::from_shape_vec((x.n_rows(), x.n_cols()), x.values().to_vec())
        .map_err(|e| Error::InvalidInput(format!("feature matrix shape: {e}")))
}

// linfa's own vote breaks ties in hash-map order, so ties resolve here.
fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MaxFeatures;

    fn separable(n_per_class: usize) -> Dataset {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..n_per_class {
            let t = i as f64 / n_per_class as f64;
            rows.push(vec![0.1 * t, 0.9 - 0.1 * t, 0.5]);
            labels.push(0);
            rows.push(vec![0.8 + 0.1 * t, 0.2 * t, 0.5]);
            labels.push(1);
        }
        Dataset::new(
            vec!["a".into(), "b".into(), "c".into()],
            "Attrition",
            FeatureMatrix::from_rows(&rows).unwrap(),
            labels,
        )
        .unwrap()
    }

    #[test]
    fn test_fit_predict_separable() {
        let data = separable(20);
        let mut forest = RandomForestClassifier::new(
            ForestParams::default()
                .with_n_estimators(25)
                .with_max_features(MaxFeatures::All)
                .with_random_state(42),
        );
        forest.fit(&data).unwrap();
        assert_eq!(forest.trees().len(), 25);
        assert!(forest.score(&data).unwrap() > 0.95);
    }

    #[test]
    fn test_same_seed_same_forest() {
        let data = separable(10);
        let params = ForestParams::default().with_n_estimators(5).with_random_state(7);
        let mut a = RandomForestClassifier::new(params.clone());
        let mut b = RandomForestClassifier::new(params);
        a.fit(&data).unwrap();
        b.fit(&data).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_tree_columns_follow_max_features() {
        let data = separable(10);
        let mut forest = RandomForestClassifier::new(
            ForestParams::default().with_n_estimators(6).with_random_state(3),
        );
        forest.fit(&data).unwrap();
        // sqrt(3) floors to one column per tree
        assert!(forest.tree_columns.iter().all(|cols| cols.len() == 1));
    }

    #[test]
    fn test_predict_proba_rows_sum_to_one() {
        let data = separable(10);
        let mut forest = RandomForestClassifier::new(
            ForestParams::default().with_n_estimators(8).with_random_state(1),
        );
        forest.fit(&data).unwrap();
        for row in forest.predict_proba(data.features()).unwrap() {
            assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_predict_unfitted_and_wrong_width() {
        let forest = RandomForestClassifier::new(ForestParams::default());
        let x = FeatureMatrix::from_rows(&[vec![0.0, 1.0]]).unwrap();
        assert!(forest.predict(&x).is_err());

        let data = separable(5);
        let mut forest = RandomForestClassifier::new(
            ForestParams::default().with_n_estimators(2).with_random_state(0),
        );
        forest.fit(&data).unwrap();
        assert!(forest.predict(&x).is_err());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let data = separable(5);
        let mut forest = RandomForestClassifier::new(
            ForestParams::default().with_n_estimators(3).with_random_state(3),
        );
        forest.fit(&data).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        forest.save(&path).unwrap();
        let loaded = RandomForestClassifier::load(&path).unwrap();
        assert_eq!(
            loaded.predict(data.features()).unwrap(),
            forest.predict(data.features()).unwrap()
        );
    }

    #[test]
    fn test_even_vote_ties_to_lowest_label() {
        assert_eq!(argmax(&[0.5, 0.5]), 0);
        assert_eq!(argmax(&[0.2, 0.8]), 1);
    }
}

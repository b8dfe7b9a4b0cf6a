//! Random forest classifier
//!
//! Trees and bagging come from `linfa-trees` and `linfa-ensemble`; this
//! module maps the tracked hyperparameters onto them.
//!
//! ```rust
//! use attrition_ml::dataset::{Dataset, FeatureMatrix};
//! use attrition_ml::model::{ForestParams, RandomForestClassifier};
//!
//! let rows: Vec<Vec<f64>> = (0..20).map(|i| vec![f64::from(i) / 20.0]).collect();
//! let labels: Vec<usize> = (0..20).map(|i| usize::from(i >= 10)).collect();
//! let x = FeatureMatrix::from_rows(&rows)?;
//! let data = Dataset::new(vec!["Age".into()], "Attrition", x, labels)?;
//!
//! let params = ForestParams::default().with_n_estimators(15).with_random_state(42);
//! let mut forest = RandomForestClassifier::new(params);
//! forest.fit(&data)?;
//! assert!(forest.score(&data)? > 0.8);
//! # Ok::<(), attrition_ml::Error>(())
//! ```

mod forest;

pub use forest::RandomForestClassifier;

use std::fmt;

use linfa_ensemble::RandomForestParams;
use linfa_trees::{DecisionTree, SplitQuality};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Number of columns each tree is grown on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// `floor(sqrt(n_features))`, at least 1
    Sqrt,
    /// `floor(log2(n_features))`, at least 1
    Log2,
    /// Every column
    All,
    /// A fixed count, capped at `n_features`
    Count(usize),
}

impl MaxFeatures {
    /// Resolve to a concrete column count for `n_features` columns.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn resolve(self, n_features: usize) -> usize {
        let n = n_features.max(1);
        let k = match self {
            Self::Sqrt => (n as f64).sqrt().floor() as usize,
            Self::Log2 => (n as f64).log2().floor() as usize,
            Self::All => n,
            Self::Count(k) => k,
        };
        k.clamp(1, n)
    }
}

impl fmt::Display for MaxFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqrt => write!(f, "sqrt"),
            Self::Log2 => write!(f, "log2"),
            Self::All => write!(f, "None"),
            Self::Count(k) => write!(f, "{k}"),
        }
    }
}

/// Hyperparameters of a random forest.
///
/// Every tree sees a bootstrap sample of the rows, so bagging is not a
/// switch here and always renders as `bootstrap=True`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestParams {
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum tree depth, `None` for unlimited
    pub max_depth: Option<usize>,
    /// Minimum samples required to split an internal node
    pub min_samples_split: usize,
    /// Minimum samples required at a leaf
    pub min_samples_leaf: usize,
    /// Columns drawn per tree
    pub max_features: MaxFeatures,
    /// Seed, `None` draws from OS entropy
    pub random_state: Option<u64>,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            random_state: None,
        }
    }
}

impl ForestParams {
    /// Set the number of trees.
    #[must_use]
    pub const fn with_n_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    /// Set the maximum depth.
    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the minimum samples to split.
    #[must_use]
    pub const fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split;
        self
    }

    /// Set the minimum samples per leaf.
    #[must_use]
    pub const fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf;
        self
    }

    /// Set the per-tree column count.
    #[must_use]
    pub const fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set the seed.
    #[must_use]
    pub const fn with_random_state(mut self, random_state: u64) -> Self {
        self.random_state = Some(random_state);
        self
    }

    /// Check the parameters are usable.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] for zero trees, `min_samples_split < 2`
    /// or `min_samples_leaf < 1`.
    pub fn validate(&self) -> crate::Result<()> {
        if self.n_estimators == 0 {
            return Err(crate::Error::InvalidInput("n_estimators must be at least 1".to_string()));
        }
        if self.min_samples_split < 2 {
            return Err(crate::Error::InvalidInput(format!(
                "min_samples_split must be at least 2, got {}",
                self.min_samples_split
            )));
        }
        if self.min_samples_leaf == 0 {
            return Err(crate::Error::InvalidInput("min_samples_leaf must be at least 1".to_string()));
        }
        Ok(())
    }

    /// All parameters as `(name, rendered value)` pairs, sorted by name.
    ///
    /// Values render the way the tracking UI shows them: `None`, `True`,
    /// `False`, plain integers.
    #[must_use]
    pub fn to_param_list(&self) -> Vec<(String, String)> {
        vec![
            ("bootstrap".to_string(), "True".to_string()),
            ("criterion".to_string(), "gini".to_string()),
            ("max_depth".to_string(), render_option(self.max_depth)),
            ("max_features".to_string(), self.max_features.to_string()),
            ("min_samples_leaf".to_string(), self.min_samples_leaf.to_string()),
            ("min_samples_split".to_string(), self.min_samples_split.to_string()),
            ("n_estimators".to_string(), self.n_estimators.to_string()),
            ("random_state".to_string(), render_option(self.random_state)),
        ]
    }

    /// The four tuned axes only, sorted by name.
    #[must_use]
    pub fn tuned_param_list(&self) -> Vec<(String, String)> {
        vec![
            ("max_depth".to_string(), render_option(self.max_depth)),
            ("min_samples_leaf".to_string(), self.min_samples_leaf.to_string()),
            ("min_samples_split".to_string(), self.min_samples_split.to_string()),
            ("n_estimators".to_string(), self.n_estimators.to_string()),
        ]
    }

    /// linfa ensemble parameters for a dataset with `n_features` columns.
    ///
    /// Sample counts map onto linfa's unit sample weights, and the column
    /// count becomes a proportion that rounds back up to the same count.
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn ensemble(&self, n_features: usize) -> RandomForestParams<f64, usize, StdRng> {
        let tree = DecisionTree::params()
            .split_quality(SplitQuality::Gini)
            .max_depth(self.max_depth)
            .min_weight_split(self.min_samples_split as f32)
            .min_weight_leaf(self.min_samples_leaf as f32);
        let rng = match self.random_state {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let columns = self.max_features.resolve(n_features);
        RandomForestParams::new_fixed_rng(tree, rng)
            .ensemble_size(self.n_estimators)
            .bootstrap_proportion(1.0)
            .feature_proportion((columns as f64 - 0.5) / n_features.max(1) as f64)
    }
}

fn render_option<T: fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "None".to_string(), |v| v.to_string())
}

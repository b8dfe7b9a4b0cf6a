//! Stratified K-fold cross-validator

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::{Error, Result};

/// Row indices of one train/validation fold, both ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    /// Rows used for fitting
    pub train: Vec<usize>,
    /// Rows used for scoring
    pub test: Vec<usize>,
}

/// Stratified K-fold cross-validator.
///
/// Every fold keeps the class proportions of the full label vector as closely
/// as integer counts allow. Fold sizes per class come from dealing the
/// label-sorted rows round-robin across folds; with shuffling enabled, which
/// rows of a class land in which fold is randomized.
///
/// # Example
///
/// ```rust
/// use attrition_ml::model_selection::StratifiedKFold;
///
/// let labels = [0, 0, 0, 0, 1, 1, 1, 1, 1, 1];
/// let cv = StratifiedKFold::new(2).with_random_state(42);
/// for fold in cv.split(&labels)? {
///     assert_eq!(fold.test.len(), 5);
/// }
/// # Ok::<(), attrition_ml::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StratifiedKFold {
    n_splits: usize,
    shuffle: bool,
    random_state: Option<u64>,
}

impl StratifiedKFold {
    /// Create a cross-validator with `n_splits` folds, no shuffling.
    #[must_use]
    pub const fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            shuffle: false,
            random_state: None,
        }
    }

    /// Enable or disable shuffling within each class.
    #[must_use]
    pub const fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Seed the shuffle. Implies shuffling.
    #[must_use]
    pub const fn with_random_state(mut self, random_state: u64) -> Self {
        self.random_state = Some(random_state);
        self.shuffle = true;
        self
    }

    /// Number of folds.
    #[must_use]
    pub const fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Generate the folds for a label vector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `n_splits < 2`, there are fewer rows
    /// than folds, or every class has fewer members than folds.
    pub fn split(&self, labels: &[usize]) -> Result<Vec<Fold>> {
        let k = self.n_splits;
        if k < 2 {
            return Err(Error::InvalidInput(format!(
                "n_splits must be at least 2, got {k}"
            )));
        }
        if labels.len() < k {
            return Err(Error::InvalidInput(format!(
                "cannot make {k} folds from {} rows",
                labels.len()
            )));
        }

        let n_classes = labels.iter().max().map_or(0, |&m| m + 1);
        let mut class_counts = vec![0usize; n_classes];
        for &label in labels {
            class_counts[label] += 1;
        }
        let present: Vec<usize> = class_counts.iter().copied().filter(|&c| c > 0).collect();
        if present.iter().all(|&c| c < k) {
            return Err(Error::InvalidInput(format!(
                "n_splits={k} cannot be greater than the number of members in each class"
            )));
        }
        if let Some(&smallest) = present.iter().min() {
            if smallest < k {
                tracing::warn!(
                    smallest_class = smallest,
                    n_splits = k,
                    "The least populated class has fewer members than n_splits"
                );
            }
        }

        // allocation[f][c]: members of class c in fold f, from dealing sorted labels
        let mut allocation = vec![vec![0usize; n_classes]; k];
        let mut position = 0usize;
        for (class, &count) in class_counts.iter().enumerate() {
            for _ in 0..count {
                allocation[position % k][class] += 1;
                position += 1;
            }
        }

        let mut rng = match (self.shuffle, self.random_state) {
            (true, Some(seed)) => Some(StdRng::seed_from_u64(seed)),
            (true, None) => Some(StdRng::from_entropy()),
            (false, _) => None,
        };

        let mut test_fold = vec![0usize; labels.len()];
        for class in 0..n_classes {
            let mut fold_ids: Vec<usize> = (0..k)
                .flat_map(|fold| std::iter::repeat(fold).take(allocation[fold][class]))
                .collect();
            if let Some(rng) = rng.as_mut() {
                fold_ids.shuffle(rng);
            }
            let members = labels
                .iter()
                .enumerate()
                .filter(|&(_, &label)| label == class)
                .map(|(idx, _)| idx);
            for (idx, fold) in members.zip(fold_ids) {
                test_fold[idx] = fold;
            }
        }

        Ok((0..k)
            .map(|fold| {
                let (test, train): (Vec<usize>, Vec<usize>) =
                    (0..labels.len()).partition(|&idx| test_fold[idx] == fold);
                Fold { train, test }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folds_cover_every_row_once() {
        let labels: Vec<usize> = (0..23).map(|i| usize::from(i % 3 == 0)).collect();
        let folds = StratifiedKFold::new(5).with_random_state(42).split(&labels).unwrap();
        assert_eq!(folds.len(), 5);
        let mut seen = vec![0; labels.len()];
        for fold in &folds {
            for &idx in &fold.test {
                seen[idx] += 1;
            }
            assert_eq!(fold.train.len() + fold.test.len(), labels.len());
        }
        assert!(seen.iter().all(|&c| c == 1));
    }

    #[test]
    fn test_folds_are_stratified() {
        let labels: Vec<usize> = (0..50).map(|i| usize::from(i < 10)).collect();
        let folds = StratifiedKFold::new(5).with_random_state(42).split(&labels).unwrap();
        for fold in folds {
            let positives = fold.test.iter().filter(|&&i| labels[i] == 1).count();
            assert_eq!(positives, 2);
            assert_eq!(fold.test.len(), 10);
        }
    }

    #[test]
    fn test_unshuffled_is_deterministic() {
        let labels = [0, 1, 0, 1, 0, 1];
        let a = StratifiedKFold::new(3).split(&labels).unwrap();
        let b = StratifiedKFold::new(3).split(&labels).unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].test, vec![0, 1]);
    }

    #[test]
    fn test_rejects_too_many_splits() {
        assert!(StratifiedKFold::new(1).split(&[0, 1]).is_err());
        assert!(StratifiedKFold::new(3).split(&[0, 1]).is_err());
        assert!(StratifiedKFold::new(3).split(&[0, 0, 1, 1]).is_err());
    }
}

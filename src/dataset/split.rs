//! Stratified train/test split

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::Dataset;
use crate::{Error, Result};

/// Train and test partitions of one dataset.
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    /// Training rows
    pub train: Dataset,
    /// Held-out rows
    pub test: Dataset,
}

/// Split a dataset into train and test partitions, stratified by label.
///
/// The test partition gets `ceil(n * test_size)` rows. Each class contributes
/// `floor(n_class * test_size)` rows, and the remaining test slots go to the
/// classes with the largest fractional remainder (ties to the larger class,
/// then the lower label). Row order within each partition is shuffled. The
/// same seed always yields the same partition.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if `test_size` is outside (0, 1) or either
/// partition would be empty.
pub fn train_test_split(data: &Dataset, test_size: f64, random_state: u64) -> Result<TrainTestSplit> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(Error::InvalidInput(format!(
            "test_size must be in (0, 1), got {test_size}"
        )));
    }

    let n = data.len();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let n_test = (n as f64 * test_size).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(Error::InvalidInput(format!(
            "cannot split {n} rows with test_size {test_size}: one partition would be empty"
        )));
    }

    let mut rng = StdRng::seed_from_u64(random_state);
    let mut by_class: [Vec<usize>; 2] = [Vec::new(), Vec::new()];
    for (idx, &label) in data.labels().iter().enumerate() {
        by_class[label].push(idx);
    }
    for members in &mut by_class {
        members.shuffle(&mut rng);
    }

    let allocation = allocate_test_rows(&[by_class[0].len(), by_class[1].len()], n_test, test_size);

    let mut train_idx = Vec::with_capacity(n - n_test);
    let mut test_idx = Vec::with_capacity(n_test);
    for (members, take) in by_class.iter().zip(allocation) {
        test_idx.extend_from_slice(&members[..take]);
        train_idx.extend_from_slice(&members[take..]);
    }
    train_idx.shuffle(&mut rng);
    test_idx.shuffle(&mut rng);

    tracing::debug!(
        train = train_idx.len(),
        test = test_idx.len(),
        "Stratified split"
    );

    Ok(TrainTestSplit {
        train: data.subset(&train_idx),
        test: data.subset(&test_idx),
    })
}

/// Per-class test row counts summing to `n_test`.
fn allocate_test_rows(class_counts: &[usize], n_test: usize, test_size: f64) -> Vec<usize> {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let mut alloc: Vec<usize> = class_counts
        .iter()
        .map(|&count| (count as f64 * test_size).floor() as usize)
        .collect();

    let mut order: Vec<usize> = (0..class_counts.len()).collect();
    order.sort_by(|&a, &b| {
        let rem_a = class_counts[a] as f64 * test_size - alloc[a] as f64;
        let rem_b = class_counts[b] as f64 * test_size - alloc[b] as f64;
        rem_b
            .total_cmp(&rem_a)
            .then(class_counts[b].cmp(&class_counts[a]))
            .then(a.cmp(&b))
    });

    let mut remaining = n_test.saturating_sub(alloc.iter().sum());
    while remaining > 0 {
        let before = remaining;
        for &class in &order {
            if remaining == 0 {
                break;
            }
            if alloc[class] < class_counts[class] {
                alloc[class] += 1;
                remaining -= 1;
            }
        }
        if before == remaining {
            break;
        }
    }
    alloc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::FeatureMatrix;

    fn balanced(n_pos: usize, n_neg: usize) -> Dataset {
        let n = n_pos + n_neg;
        let rows: Vec<Vec<f64>> = (0..n).map(|i| vec![i as f64]).collect();
        let labels = (0..n).map(|i| usize::from(i < n_pos)).collect();
        Dataset::new(
            vec!["x".into()],
            "Attrition",
            FeatureMatrix::from_rows(&rows).unwrap(),
            labels,
        )
        .unwrap()
    }

    #[test]
    fn test_split_sizes_and_stratification() {
        let ds = balanced(10, 10);
        let split = train_test_split(&ds, 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 4);
        assert_eq!(split.train.len(), 16);
        assert_eq!(split.test.class_counts(), [2, 2]);
    }

    #[test]
    fn test_split_is_deterministic() {
        let ds = balanced(16, 84);
        let a = train_test_split(&ds, 0.2, 42).unwrap();
        let b = train_test_split(&ds, 0.2, 42).unwrap();
        assert_eq!(a.test.features(), b.test.features());
        let c = train_test_split(&ds, 0.2, 7).unwrap();
        assert_ne!(a.test.features(), c.test.features());
    }

    #[test]
    fn test_split_imbalanced_proportion() {
        let ds = balanced(16, 84);
        let split = train_test_split(&ds, 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 20);
        assert_eq!(split.test.class_counts()[1], 3);
    }

    #[test]
    fn test_split_rejects_degenerate_sizes() {
        let ds = balanced(1, 1);
        assert!(train_test_split(&ds, 0.0, 42).is_err());
        assert!(train_test_split(&ds, 0.99, 42).is_err());
    }

    #[test]
    fn test_allocate_rounds_toward_larger_remainder() {
        assert_eq!(allocate_test_rows(&[84, 16], 20, 0.2), vec![17, 3]);
        assert_eq!(allocate_test_rows(&[5, 5], 2, 0.2), vec![1, 1]);
    }
}

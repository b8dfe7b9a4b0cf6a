//! Binary classification metrics.
//!
//! Label `1` is the positive class. Ratios with a zero denominator evaluate to
//! `0.0` instead of failing, so a model that never predicts attrition still
//! produces a complete report. linfa's `ConfusionMatrix` yields NaN in that
//! case and ranks the positive class by label order, so counting stays here.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Label treated as the positive class.
pub const POSITIVE_LABEL: usize = 1;

/// Confusion counts for the positive class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    /// Predicted positive, actually positive
    pub true_positive: usize,
    /// Predicted positive, actually negative
    pub false_positive: usize,
    /// Predicted negative, actually negative
    pub true_negative: usize,
    /// Predicted negative, actually positive
    pub false_negative: usize,
}

impl ConfusionCounts {
    /// Count outcomes for aligned truth/prediction slices.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Metric`] if the slices are empty or differ in length.
    pub fn from_labels(y_true: &[usize], y_pred: &[usize]) -> Result<Self> {
        check_inputs(y_true, y_pred)?;
        let mut counts = Self::default();
        for (&truth, &pred) in y_true.iter().zip(y_pred) {
            match (truth == POSITIVE_LABEL, pred == POSITIVE_LABEL) {
                (true, true) => counts.true_positive += 1,
                (false, true) => counts.false_positive += 1,
                (false, false) => counts.true_negative += 1,
                (true, false) => counts.false_negative += 1,
            }
        }
        Ok(counts)
    }

    /// Total number of samples counted.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.true_negative + self.false_negative
    }
}

/// The four held-out scores logged for every run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    /// Fraction of correct predictions
    pub accuracy: f64,
    /// TP / (TP + FP)
    pub precision: f64,
    /// TP / (TP + FN)
    pub recall: f64,
    /// Harmonic mean of precision and recall
    pub f1: f64,
}

impl ClassificationReport {
    /// Score predictions against the truth.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Metric`] if the slices are empty or differ in length.
    pub fn evaluate(y_true: &[usize], y_pred: &[usize]) -> Result<Self> {
        let counts = ConfusionCounts::from_labels(y_true, y_pred)?;
        Ok(Self::from_counts(&counts))
    }

    /// Derive the scores from confusion counts.
    #[must_use]
    pub fn from_counts(counts: &ConfusionCounts) -> Self {
        let tp = counts.true_positive;
        let accuracy = ratio(tp + counts.true_negative, counts.total());
        let precision = ratio(tp, tp + counts.false_positive);
        let recall = ratio(tp, tp + counts.false_negative);
        let f1 = ratio(2 * tp, 2 * tp + counts.false_positive + counts.false_negative);
        Self {
            accuracy,
            precision,
            recall,
            f1,
        }
    }

    /// Metric keys and values in logging order.
    #[must_use]
    pub fn as_metrics(&self) -> [(&'static str, f64); 4] {
        [
            ("test accuracy", self.accuracy),
            ("test precision", self.precision),
            ("test recall", self.recall),
            ("test f1-score", self.f1),
        ]
    }
}

/// Fraction of predictions equal to the truth.
///
/// # Errors
///
/// Returns [`Error::Metric`] if the slices are empty or differ in length.
pub fn accuracy(y_true: &[usize], y_pred: &[usize]) -> Result<f64> {
    check_inputs(y_true, y_pred)?;
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    Ok(ratio(correct, y_true.len()))
}

/// Positive-class precision, `0.0` when nothing is predicted positive.
///
/// # Errors
///
/// Returns [`Error::Metric`] if the slices are empty or differ in length.
pub fn precision(y_true: &[usize], y_pred: &[usize]) -> Result<f64> {
    ClassificationReport::evaluate(y_true, y_pred).map(|r| r.precision)
}

/// Positive-class recall, `0.0` when no sample is actually positive.
///
/// # Errors
///
/// Returns [`Error::Metric`] if the slices are empty or differ in length.
pub fn recall(y_true: &[usize], y_pred: &[usize]) -> Result<f64> {
    ClassificationReport::evaluate(y_true, y_pred).map(|r| r.recall)
}

/// Positive-class F1, `0.0` when precision and recall are both undefined.
///
/// # Errors
///
/// Returns [`Error::Metric`] if the slices are empty or differ in length.
pub fn f1_score(y_true: &[usize], y_pred: &[usize]) -> Result<f64> {
    ClassificationReport::evaluate(y_true, y_pred).map(|r| r.f1)
}

fn check_inputs(y_true: &[usize], y_pred: &[usize]) -> Result<()> {
    if y_true.len() != y_pred.len() {
        return Err(Error::Metric(format!(
            "y_true has {} labels but y_pred has {}",
            y_true.len(),
            y_pred.len()
        )));
    }
    if y_true.is_empty() {
        return Err(Error::Metric("cannot score an empty prediction set".to_string()));
    }
    Ok(())
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_known_values() {
        let y_true = [1, 1, 1, 0, 0, 0];
        let y_pred = [1, 1, 0, 1, 0, 0];
        let report = ClassificationReport::evaluate(&y_true, &y_pred).unwrap();
        assert!((report.accuracy - 4.0 / 6.0).abs() < 1e-12);
        assert!((report.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((report.recall - 2.0 / 3.0).abs() < 1e-12);
        assert!((report.f1 - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_division_yields_zero() {
        // nothing predicted positive, nothing actually positive
        let report = ClassificationReport::evaluate(&[0, 0, 0], &[0, 0, 0]).unwrap();
        assert!((report.accuracy - 1.0).abs() < f64::EPSILON);
        assert!(report.precision.abs() < f64::EPSILON);
        assert!(report.recall.abs() < f64::EPSILON);
        assert!(report.f1.abs() < f64::EPSILON);
    }

    #[test]
    fn test_no_positive_predictions() {
        assert!(precision(&[1, 0], &[0, 0]).unwrap().abs() < f64::EPSILON);
        assert!(recall(&[1, 0], &[0, 0]).unwrap().abs() < f64::EPSILON);
        assert!(f1_score(&[1, 0], &[0, 0]).unwrap().abs() < f64::EPSILON);
    }

    #[test]
    fn test_length_mismatch_and_empty() {
        assert!(matches!(accuracy(&[1], &[1, 0]), Err(Error::Metric(_))));
        assert!(matches!(accuracy(&[], &[]), Err(Error::Metric(_))));
    }

    #[test]
    fn test_metric_keys() {
        let report = ClassificationReport::evaluate(&[1], &[1]).unwrap();
        let keys: Vec<&str> = report.as_metrics().iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, ["test accuracy", "test precision", "test recall", "test f1-score"]);
    }
}

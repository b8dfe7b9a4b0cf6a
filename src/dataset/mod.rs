//! Tabular dataset loading
//!
//! A [`Dataset`] is a dense row-major feature matrix plus one binary label per
//! row. It is loaded once per run and never mutated; splits and folds produce
//! new datasets by copying the selected rows.

mod split;

pub use split::{train_test_split, TrainTestSplit};

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Dense row-major matrix of feature values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    n_rows: usize,
    n_cols: usize,
    values: Vec<f64>,
}

impl FeatureMatrix {
    /// Build a matrix from row-major values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `values.len() != n_rows * n_cols`.
    pub fn from_vec(n_rows: usize, n_cols: usize, values: Vec<f64>) -> Result<Self> {
        if values.len() != n_rows * n_cols {
            return Err(Error::InvalidInput(format!(
                "matrix of {n_rows}x{n_cols} needs {} values, got {}",
                n_rows * n_cols,
                values.len()
            )));
        }
        Ok(Self {
            n_rows,
            n_cols,
            values,
        })
    }

    /// Build a matrix from rows of equal length.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] on ragged rows.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let n_cols = rows.first().map_or(0, Vec::len);
        let mut values = Vec::with_capacity(rows.len() * n_cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n_cols {
                return Err(Error::InvalidInput(format!(
                    "row {i} has {} values, expected {n_cols}",
                    row.len()
                )));
            }
            values.extend_from_slice(row);
        }
        Self::from_vec(rows.len(), n_cols, values)
    }

    /// Number of rows.
    #[must_use]
    pub const fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of columns.
    #[must_use]
    pub const fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// Value at `(row, col)`.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.n_cols + col]
    }

    /// All values, row-major.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// One row as a slice.
    #[must_use]
    pub fn row(&self, row: usize) -> &[f64] {
        let start = row * self.n_cols;
        &self.values[start..start + self.n_cols]
    }

    /// Copy the given rows, in order, into a new matrix.
    #[must_use]
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        let mut values = Vec::with_capacity(indices.len() * self.n_cols);
        for &idx in indices {
            values.extend_from_slice(self.row(idx));
        }
        Self {
            n_rows: indices.len(),
            n_cols: self.n_cols,
            values,
        }
    }

    /// Iterate over the values of one column.
    pub fn column(&self, col: usize) -> impl Iterator<Item = f64> + '_ {
        (0..self.n_rows).map(move |row| self.get(row, col))
    }
}

/// Feature matrix with named columns and a binary label per row.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    feature_names: Vec<String>,
    label_name: String,
    features: FeatureMatrix,
    labels: Vec<usize>,
}

impl Dataset {
    /// Assemble a dataset from parts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the label count or the feature name
    /// count disagree with the matrix shape, or a label is not 0 or 1.
    pub fn new(
        feature_names: Vec<String>,
        label_name: impl Into<String>,
        features: FeatureMatrix,
        labels: Vec<usize>,
    ) -> Result<Self> {
        if feature_names.len() != features.n_cols() {
            return Err(Error::InvalidInput(format!(
                "{} feature names for {} columns",
                feature_names.len(),
                features.n_cols()
            )));
        }
        if labels.len() != features.n_rows() {
            return Err(Error::InvalidInput(format!(
                "{} labels for {} rows",
                labels.len(),
                features.n_rows()
            )));
        }
        if let Some(bad) = labels.iter().find(|&&label| label > 1) {
            return Err(Error::InvalidInput(format!(
                "label {bad} is not binary (expected 0 or 1)"
            )));
        }
        Ok(Self {
            feature_names,
            label_name: label_name.into(),
            features,
            labels,
        })
    }

    /// Load a CSV file with a header row.
    ///
    /// Every column other than `label_column` becomes a feature and must be
    /// numeric. Labels accept `0`/`1` (also as `0.0`/`1.0`), `Yes`/`No` and
    /// `True`/`False`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the label column is
    /// missing, a cell is not numeric, or the file has no data rows.
    pub fn from_csv<P: AsRef<Path>>(path: P, label_column: &str) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let label_idx = headers
            .iter()
            .position(|h| h == label_column)
            .ok_or_else(|| Error::MissingColumn {
                column: label_column.to_string(),
                available: headers.clone(),
            })?;

        let feature_names: Vec<String> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != label_idx)
            .map(|(_, name)| name.clone())
            .collect();

        let mut values = Vec::new();
        let mut labels = Vec::new();
        for (row_idx, record) in reader.records().enumerate() {
            let record = record?;
            let line = row_idx + 2;
            for (col_idx, cell) in record.iter().enumerate() {
                if col_idx == label_idx {
                    labels.push(parse_label(cell, line, label_column)?);
                } else {
                    values.push(parse_number(cell, line, &headers[col_idx])?);
                }
            }
        }

        if labels.is_empty() {
            return Err(Error::InvalidInput(format!(
                "{} has a header but no data rows",
                path.display()
            )));
        }

        let features = FeatureMatrix::from_vec(labels.len(), feature_names.len(), values)?;
        tracing::info!(
            path = %path.display(),
            rows = labels.len(),
            features = feature_names.len(),
            "Loaded dataset"
        );
        Self::new(feature_names, label_column, features, labels)
    }

    /// Feature column names.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Label column name.
    #[must_use]
    pub fn label_name(&self) -> &str {
        &self.label_name
    }

    /// Feature matrix.
    #[must_use]
    pub const fn features(&self) -> &FeatureMatrix {
        &self.features
    }

    /// Labels, one per row.
    #[must_use]
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Number of rows.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.features.n_rows()
    }

    /// Whether the dataset has no rows.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.features.n_rows() == 0
    }

    /// Row count per class, indexed by label.
    #[must_use]
    pub fn class_counts(&self) -> [usize; 2] {
        let mut counts = [0; 2];
        for &label in &self.labels {
            counts[label] += 1;
        }
        counts
    }

    /// Fraction of rows with label 1.
    #[must_use]
    pub fn positive_rate(&self) -> f64 {
        if self.labels.is_empty() {
            return 0.0;
        }
        self.class_counts()[1] as f64 / self.labels.len() as f64
    }

    /// Copy the given rows into a new dataset with the same columns.
    #[must_use]
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            feature_names: self.feature_names.clone(),
            label_name: self.label_name.clone(),
            features: self.features.select_rows(indices),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }

    /// Whether every value in a feature column is a whole number.
    #[must_use]
    pub fn is_integral_column(&self, col: usize) -> bool {
        self.features
            .column(col)
            .all(|v| v.is_finite() && v.fract() == 0.0)
    }
}

fn parse_number(cell: &str, line: usize, column: &str) -> Result<f64> {
    cell.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| Error::Parse {
            line,
            column: column.to_string(),
            value: cell.to_string(),
        })
}

fn parse_label(cell: &str, line: usize, column: &str) -> Result<usize> {
    let parsed = match cell.to_ascii_lowercase().as_str() {
        "yes" | "true" => Some(1),
        "no" | "false" => Some(0),
        other => match other.parse::<f64>() {
            Ok(v) if v == 0.0 => Some(0),
            Ok(v) if v == 1.0 => Some(1),
            _ => None,
        },
    };
    parsed.ok_or_else(|| Error::Parse {
        line,
        column: column.to_string(),
        value: cell.to_string(),
    })
}

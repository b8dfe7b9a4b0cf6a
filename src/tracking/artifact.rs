//! Model artifact: the files logged for a fitted forest

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::dataset::Dataset;
use crate::model::RandomForestClassifier;
use crate::{Error, Result};

/// Descriptor file name inside an artifact directory.
pub const MLMODEL_FILE: &str = "MLmodel";
/// Serialized forest.
pub const MODEL_FILE: &str = "model.json";
/// One training row in split orient.
pub const INPUT_EXAMPLE_FILE: &str = "input_example.json";

const FLAVOR: &str = "attrition_ml";

/// Scalar column type in a model signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// 64-bit integer
    Long,
    /// 64-bit float
    Double,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => f.write_str("long"),
            Self::Double => f.write_str("double"),
        }
    }
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name
    pub name: String,
    /// Column type
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

/// Input and output schema of a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSignature {
    /// Feature columns, in training order
    pub inputs: Vec<ColumnSpec>,
    /// Prediction columns
    pub outputs: Vec<ColumnSpec>,
}

impl ModelSignature {
    /// Infer the signature from a training set.
    ///
    /// A feature is `long` when every training value is a whole number,
    /// `double` otherwise. The label is always `long`.
    #[must_use]
    pub fn infer(train: &Dataset) -> Self {
        let inputs = train
            .feature_names()
            .iter()
            .enumerate()
            .map(|(col, name)| ColumnSpec {
                name: name.clone(),
                column_type: if train.is_integral_column(col) {
                    ColumnType::Long
                } else {
                    ColumnType::Double
                },
            })
            .collect();
        let outputs = vec![ColumnSpec {
            name: train.label_name().to_string(),
            column_type: ColumnType::Long,
        }];
        Self { inputs, outputs }
    }
}

/// One file of an artifact, path relative to the artifact directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactFile {
    /// Relative path, `/`-separated
    pub path: String,
    /// File content
    pub bytes: Vec<u8>,
}

/// Files logged for a fitted model under one artifact path.
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    artifact_path: String,
    signature: ModelSignature,
    files: Vec<ArtifactFile>,
}

impl ModelArtifact {
    /// Package a fitted forest.
    ///
    /// The signature and the input example come from `train`.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is not fitted, `train` is empty, or
    /// serialization fails.
    pub fn from_forest(
        artifact_path: impl Into<String>,
        model: &RandomForestClassifier,
        train: &Dataset,
    ) -> Result<Self> {
        let artifact_path = artifact_path.into();
        if !model.is_fitted() {
            return Err(Error::InvalidInput(
                "cannot package an unfitted model".to_string(),
            ));
        }
        if train.is_empty() {
            return Err(Error::InvalidInput(
                "input example needs at least one training row".to_string(),
            ));
        }

        let signature = ModelSignature::infer(train);
        let example = input_example(train, &signature);
        let descriptor = mlmodel_descriptor(&artifact_path, &signature)?;

        let files = vec![
            ArtifactFile {
                path: MLMODEL_FILE.to_string(),
                bytes: serde_json::to_vec_pretty(&descriptor)?,
            },
            ArtifactFile {
                path: MODEL_FILE.to_string(),
                bytes: model.to_json_bytes()?,
            },
            ArtifactFile {
                path: INPUT_EXAMPLE_FILE.to_string(),
                bytes: serde_json::to_vec(&example)?,
            },
        ];
        Ok(Self {
            artifact_path,
            signature,
            files,
        })
    }

    /// Directory under the run's artifact root.
    #[must_use]
    pub fn artifact_path(&self) -> &str {
        &self.artifact_path
    }

    /// Inferred signature.
    #[must_use]
    pub const fn signature(&self) -> &ModelSignature {
        &self.signature
    }

    /// Files to upload.
    #[must_use]
    pub fn files(&self) -> &[ArtifactFile] {
        &self.files
    }

    /// Path of `file` relative to the run's artifact root.
    #[must_use]
    pub fn key_for(&self, file: &ArtifactFile) -> String {
        format!("{}/{}", self.artifact_path.trim_matches('/'), file.path)
    }
}

/// First training row, split orient, integral columns rendered as integers.
fn input_example(train: &Dataset, signature: &ModelSignature) -> serde_json::Value {
    let row: Vec<serde_json::Value> = train
        .features()
        .row(0)
        .iter()
        .zip(&signature.inputs)
        .map(|(&value, spec)| match spec.column_type {
            #[allow(clippy::cast_possible_truncation)]
            ColumnType::Long => json!(value as i64),
            ColumnType::Double => json!(value),
        })
        .collect();
    json!({
        "columns": train.feature_names(),
        "data": [row],
    })
}

/// Signature columns are stored as JSON strings, as the tracking server expects.
fn mlmodel_descriptor(artifact_path: &str, signature: &ModelSignature) -> Result<serde_json::Value> {
    Ok(json!({
        "artifact_path": artifact_path,
        "flavors": {
            FLAVOR: {
                "model_file": MODEL_FILE,
                "serialization_format": "json",
                "crate_version": env!("CARGO_PKG_VERSION"),
            },
        },
        "signature": {
            "inputs": serde_json::to_string(&signature.inputs)?,
            "outputs": serde_json::to_string(&signature.outputs)?,
        },
        "saved_input_example_info": {
            "artifact_path": INPUT_EXAMPLE_FILE,
            "type": "dataframe",
            "pandas_orient": "split",
        },
        "utc_time_created": Utc::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::FeatureMatrix;
    use crate::model::ForestParams;

    fn fitted() -> (RandomForestClassifier, Dataset) {
        let rows = vec![
            vec![1.0, 0.5],
            vec![2.0, 1.5],
            vec![8.0, 7.25],
            vec![9.0, 8.5],
        ];
        let data = Dataset::new(
            vec!["Age".into(), "DailyRate".into()],
            "Attrition",
            FeatureMatrix::from_rows(&rows).unwrap(),
            vec![0, 0, 1, 1],
        )
        .unwrap();
        let mut model = RandomForestClassifier::new(
            ForestParams::default().with_n_estimators(3).with_random_state(1),
        );
        model.fit(&data).unwrap();
        (model, data)
    }

    #[test]
    fn test_signature_infers_long_and_double() {
        let (_, data) = fitted();
        let signature = ModelSignature::infer(&data);
        assert_eq!(signature.inputs[0].column_type, ColumnType::Long);
        assert_eq!(signature.inputs[1].column_type, ColumnType::Double);
        assert_eq!(signature.outputs[0].name, "Attrition");
        assert_eq!(signature.outputs[0].column_type, ColumnType::Long);
    }

    #[test]
    fn test_artifact_files() {
        let (model, data) = fitted();
        let artifact = ModelArtifact::from_forest("model", &model, &data).unwrap();
        let paths: Vec<&str> = artifact.files().iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec![MLMODEL_FILE, MODEL_FILE, INPUT_EXAMPLE_FILE]);
        assert_eq!(artifact.key_for(&artifact.files()[1]), "model/model.json");

        let restored: RandomForestClassifier =
            serde_json::from_slice(&artifact.files()[1].bytes).unwrap();
        assert_eq!(restored, model);

        let example: serde_json::Value = serde_json::from_slice(&artifact.files()[2].bytes).unwrap();
        assert_eq!(example["columns"][0], "Age");
        assert_eq!(example["data"][0][0], 1);
    }

    #[test]
    fn test_unfitted_model_rejected() {
        let (_, data) = fitted();
        let model = RandomForestClassifier::new(ForestParams::default());
        assert!(ModelArtifact::from_forest("model", &model, &data).is_err());
    }
}

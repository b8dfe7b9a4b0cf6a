//! Model Version - an entry in the model registry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One registered version of a named model.
///
/// `source` points at the run artifact the version was created from, in the
/// `runs:/<run_id>/<artifact_path>` form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelVersion {
    name: String,
    version: String,
    run_id: String,
    source: String,
    created_at: DateTime<Utc>,
}

impl ModelVersion {
    /// Create a model version for `run_id`'s artifact at `artifact_path`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        run_id: impl Into<String>,
        artifact_path: &str,
    ) -> Self {
        let run_id = run_id.into();
        let source = runs_uri(&run_id, artifact_path);
        Self {
            name: name.into(),
            version: version.into(),
            run_id,
            source,
            created_at: Utc::now(),
        }
    }

    /// Registered model name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Version assigned by the registry, `"1"` for the first.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Run the version was created from.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Artifact source URI.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Registration timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// `runs:/<run_id>/<artifact_path>`
#[must_use]
pub fn runs_uri(run_id: &str, artifact_path: &str) -> String {
    format!("runs:/{run_id}/{}", artifact_path.trim_matches('/'))
}

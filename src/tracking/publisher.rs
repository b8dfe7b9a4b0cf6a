//! Model publication policy

use super::{ModelArtifact, TrackingBackend};
use crate::config::TrackingUri;
use crate::experiment::{ArtifactRecord, ModelVersion};
use crate::Result;

/// How a fitted model leaves the pipeline.
pub trait ModelPublisher {
    /// Log `artifact` to `run_id`, and register it when the policy says so.
    ///
    /// Returns the stored files and the registered version, if any.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    fn publish(
        &self,
        backend: &mut dyn TrackingBackend,
        run_id: &str,
        artifact: &ModelArtifact,
    ) -> Result<(Vec<ArtifactRecord>, Option<ModelVersion>)>;
}

/// Log the artifact and register it as a new version of `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterModel {
    name: String,
}

impl RegisterModel {
    /// Register under `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Registered model name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl ModelPublisher for RegisterModel {
    fn publish(
        &self,
        backend: &mut dyn TrackingBackend,
        run_id: &str,
        artifact: &ModelArtifact,
    ) -> Result<(Vec<ArtifactRecord>, Option<ModelVersion>)> {
        let records = backend.log_artifact(run_id, artifact)?;
        let version = backend.register_model(&self.name, run_id, artifact.artifact_path())?;
        tracing::info!(
            name = version.name(),
            version = version.version(),
            "Registered model version"
        );
        Ok((records, Some(version)))
    }
}

/// Log the artifact only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogOnly;

impl ModelPublisher for LogOnly {
    fn publish(
        &self,
        backend: &mut dyn TrackingBackend,
        run_id: &str,
        artifact: &ModelArtifact,
    ) -> Result<(Vec<ArtifactRecord>, Option<ModelVersion>)> {
        Ok((backend.log_artifact(run_id, artifact)?, None))
    }
}

/// Registration policy for a tracking URI: any scheme other than `file`
/// registers under `registered_name`.
#[must_use]
pub fn publisher_for(uri: &TrackingUri, registered_name: &str) -> Box<dyn ModelPublisher> {
    if uri.scheme() == "file" {
        Box::new(LogOnly)
    } else {
        Box::new(RegisterModel::new(registered_name))
    }
}

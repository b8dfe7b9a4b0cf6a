//! Artifact Record - one file logged under a run's artifact root

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One logged artifact file, the tracking server's `FileInfo` plus the owning
/// run and a content digest.
///
/// `path` is relative to the run's artifact root and `/`-separated, e.g.
/// `model/MLmodel`. Leading slashes are dropped so the path never escapes
/// the root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactRecord {
    run_id: String,
    path: String,
    file_size: u64,
    sha256: String,
}

impl ArtifactRecord {
    /// Record for `bytes` stored at `path` under the run's artifact root.
    #[must_use]
    pub fn new(run_id: impl Into<String>, path: &str, bytes: &[u8]) -> Self {
        Self {
            run_id: run_id.into(),
            path: path.trim_start_matches('/').to_string(),
            file_size: bytes.len() as u64,
            sha256: format!("{:x}", Sha256::digest(bytes)),
        }
    }

    /// Run the file belongs to.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Path relative to the run's artifact root.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Size in bytes.
    #[must_use]
    pub const fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Lowercase hex SHA-256 of the content.
    #[must_use]
    pub fn sha256(&self) -> &str {
        &self.sha256
    }
}

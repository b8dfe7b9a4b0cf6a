//! Run configuration
//!
//! Every entry point takes an explicit configuration value. Environment
//! variables are only read by the `from_env` constructors, which the binaries
//! call once at startup; nothing here writes to the process environment.

use std::path::{Path, PathBuf};

use url::Url;

use crate::{Error, Result};

/// Default remote tracking server.
pub const DEFAULT_TRACKING_URI: &str = "https://dagshub.com/rahmantaufik27/mlflow-sml-rtaufik27.mlflow";

/// Experiment every training run is filed under.
pub const DEFAULT_EXPERIMENT_NAME: &str = "attrition_prediction";

/// Pre-processed dataset, relative to the working directory.
pub const DEFAULT_DATASET_PATH: &str = "employee_preprocessing.csv";

/// Binary label column.
pub const DEFAULT_LABEL_COLUMN: &str = "Attrition";

/// Fraction of rows held out for evaluation.
pub const DEFAULT_TEST_SIZE: f64 = 0.2;

/// Seed for the split, the CV folds and the tuned forest.
pub const DEFAULT_RANDOM_STATE: u64 = 42;

/// Username/token pair for a remote tracking server.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account name
    pub username: String,
    /// Access token or password
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Create a credential pair.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Read credentials from `MLFLOW_TRACKING_USERNAME` / `MLFLOW_TRACKING_PASSWORD`,
    /// falling back to `USERNAME` / `TOKEN`.
    ///
    /// `USERNAME` is only consulted when `TOKEN` is set, since on Windows it
    /// always holds the login name. Returns `None` unless both halves are
    /// present.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let token = get("TOKEN");
        let username = match get("MLFLOW_TRACKING_USERNAME") {
            Some(username) => username,
            None => {
                token.as_ref()?;
                get("USERNAME")?
            }
        };
        let password = get("MLFLOW_TRACKING_PASSWORD").or(token)?;
        Some(Self::new(username, password))
    }
}

/// Where runs are recorded and under which experiment.
#[derive(Debug, Clone)]
pub struct TrackingConfig {
    /// Tracking URI (`https://...`, `file:///...` or a plain directory path)
    pub tracking_uri: String,
    /// Experiment name, created on first use
    pub experiment_name: String,
    /// Credentials for a remote server
    pub credentials: Option<Credentials>,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            tracking_uri: DEFAULT_TRACKING_URI.to_string(),
            experiment_name: DEFAULT_EXPERIMENT_NAME.to_string(),
            credentials: None,
        }
    }
}

impl TrackingConfig {
    /// Point at a local directory store.
    #[must_use]
    pub fn local(root: impl AsRef<Path>) -> Self {
        Self {
            tracking_uri: root.as_ref().display().to_string(),
            credentials: None,
            ..Self::default()
        }
    }

    /// Defaults overridden by `MLFLOW_TRACKING_URI` and the credential variables.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(uri) = env_first(&["MLFLOW_TRACKING_URI"]) {
            config.tracking_uri = uri;
        }
        config.credentials = Credentials::from_env();
        config
    }

    /// Set the experiment name.
    #[must_use]
    pub fn with_experiment_name(mut self, name: impl Into<String>) -> Self {
        self.experiment_name = name.into();
        self
    }

    /// Set the credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Classify the tracking URI.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedUri`] for schemes other than http(s) and file.
    pub fn uri(&self) -> Result<TrackingUri> {
        TrackingUri::parse(&self.tracking_uri)
    }
}

/// A tracking URI resolved to the kind of store behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingUri {
    /// Tracking server reached over HTTP(S)
    Remote(Url),
    /// Local directory store
    Local(PathBuf),
}

impl TrackingUri {
    /// Parse a tracking URI.
    ///
    /// Strings without a scheme are treated as local paths. Single-letter
    /// schemes are Windows drive letters, also local.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedUri`] for any other scheme.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::UnsupportedUri(raw.to_string()));
        }
        let Ok(url) = Url::parse(trimmed) else {
            return Ok(Self::Local(PathBuf::from(trimmed)));
        };
        match url.scheme() {
            "http" | "https" => Ok(Self::Remote(url)),
            "file" => url
                .to_file_path()
                .map(Self::Local)
                .map_err(|()| Error::UnsupportedUri(raw.to_string())),
            scheme if scheme.len() == 1 => Ok(Self::Local(PathBuf::from(trimmed))),
            _ => Err(Error::UnsupportedUri(raw.to_string())),
        }
    }

    /// URI scheme as the registration policy sees it.
    #[must_use]
    pub fn scheme(&self) -> &str {
        match self {
            Self::Remote(url) => url.scheme(),
            Self::Local(_) => "file",
        }
    }

    /// Whether runs go to a remote server.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

/// Everything a training run needs besides the trainer itself.
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    /// CSV file with the label and feature columns
    pub dataset_path: PathBuf,
    /// Name of the label column
    pub label_column: String,
    /// Held-out fraction, in (0, 1)
    pub test_size: f64,
    /// Seed for the train/test split
    pub random_state: u64,
    /// Tracking destination
    pub tracking: TrackingConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from(DEFAULT_DATASET_PATH),
            label_column: DEFAULT_LABEL_COLUMN.to_string(),
            test_size: DEFAULT_TEST_SIZE,
            random_state: DEFAULT_RANDOM_STATE,
            tracking: TrackingConfig::default(),
        }
    }
}

impl TrainingConfig {
    /// Defaults with `ATTRITION_DATASET` and the tracking variables applied.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self {
            tracking: TrackingConfig::from_env(),
            ..Self::default()
        };
        if let Some(path) = env_first(&["ATTRITION_DATASET"]) {
            config.dataset_path = PathBuf::from(path);
        }
        config
    }

    /// Set the dataset path.
    #[must_use]
    pub fn with_dataset_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dataset_path = path.into();
        self
    }

    /// Set the tracking destination.
    #[must_use]
    pub fn with_tracking(mut self, tracking: TrackingConfig) -> Self {
        self.tracking = tracking;
        self
    }

    /// Check the numeric fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `test_size` is outside (0, 1).
    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(Error::InvalidInput(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        if self.label_column.is_empty() {
            return Err(Error::InvalidInput("label column name is empty".to_string()));
        }
        Ok(())
    }
}

fn env_first(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| std::env::var(key).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_remote_uri() {
        let uri = TrackingUri::parse(DEFAULT_TRACKING_URI).unwrap();
        assert!(uri.is_remote());
        assert_eq!(uri.scheme(), "https");
    }

    #[test]
    fn test_parse_file_uri() {
        let uri = TrackingUri::parse("file:///tmp/mlruns").unwrap();
        assert_eq!(uri, TrackingUri::Local(PathBuf::from("/tmp/mlruns")));
        assert_eq!(uri.scheme(), "file");
    }

    #[test]
    fn test_parse_plain_path_is_local() {
        let uri = TrackingUri::parse("./mlruns").unwrap();
        assert_eq!(uri, TrackingUri::Local(PathBuf::from("./mlruns")));
    }

    #[test]
    fn test_parse_unknown_scheme_rejected() {
        assert!(matches!(
            TrackingUri::parse("s3://bucket/mlruns"),
            Err(Error::UnsupportedUri(_))
        ));
        assert!(TrackingUri::parse("  ").is_err());
    }

    #[test]
    fn test_training_config_validate() {
        let mut config = TrainingConfig::default();
        assert!(config.validate().is_ok());
        config.test_size = 1.0;
        assert!(config.validate().is_err());
    }

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            vars.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value).to_string())
        }
    }

    #[test]
    fn test_credentials_prefer_tracking_pair() {
        let creds = Credentials::from_lookup(lookup(&[
            ("MLFLOW_TRACKING_USERNAME", "alice"),
            ("MLFLOW_TRACKING_PASSWORD", "s3cret"),
            ("USERNAME", "DESKTOP-42\\bob"),
            ("TOKEN", "tok"),
        ]))
        .unwrap();
        assert_eq!(creds.username, "alice");
        assert_eq!(creds.password, "s3cret");
    }

    #[test]
    fn test_login_name_ignored_without_token() {
        // USERNAME alone is the OS login name, not a tracking user.
        assert!(Credentials::from_lookup(lookup(&[("USERNAME", "bob")])).is_none());
        assert!(Credentials::from_lookup(lookup(&[
            ("USERNAME", "bob"),
            ("MLFLOW_TRACKING_PASSWORD", "s3cret"),
        ]))
        .is_none());
    }

    #[test]
    fn test_username_token_fallback() {
        let creds =
            Credentials::from_lookup(lookup(&[("USERNAME", "svc-ci"), ("TOKEN", " tok ")])).unwrap();
        assert_eq!(creds.username, "svc-ci");
        assert_eq!(creds.password, "tok");

        let creds = Credentials::from_lookup(lookup(&[
            ("MLFLOW_TRACKING_USERNAME", "alice"),
            ("TOKEN", "tok"),
        ]))
        .unwrap();
        assert_eq!(creds.username, "alice");
        assert_eq!(creds.password, "tok");
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("alice", "s3cret");
        let debug = format!("{creds:?}");
        assert!(debug.contains("alice"));
        assert!(!debug.contains("s3cret"));
    }
}

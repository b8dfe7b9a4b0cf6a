//! Tracing setup for the binaries.
//!
//! Installs a global subscriber with two layers: stdout filtered by
//! `RUST_LOG` (default `info`) and a plain-text log file at DEBUG level.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

/// Default log file, relative to the working directory.
pub const DEFAULT_LOG_FILE: &str = "app.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Errors that may occur while initializing logging.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// The log file could not be created.
    #[error("Failed to create log file at {path}: {source}")]
    CreateLogFile {
        /// Log file path
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },
    /// Another global subscriber is already installed.
    #[error("Failed to install global tracing subscriber: {0}")]
    SetGlobal(tracing::subscriber::SetGlobalDefaultError),
}

/// Logging settings.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// File receiving DEBUG-level output
    pub log_file: PathBuf,
    /// Stdout filter used when `RUST_LOG` is unset
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            default_filter: "info".to_string(),
        }
    }
}

/// Initialize tracing to stdout and the configured log file.
///
/// Subsequent calls are no-ops.
///
/// # Errors
///
/// Returns an error if the log file cannot be created or a different global
/// subscriber was installed first.
pub fn init(config: &LoggingConfig) -> Result<(), LoggingError> {
    if LOG_GUARD.get().is_some() {
        return Ok(());
    }

    ensure_file_exists(&config.log_file)?;
    let (dir, file_name) = split_log_path(&config.log_file);
    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_filter.as_str()));
    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_filter(env_filter);
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer)
        .with_filter(LevelFilter::DEBUG);

    let subscriber = Registry::default().with(stdout_layer).with(file_layer);
    tracing::subscriber::set_global_default(subscriber).map_err(LoggingError::SetGlobal)?;
    let _ = LOG_GUARD.set(guard);

    tracing::debug!("Logging initialized; log file at {}", config.log_file.display());
    Ok(())
}

fn split_log_path(path: &Path) -> (PathBuf, PathBuf) {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let file_name = path
        .file_name()
        .map_or_else(|| PathBuf::from(DEFAULT_LOG_FILE), PathBuf::from);
    (dir, file_name)
}

fn ensure_file_exists(path: &Path) -> Result<(), LoggingError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(|_| ())
        .map_err(|source| LoggingError::CreateLogFile {
            path: path.to_path_buf(),
            source,
        })
}

/// Structured logging for the precipitation catalog service.
///
/// Provides context-rich logging with component and subbasin identifiers on
/// top of `tracing`. Supports console output and an optional log file for
/// unattended runs.

use std::fmt;
use std::path::Path;

use serde::Deserialize;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::catalog::CatalogError;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    #[serde(alias = "warn")]
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warning => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Loader,
    Catalog,
    Sync,
    Verify,
    Registry,
    System,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Loader => write!(f, "LOAD"),
            Component::Catalog => write!(f, "CAT"),
            Component::Sync => write!(f, "SYNC"),
            Component::Verify => write!(f, "VERIFY"),
            Component::Registry => write!(f, "GAGE"),
            Component::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// The record itself was rejected (bad pathname, empty series).
    Expected,
    /// The store failed underneath us (I/O, encoding, lock).
    Unexpected,
    /// Cannot tell from the error alone.
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// `[logging]` section of the pipeline config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogSettings {
    /// Minimum level; `RUST_LOG` takes precedence when set.
    #[serde(default)]
    pub level: LogLevel,
    /// Optional file receiving a copy of every log line.
    #[serde(default)]
    pub file: Option<String>,
}

/// Installs the global subscriber.
///
/// Returns the file appender guard when a log file is configured; the caller
/// must hold it until exit so buffered lines are flushed. Calling this twice
/// leaves the first subscriber in place.
pub fn init_logger(settings: &LogSettings) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.level.to_string()));

    let console = tracing_subscriber::fmt::layer().with_target(false);

    match settings.file.as_deref() {
        Some(path) => {
            let path = Path::new(path);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| "precip_catalog.log".into());

            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);

            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(file_layer)
                .try_init();
            Some(guard)
        }
        None => {
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .try_init();
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Log a general informational message
pub fn info(component: Component, subbasin_id: Option<&str>, message: &str) {
    tracing::info!(
        component = %component,
        subbasin = subbasin_id.unwrap_or("-"),
        "{}",
        message
    );
}

/// Log a warning message
pub fn warn(component: Component, subbasin_id: Option<&str>, message: &str) {
    tracing::warn!(
        component = %component,
        subbasin = subbasin_id.unwrap_or("-"),
        "{}",
        message
    );
}

/// Log an error message
pub fn error(component: Component, subbasin_id: Option<&str>, message: &str) {
    tracing::error!(
        component = %component,
        subbasin = subbasin_id.unwrap_or("-"),
        "{}",
        message
    );
}

/// Log a debug message
pub fn debug(component: Component, subbasin_id: Option<&str>, message: &str) {
    tracing::debug!(
        component = %component,
        subbasin = subbasin_id.unwrap_or("-"),
        "{}",
        message
    );
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a per-subbasin catalog write failure.
pub fn classify_write_failure(err: &CatalogError) -> FailureType {
    match err {
        CatalogError::InvalidRecord { .. } => FailureType::Expected,
        CatalogError::Io { .. }
        | CatalogError::Encode(_)
        | CatalogError::Locked { .. }
        | CatalogError::Unavailable { .. } => FailureType::Unexpected,
        CatalogError::Corrupt { .. } | CatalogError::NotFound(_) => FailureType::Unknown,
    }
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a catalog write failure for one subbasin with automatic classification.
///
/// Every class is logged at warning level or above: a missing subbasin in
/// the registry must always be explained in the log.
pub fn log_write_failure(subbasin_id: &str, pathname: &str, err: &CatalogError) {
    let failure_type = classify_write_failure(err);
    let message = format!("write of {} failed [{}]: {}", pathname, failure_type, err);

    match failure_type {
        FailureType::Unexpected => error(Component::Sync, Some(subbasin_id), &message),
        FailureType::Expected | FailureType::Unknown => {
            warn(Component::Sync, Some(subbasin_id), &message)
        }
    }
}

// ---------------------------------------------------------------------------
// Sync Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of one synchronization run
pub fn log_sync_summary(total: usize, written: usize, failed: usize, skipped: usize) {
    let message = format!(
        "Sync complete: {}/{} written, {} failed, {} skipped",
        written, total, failed, skipped
    );

    if failed == 0 {
        info(Component::Sync, None, &message);
    } else if written == 0 {
        error(Component::Sync, None, &message);
    } else {
        warn(Component::Sync, None, &message);
    }
}

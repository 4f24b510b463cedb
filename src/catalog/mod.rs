//! Time-series catalog access.
//!
//! The synchronizer only talks to the store through the [`Catalog`] trait:
//! list pathnames, delete by pathname, put a record, read a record back.
//! [`CatalogFile`] is the file-backed store used by the binary.

pub mod file;

use std::path::PathBuf;

use thiserror::Error;

use crate::model::CatalogEntry;

pub use file::CatalogFile;

/// Errors raised by a catalog store.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog file could not be created or opened.
    #[error("catalog {path} unavailable: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Another handle holds the catalog.
    #[error("catalog {path} is locked by another process")]
    Locked { path: PathBuf },

    /// Reading or writing the catalog file failed.
    #[error("I/O error on catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Record payload could not be encoded or decoded.
    #[error("encoding error: {0}")]
    Encode(#[from] bincode::Error),

    /// The file exists but is not a catalog this crate can read.
    #[error("catalog {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// The store refused the record.
    #[error("invalid record {pathname}: {reason}")]
    InvalidRecord { pathname: String, reason: String },

    /// No record stored under the pathname.
    #[error("no record for pathname {0}")]
    NotFound(String),
}

/// A store holding one time-series record per pathname.
pub trait Catalog {
    /// All stored pathnames.
    fn pathnames(&self) -> Result<Vec<String>, CatalogError>;

    /// Removes the record under `pathname`. Removing an absent pathname is a no-op.
    fn delete(&mut self, pathname: &str) -> Result<(), CatalogError>;

    /// Stores `entry`, replacing any record with the same pathname.
    fn put_series(&mut self, entry: &CatalogEntry) -> Result<(), CatalogError>;

    /// Reads the record stored under `pathname`.
    fn read_series(&self, pathname: &str) -> Result<CatalogEntry, CatalogError>;
}

/// Checks the record invariants every store enforces before accepting a write.
pub fn validate_entry(entry: &CatalogEntry) -> Result<(), CatalogError> {
    let reject = |reason: String| CatalogError::InvalidRecord {
        pathname: entry.pathname.clone(),
        reason,
    };

    entry
        .pathname
        .parse::<crate::pathname::Pathname>()
        .map_err(|e| reject(e.to_string()))?;

    if entry.values.is_empty() {
        return Err(reject("record has no values".to_string()));
    }
    if entry.value_count != entry.values.len() {
        return Err(reject(format!(
            "value count {} does not match {} values",
            entry.value_count,
            entry.values.len()
        )));
    }
    if entry.interval_minutes == 0 {
        return Err(reject("interval must be positive".to_string()));
    }
    Ok(())
}

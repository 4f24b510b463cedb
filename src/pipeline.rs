/// End-to-end run: load, synchronize (with verification), registry.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::config::PipelineConfig;
use crate::ingest::{self, LoadError};
use crate::logging::{self, Component};
use crate::registry::{self, RegistryError, RegistryOutcome};
use crate::sync::{self, FailureSummary, SyncError, SyncOptions};
use crate::verify::VerificationReport;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("cannot write run report {path}: {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What one run did, suitable for JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub rows_loaded: usize,
    pub subbasins: usize,
    pub stale_removed: usize,
    pub written: usize,
    pub failed: usize,
    pub skipped: usize,
    pub failures: Vec<FailureSummary>,
    pub gauge_ids: Vec<String>,
    pub verification: Option<VerificationReport>,
    pub registry: RegistryOutcome,
}

/// Runs the whole pipeline for `config`.
///
/// Input and catalog failures abort before the registry is touched. A
/// registry write failure is returned after the run report has been written;
/// the catalog is not rolled back.
pub fn run(config: &PipelineConfig) -> Result<RunSummary, PipelineError> {
    let rows = ingest::load_table(&config.input.path, &config.input.columns)?;

    let options = SyncOptions::from(config);
    let report = sync::synchronize(&rows, &config.catalog.path, &options)?;
    let gauges = report.gauges(&options.gauge_name_prefix);

    let generated = registry::generate(&gauges, &config.registry.path);
    let registry = match &generated {
        Ok(outcome) => outcome.clone(),
        Err(e) => RegistryOutcome::Failed {
            path: config.registry.path.clone(),
            error: e.to_string(),
        },
    };

    let summary = RunSummary {
        rows_loaded: rows.len(),
        subbasins: report.outcomes.len(),
        stale_removed: report.stale_removed,
        written: report.written_count(),
        failed: report.failed_count(),
        skipped: report.skipped_count(),
        failures: report.failures(),
        gauge_ids: gauges.iter().map(|g| g.id.clone()).collect(),
        verification: report.verification.clone(),
        registry,
    };

    if let Some(path) = &config.report.path {
        write_report(path, &summary)?;
    }
    generated?;
    Ok(summary)
}

fn write_report(path: &Path, summary: &RunSummary) -> Result<(), PipelineError> {
    let json = serde_json::to_string_pretty(summary)
        .map_err(|e| PipelineError::Report {
            path: path.to_path_buf(),
            source: std::io::Error::other(e),
        })?;
    std::fs::write(path, json).map_err(|source| PipelineError::Report {
        path: path.to_path_buf(),
        source,
    })?;
    logging::info(
        Component::System,
        None,
        &format!("Run report written to {}", path.display()),
    );
    Ok(())
}

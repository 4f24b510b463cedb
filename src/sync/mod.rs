//! Catalog synchronization.
//!
//! Replaces the precipitation records of a catalog with one record per
//! subbasin built from the input rows, and reports which subbasins made it.
//!
//! Each subbasin produces exactly one [`SubbasinOutcome`]. Gauge entries are
//! derived afterwards from the `Written` outcomes only, so a failed write can
//! never consume a gauge id: ids are compact (`Gage-0..Gage-(k-1)`) and follow
//! the first-appearance order of the subbasins.
//!
//! Submodules:
//! - `grouping`: first-appearance grouping of input rows.
//! - `series`: record assembly for the incremental and cumulative policies.

pub mod grouping;
pub mod series;

use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::catalog::{Catalog, CatalogError, CatalogFile};
use crate::config::{AccumulationPolicy, PipelineConfig};
use crate::logging::{self, Component};
use crate::model::{CatalogEntry, GaugeEntry, PARAM_PRECIP, PrecipitationRow, UNITS_MM, gauge_id};
use crate::pathname::matches_parameter;
use crate::verify::{self, VerificationReport};

pub use grouping::{SubbasinGroup, group_by_subbasin};
pub use series::{build_entry, gap_fill};

#[derive(Debug, Error)]
pub enum SyncError {
    /// The catalog could not be replaced, opened, or cleaned.
    #[error("catalog unavailable: {0}")]
    CatalogUnavailable(#[source] CatalogError),
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Everything the synchronizer needs besides the rows and catalog path.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub policy: AccumulationPolicy,
    pub parameter: String,
    pub qualifier: String,
    pub interval_label: String,
    pub version: String,
    pub units: String,
    pub gauge_name_prefix: String,
    pub replace_existing_file: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            policy: AccumulationPolicy::Incremental,
            parameter: PARAM_PRECIP.to_string(),
            qualifier: "OBS".to_string(),
            interval_label: "1DAY".to_string(),
            version: "OBS".to_string(),
            units: UNITS_MM.to_string(),
            gauge_name_prefix: "S_".to_string(),
            replace_existing_file: true,
        }
    }
}

impl From<&PipelineConfig> for SyncOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            policy: config.policy,
            parameter: config.catalog.parameter.clone(),
            qualifier: config.catalog.qualifier.clone(),
            interval_label: config.catalog.interval_label.clone(),
            version: config.catalog.version.clone(),
            units: config.catalog.units.clone(),
            gauge_name_prefix: config.registry.gauge_name_prefix.clone(),
            replace_existing_file: config.catalog.replace_existing_file,
        }
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// A catalog write that failed for one subbasin.
#[derive(Debug, Error)]
#[error("entry write failed for subbasin {subbasin_id} ({pathname}): {source}")]
pub struct EntryFailure {
    pub subbasin_id: String,
    pub pathname: String,
    #[source]
    pub source: CatalogError,
}

/// Result of processing one subbasin group.
#[derive(Debug)]
pub enum SubbasinOutcome {
    Written {
        subbasin_id: String,
        entry: CatalogEntry,
    },
    Failed(EntryFailure),
    /// No row of the subbasin carried a value.
    Skipped { subbasin_id: String },
}

impl SubbasinOutcome {
    pub fn subbasin_id(&self) -> &str {
        match self {
            SubbasinOutcome::Written { subbasin_id, .. } => subbasin_id,
            SubbasinOutcome::Failed(failure) => &failure.subbasin_id,
            SubbasinOutcome::Skipped { subbasin_id } => subbasin_id,
        }
    }
}

/// Serializable summary line for a failed subbasin.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FailureSummary {
    pub subbasin_id: String,
    pub pathname: String,
    pub error: String,
}

/// Everything one synchronization run produced.
#[derive(Debug)]
pub struct SyncReport {
    /// Base name of the catalog file, referenced by every gauge.
    pub file_reference: String,
    /// Number of stale precipitation records removed before writing.
    pub stale_removed: usize,
    pub outcomes: Vec<SubbasinOutcome>,
    /// Re-read check of the last written record, if any was written.
    pub verification: Option<VerificationReport>,
}

impl SyncReport {
    /// Gauge entries for the written subbasins, numbered in processing order.
    pub fn gauges(&self, gauge_name_prefix: &str) -> Vec<GaugeEntry> {
        self.written()
            .enumerate()
            .map(|(i, (subbasin_id, entry))| GaugeEntry {
                id: gauge_id(i),
                name: format!("{}{}", gauge_name_prefix, subbasin_id),
                file_reference: self.file_reference.clone(),
                pathname: entry.pathname.clone(),
            })
            .collect()
    }

    /// Written subbasins and their records, in processing order.
    pub fn written(&self) -> impl Iterator<Item = (&str, &CatalogEntry)> {
        self.outcomes.iter().filter_map(|o| match o {
            SubbasinOutcome::Written { subbasin_id, entry } => Some((subbasin_id.as_str(), entry)),
            _ => None,
        })
    }

    pub fn failures(&self) -> Vec<FailureSummary> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                SubbasinOutcome::Failed(f) => Some(FailureSummary {
                    subbasin_id: f.subbasin_id.clone(),
                    pathname: f.pathname.clone(),
                    error: f.source.to_string(),
                }),
                _ => None,
            })
            .collect()
    }

    pub fn written_count(&self) -> usize {
        self.written().count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, SubbasinOutcome::Failed(_)))
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, SubbasinOutcome::Skipped { .. }))
            .count()
    }
}

// ---------------------------------------------------------------------------
// Synchronizer
// ---------------------------------------------------------------------------

/// Rebuilds the precipitation records of the catalog at `catalog_path`.
///
/// The catalog is locked first and held exclusively until this function
/// returns; with `replace_existing_file` its old contents are then discarded.
/// A catalog that cannot be opened, is held by another handle, or cannot be
/// cleaned aborts the run; a failed record write only excludes that subbasin.
pub fn synchronize(
    rows: &[PrecipitationRow],
    catalog_path: &Path,
    options: &SyncOptions,
) -> Result<SyncReport, SyncError> {
    let opened = if options.replace_existing_file {
        CatalogFile::create(catalog_path)
    } else {
        CatalogFile::open(catalog_path)
    };
    let mut catalog = opened.map_err(|e| {
        logging::error(
            Component::Catalog,
            None,
            &format!("Cannot use catalog {}: {}", catalog_path.display(), e),
        );
        SyncError::CatalogUnavailable(e)
    })?;
    let file_reference = file_reference(catalog_path);

    let mut report = sync_catalog(&mut catalog, rows, options, &file_reference)?;

    report.verification = report
        .written()
        .last()
        .map(|(_, last)| verify::verify_entry(&catalog, last));

    if let Err(e) = catalog.close() {
        // Every accepted write was already flushed; only the final sync failed.
        logging::warn(Component::Catalog, None, &format!("Closing catalog: {}", e));
    }
    Ok(report)
}

/// Runs the clean / group / build / write steps against an open catalog.
///
/// The returned report has no verification; `synchronize` adds it.
pub fn sync_catalog<C: Catalog>(
    catalog: &mut C,
    rows: &[PrecipitationRow],
    options: &SyncOptions,
    file_reference: &str,
) -> Result<SyncReport, SyncError> {
    let stale_removed =
        remove_stale_entries(catalog, &options.parameter).map_err(SyncError::CatalogUnavailable)?;

    let groups = group_by_subbasin(rows);
    let mut outcomes = Vec::with_capacity(groups.len());

    for group in &groups {
        let outcome = write_group(catalog, group, options);
        outcomes.push(outcome);
    }

    let report = SyncReport {
        file_reference: file_reference.to_string(),
        stale_removed,
        outcomes,
        verification: None,
    };

    logging::log_sync_summary(
        groups.len(),
        report.written_count(),
        report.failed_count(),
        report.skipped_count(),
    );
    Ok(report)
}

fn write_group<C: Catalog>(
    catalog: &mut C,
    group: &SubbasinGroup<'_>,
    options: &SyncOptions,
) -> SubbasinOutcome {
    let subbasin_id = group.subbasin_id.to_string();

    if !group.has_values() {
        logging::warn(
            Component::Sync,
            Some(&subbasin_id),
            "No precipitation values; subbasin skipped",
        );
        return SubbasinOutcome::Skipped { subbasin_id };
    }

    let entry = build_entry(group, options);
    match catalog.put_series(&entry) {
        Ok(()) => {
            logging::info(
                Component::Sync,
                Some(&subbasin_id),
                &format!("Saved {} values to {}", entry.value_count, entry.pathname),
            );
            SubbasinOutcome::Written { subbasin_id, entry }
        }
        Err(source) => {
            logging::log_write_failure(&subbasin_id, &entry.pathname, &source);
            SubbasinOutcome::Failed(EntryFailure {
                subbasin_id,
                pathname: entry.pathname,
                source,
            })
        }
    }
}

/// Deletes every record whose pathname carries `/<parameter>/`.
///
/// Returns how many were removed; a second call on the same catalog removes
/// nothing.
pub fn remove_stale_entries<C: Catalog>(catalog: &mut C, parameter: &str) -> Result<usize, CatalogError> {
    let stale: Vec<String> = catalog
        .pathnames()?
        .into_iter()
        .filter(|p| matches_parameter(p, parameter))
        .collect();

    for pathname in &stale {
        logging::debug(Component::Catalog, None, &format!("Deleting {}", pathname));
        catalog.delete(pathname)?;
    }
    if !stale.is_empty() {
        logging::info(
            Component::Catalog,
            None,
            &format!("Removed {} stale {} records", stale.len(), parameter),
        );
    }
    Ok(stale.len())
}

/// Base name of the catalog file as referenced from the registry.
pub fn file_reference(catalog_path: &Path) -> String {
    catalog_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| catalog_path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(id: &str, day: u32, value: f64) -> PrecipitationRow {
        PrecipitationRow::new(id, NaiveDate::from_ymd_opt(2024, 1, day).unwrap(), value)
    }

    #[test]
    fn test_file_reference_is_base_name() {
        assert_eq!(
            file_reference(Path::new("/data/saidas/precipitation.dss")),
            "precipitation.dss"
        );
    }

    #[test]
    fn test_synchronize_writes_one_record_per_subbasin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("precipitation.dss");
        let rows = vec![row("1", 1, 1.0), row("2", 1, 2.0), row("1", 2, 3.0)];

        let report = synchronize(&rows, &path, &SyncOptions::default()).unwrap();
        let gauges = report.gauges("S_");

        assert_eq!(gauges.len(), 2);
        assert_eq!(gauges[0].id, "Gage-0");
        assert_eq!(gauges[0].name, "S_1");
        assert_eq!(gauges[1].name, "S_2");
        assert_eq!(gauges[0].file_reference, "precipitation.dss");
        assert_eq!(gauges[0].pathname, "/1/PRECIP/OBS/01JAN2024/1DAY/OBS/");

        let verification = report.verification.expect("last write is verified");
        assert_eq!(verification.pathname, gauges[1].pathname);
    }

    #[test]
    fn test_catalog_held_elsewhere_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("precipitation.dss");
        let mut holder = CatalogFile::open(&path).unwrap();
        holder.put_series(&build_entry(
            &SubbasinGroup {
                subbasin_id: "9",
                rows: vec![&row("9", 1, 9.0)],
            },
            &SyncOptions::default(),
        ))
        .unwrap();

        let result = synchronize(&[row("1", 1, 1.0)], &path, &SyncOptions::default());
        assert!(
            matches!(result, Err(SyncError::CatalogUnavailable(CatalogError::Locked { .. }))),
            "expected Locked catalog, got {:?}",
            result.map(|r| r.written_count())
        );
        assert_eq!(holder.len(), 1, "held catalog must keep its records");
        assert!(holder.read_series("/9/PRECIP/OBS/01JAN2024/1DAY/OBS/").is_ok());
    }

    #[test]
    fn test_directory_in_place_of_catalog_is_unavailable() {
        // A directory in the catalog's place cannot be opened as a file.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("precipitation.dss");
        std::fs::create_dir(&path).unwrap();

        let result = synchronize(&[row("1", 1, 1.0)], &path, &SyncOptions::default());
        assert!(matches!(result, Err(SyncError::CatalogUnavailable(_))));
    }
}

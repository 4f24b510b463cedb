/// Core data types for the precipitation catalog service.
///
/// This module defines the shared domain model imported by all other modules:
/// input rows, catalog records, and gauge registry entries. It contains no I/O.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Catalog constants
// ---------------------------------------------------------------------------

/// Pathname parameter token for precipitation series.
pub const PARAM_PRECIP: &str = "PRECIP";

/// Sampling interval of every record, in minutes (one day).
pub const DAILY_INTERVAL_MINUTES: u32 = 1440;

/// Units string stored on every precipitation record.
pub const UNITS_MM: &str = "MM";

/// Stored in place of a blank cell so later values keep their dates.
/// Same flag the hydrologic model reads as "missing".
pub const MISSING_VALUE: f64 = -901.0;

// ---------------------------------------------------------------------------
// Input rows
// ---------------------------------------------------------------------------

/// One row of the extracted precipitation table.
///
/// `value` is `None` when the extraction step left the precipitation cell
/// blank for that subbasin and date.
#[derive(Debug, Clone, PartialEq)]
pub struct PrecipitationRow {
    pub subbasin_id: String,
    pub date: NaiveDate,
    pub value: Option<f64>,
}

impl PrecipitationRow {
    pub fn new(subbasin_id: impl Into<String>, date: NaiveDate, value: f64) -> Self {
        Self {
            subbasin_id: subbasin_id.into(),
            date,
            value: Some(value),
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog records
// ---------------------------------------------------------------------------

/// How the values of a record accumulate over each interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccumulationType {
    /// Per-period incremental values.
    Incremental,
    /// Per-period cumulative values over a fixed period.
    Cumulative,
}

impl AccumulationType {
    /// Type tag stored with the record.
    pub fn tag(self) -> &'static str {
        match self {
            AccumulationType::Incremental => "PER-INC",
            AccumulationType::Cumulative => "PER-CUM",
        }
    }
}

impl std::fmt::Display for AccumulationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// A single time-series record as submitted to (and read back from) the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub pathname: String,
    /// e.g. "01JAN2024 00:00:00"
    pub start_timestamp: String,
    pub interval_minutes: u32,
    pub value_count: usize,
    pub values: Vec<f64>,
    pub units: String,
    pub accumulation_type: AccumulationType,
}

impl CatalogEntry {
    /// Builds a daily record, deriving `value_count` from `values`.
    pub fn daily(
        pathname: String,
        start: NaiveDate,
        values: Vec<f64>,
        units: &str,
        accumulation_type: AccumulationType,
    ) -> Self {
        Self {
            pathname,
            start_timestamp: crate::pathname::format_start_timestamp(start),
            interval_minutes: DAILY_INTERVAL_MINUTES,
            value_count: values.len(),
            values,
            units: units.to_string(),
            accumulation_type,
        }
    }
}

// ---------------------------------------------------------------------------
// Registry entries
// ---------------------------------------------------------------------------

/// A rainfall gauge referencing one successfully written catalog record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GaugeEntry {
    /// "Gage-0", "Gage-1", ...
    pub id: String,
    /// "S_<subbasin_id>" with the default prefix.
    pub name: String,
    /// Base name of the catalog file.
    pub file_reference: String,
    pub pathname: String,
}

/// Formats the sequential gauge id for position `index`.
pub fn gauge_id(index: usize) -> String {
    format!("Gage-{}", index)
}

/// Pipeline configuration.
///
/// Loaded from a TOML file, then overridden by `PRECIP_INPUT`,
/// `PRECIP_CATALOG` and `PRECIP_REGISTRY` from the environment (a `.env`
/// file is honored). The resulting object is passed explicitly to the
/// loader, synchronizer and registry generator.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;

use crate::logging::LogSettings;
use crate::model::{PARAM_PRECIP, UNITS_MM};

pub const ENV_INPUT: &str = "PRECIP_INPUT";
pub const ENV_CATALOG: &str = "PRECIP_CATALOG";
pub const ENV_REGISTRY: &str = "PRECIP_REGISTRY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    /// A CSV file, or a directory of CSV block files.
    pub path: PathBuf,
    #[serde(default)]
    pub columns: TableColumns,
}

/// Column names expected in the input table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TableColumns {
    pub subbasin: String,
    pub date: String,
    pub value: String,
}

impl Default for TableColumns {
    fn default() -> Self {
        Self {
            subbasin: "subbasin_id".to_string(),
            date: "date".to_string(),
            value: "precipitation".to_string(),
        }
    }
}

/// Fixed pathname tokens and catalog location.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    pub path: PathBuf,
    #[serde(default = "default_parameter")]
    pub parameter: String,
    #[serde(default = "default_obs")]
    pub qualifier: String,
    #[serde(default = "default_interval_label")]
    pub interval_label: String,
    #[serde(default = "default_obs")]
    pub version: String,
    #[serde(default = "default_units")]
    pub units: String,
    /// Delete the catalog file before writing. When false, only the
    /// precipitation pathnames inside it are replaced.
    #[serde(default = "default_true")]
    pub replace_existing_file: bool,
}

/// How each subbasin's daily values are laid out in its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccumulationPolicy {
    /// Series starts at the subbasin's first observed date.
    #[default]
    Incremental,
    /// Series covers `period_start..=period_end`, zero-filled.
    Cumulative {
        period_start: NaiveDate,
        period_end: NaiveDate,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    pub path: PathBuf,
    #[serde(default = "default_gauge_prefix")]
    pub gauge_name_prefix: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportConfig {
    /// Where to write the JSON run summary.
    pub path: Option<PathBuf>,
}

fn default_parameter() -> String {
    PARAM_PRECIP.to_string()
}

fn default_obs() -> String {
    "OBS".to_string()
}

fn default_interval_label() -> String {
    "1DAY".to_string()
}

fn default_units() -> String {
    UNITS_MM.to_string()
}

fn default_gauge_prefix() -> String {
    "S_".to_string()
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Pipeline configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub input: InputConfig,
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub policy: AccumulationPolicy,
    pub registry: RegistryConfig,
    #[serde(default)]
    pub logging: LogSettings,
    #[serde(default)]
    pub report: ReportConfig,
}

impl PipelineConfig {
    /// Reads and validates a TOML config file, then applies environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        dotenv::dotenv().ok();
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Replaces configured paths with values returned by `lookup` for the
    /// `PRECIP_*` keys. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty()).map(PathBuf::from);

        if let Some(p) = get(ENV_INPUT) {
            self.input.path = p;
        }
        if let Some(p) = get(ENV_CATALOG) {
            self.catalog.path = p;
        }
        if let Some(p) = get(ENV_REGISTRY) {
            self.registry.path = p;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let tokens = [
            ("catalog.parameter", &self.catalog.parameter),
            ("catalog.qualifier", &self.catalog.qualifier),
            ("catalog.interval_label", &self.catalog.interval_label),
            ("catalog.version", &self.catalog.version),
        ];
        for (name, value) in tokens {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{} must not be empty", name)));
            }
            if value.contains('/') {
                return Err(ConfigError::Invalid(format!(
                    "{} must not contain '/': {}",
                    name, value
                )));
            }
        }

        if let AccumulationPolicy::Cumulative {
            period_start,
            period_end,
        } = self.policy
        {
            if period_start > period_end {
                return Err(ConfigError::Invalid(format!(
                    "policy period_start {} is after period_end {}",
                    period_start, period_end
                )));
            }
        }
        Ok(())
    }
}

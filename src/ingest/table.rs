/// Precipitation table loader.
///
/// The extraction step writes CSV with a header row. Only three columns are
/// used: subbasin identifier, date, and daily precipitation in millimeters.
/// Everything else (e.g. `system:index`, `.geo`) is ignored.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::config::TableColumns;
use crate::logging::{self, Component};
use crate::model::PrecipitationRow;

/// Names the extraction step is known to use for the subbasin column.
pub const SUBBASIN_COLUMN_ALIASES: &[&str] = &["subbasin_id", "raster_val"];

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("input not found: {0}")]
    InputNotFound(PathBuf),

    #[error("{path} is missing required columns: {}", .missing.join(", "))]
    SchemaError { path: PathBuf, missing: Vec<String> },

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

// ============================================================================
// Public entry point
// ============================================================================

/// Loads every row from `path`.
///
/// `path` may be a single CSV file or a directory; for a directory every
/// `*.csv` file is read in file-name order and the rows are concatenated.
pub fn load_table(path: &Path, columns: &TableColumns) -> Result<Vec<PrecipitationRow>, LoadError> {
    if !path.exists() {
        return Err(LoadError::InputNotFound(path.to_path_buf()));
    }

    let files = if path.is_dir() {
        block_files(path)?
    } else {
        vec![path.to_path_buf()]
    };

    let mut rows = Vec::new();
    for file in &files {
        let text = std::fs::read_to_string(file).map_err(|source| LoadError::Io {
            path: file.clone(),
            source,
        })?;
        let parsed = parse_table(&text, file, columns)?;
        logging::debug(
            Component::Loader,
            None,
            &format!("Read {} rows from {}", parsed.len(), file.display()),
        );
        rows.extend(parsed);
    }

    logging::info(
        Component::Loader,
        None,
        &format!("Loaded {} rows from {} file(s)", rows.len(), files.len()),
    );
    Ok(rows)
}

fn block_files(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let entries = std::fs::read_dir(dir).map_err(|source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| LoadError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let p = entry.path();
        let is_csv = p
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if p.is_file() && is_csv {
            files.push(p);
        }
    }
    files.sort();
    Ok(files)
}

// ============================================================================
// CSV parsing
// ============================================================================

struct ColumnIndex {
    subbasin: usize,
    date: usize,
    value: usize,
}

/// Parses one CSV document. `path` is only used for error messages.
pub fn parse_table(
    text: &str,
    path: &Path,
    columns: &TableColumns,
) -> Result<Vec<PrecipitationRow>, LoadError> {
    let mut lines = text.lines().enumerate();

    let header = loop {
        match lines.next() {
            Some((_, line)) if line.trim().is_empty() => continue,
            Some((_, line)) => break split_record(line.trim_start_matches('\u{feff}')),
            None => {
                return Err(LoadError::SchemaError {
                    path: path.to_path_buf(),
                    missing: vec![
                        columns.subbasin.clone(),
                        columns.date.clone(),
                        columns.value.clone(),
                    ],
                });
            }
        }
    };

    let index = resolve_columns(&header, path, columns)?;
    let needed = index.subbasin.max(index.date).max(index.value);

    let mut rows = Vec::new();
    for (i, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        let line_no = i + 1;
        let fields = split_record(line);
        if fields.len() <= needed {
            return Err(parse_error(
                path,
                line_no,
                format!("expected at least {} fields, found {}", needed + 1, fields.len()),
            ));
        }

        let subbasin_id = fields[index.subbasin].trim().to_string();
        if subbasin_id.is_empty() {
            return Err(parse_error(path, line_no, "empty subbasin identifier".to_string()));
        }
        let date = parse_date(&fields[index.date])
            .ok_or_else(|| parse_error(path, line_no, format!("bad date '{}'", fields[index.date])))?;
        let value = parse_value(&fields[index.value]).map_err(|raw| {
            parse_error(path, line_no, format!("bad precipitation value '{}'", raw))
        })?;

        rows.push(PrecipitationRow {
            subbasin_id,
            date,
            value,
        });
    }
    Ok(rows)
}

fn parse_error(path: &Path, line: usize, message: String) -> LoadError {
    LoadError::Parse {
        path: path.to_path_buf(),
        line,
        message,
    }
}

fn resolve_columns(
    header: &[String],
    path: &Path,
    columns: &TableColumns,
) -> Result<ColumnIndex, LoadError> {
    let find = |name: &str| header.iter().position(|h| h.trim() == name);

    let subbasin = find(columns.subbasin.as_str())
        .or_else(|| SUBBASIN_COLUMN_ALIASES.iter().find_map(|alias| find(*alias)));
    let date = find(columns.date.as_str());
    let value = find(columns.value.as_str());

    match (subbasin, date, value) {
        (Some(subbasin), Some(date), Some(value)) => Ok(ColumnIndex {
            subbasin,
            date,
            value,
        }),
        _ => {
            let mut missing = Vec::new();
            if subbasin.is_none() {
                missing.push(columns.subbasin.clone());
            }
            if date.is_none() {
                missing.push(columns.date.clone());
            }
            if value.is_none() {
                missing.push(columns.value.clone());
            }
            Err(LoadError::SchemaError {
                path: path.to_path_buf(),
                missing,
            })
        }
    }
}

/// Splits one CSV record, honoring double-quoted fields and `""` escapes.
fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// Accepts `2024-01-05`, `2024-01-05 00:00:00`, `2024-01-05T00:00:00` and
/// RFC 3339. Only the calendar date is kept.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
}

/// Blank, `null` and `NaN` cells are missing values.
fn parse_value(raw: &str) -> Result<Option<f64>, String> {
    let s = raw.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("null") || s.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(s.to_string()),
    }
}

// ============================================================================
// Tests
// ============================================================================

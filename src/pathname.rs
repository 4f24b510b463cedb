/// Catalog pathname construction and parsing.
///
/// A pathname is six slash-delimited parts wrapped in leading and trailing
/// slashes:
///
/// ```text
/// /<location>/<parameter>/<qualifier>/<date_block>/<interval_label>/<version>/
/// ```
///
/// The date block is empty for series that span a fixed period.

use chrono::{NaiveDate, NaiveTime};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of parts in a catalog pathname.
pub const PATHNAME_PARTS: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathnameError {
    #[error("pathname must start and end with '/': {0}")]
    MissingDelimiters(String),
    #[error("pathname must have 6 parts, found {found}: {pathname}")]
    WrongPartCount { pathname: String, found: usize },
    #[error("pathname location part is empty: {0}")]
    EmptyLocation(String),
}

/// The six parts of a catalog pathname.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pathname {
    pub location: String,
    pub parameter: String,
    pub qualifier: String,
    pub date_block: String,
    pub interval_label: String,
    pub version: String,
}

impl fmt::Display for Pathname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/{}/{}/{}/{}/{}/{}/",
            self.location,
            self.parameter,
            self.qualifier,
            self.date_block,
            self.interval_label,
            self.version
        )
    }
}

impl FromStr for Pathname {
    type Err = PathnameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let inner = s
            .strip_prefix('/')
            .and_then(|rest| rest.strip_suffix('/'))
            .ok_or_else(|| PathnameError::MissingDelimiters(s.to_string()))?;

        let parts: Vec<&str> = inner.split('/').collect();
        if parts.len() != PATHNAME_PARTS {
            return Err(PathnameError::WrongPartCount {
                pathname: s.to_string(),
                found: parts.len(),
            });
        }
        if parts[0].trim().is_empty() {
            return Err(PathnameError::EmptyLocation(s.to_string()));
        }

        Ok(Pathname {
            location: parts[0].to_string(),
            parameter: parts[1].to_string(),
            qualifier: parts[2].to_string(),
            date_block: parts[3].to_string(),
            interval_label: parts[4].to_string(),
            version: parts[5].to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Date formatting
// ---------------------------------------------------------------------------

/// Formats a date block part, e.g. 2024-01-01 -> "01JAN2024".
pub fn format_date_block(date: NaiveDate) -> String {
    date.format("%d%b%Y").to_string().to_uppercase()
}

/// Formats a record start timestamp at midnight, e.g. "01JAN2024 00:00:00".
pub fn format_start_timestamp(date: NaiveDate) -> String {
    date.and_time(NaiveTime::MIN)
        .format("%d%b%Y %H:%M:%S")
        .to_string()
        .to_uppercase()
}

// ---------------------------------------------------------------------------
// Stale-entry matching
// ---------------------------------------------------------------------------

/// Returns `true` if `pathname` carries the `/<parameter>/` marker,
/// compared case-insensitively.
pub fn matches_parameter(pathname: &str, parameter: &str) -> bool {
    let marker = format!("/{}/", parameter.to_uppercase());
    pathname.to_uppercase().contains(&marker)
}

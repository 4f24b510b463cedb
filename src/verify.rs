//! Post-write verification.
//!
//! Re-reads a record that the synchronizer just wrote and checks that the
//! stored value count is consistent and that a sample of values comes back
//! unchanged. This catches silent corruption; a mismatch is logged as a
//! warning and never fails the run, since the store already accepted the write.

use serde::Serialize;

use crate::catalog::Catalog;
use crate::logging::{self, Component};
use crate::model::CatalogEntry;

/// How many leading values are compared.
pub const SAMPLE_SIZE: usize = 5;

// ============================================================================
// Verification Results
// ============================================================================

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VerificationReport {
    pub pathname: String,
    pub status: VerificationStatus,
    /// Value count stored with the record, 0 when unreadable.
    pub value_count: usize,
    /// First values read back.
    pub sample: Vec<f64>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum VerificationStatus {
    Success,
    Mismatch,
    Unreadable,
}

// ============================================================================
// Verification
// ============================================================================

/// Re-reads `expected.pathname` from `catalog` and compares it with what was
/// submitted.
pub fn verify_entry<C: Catalog + ?Sized>(catalog: &C, expected: &CatalogEntry) -> VerificationReport {
    let mut report = VerificationReport {
        pathname: expected.pathname.clone(),
        status: VerificationStatus::Unreadable,
        value_count: 0,
        sample: Vec::new(),
        error_message: None,
    };

    let stored = match catalog.read_series(&expected.pathname) {
        Ok(stored) => stored,
        Err(e) => {
            report.error_message = Some(e.to_string());
            logging::warn(
                Component::Verify,
                None,
                &format!("Test read of {} failed: {}", expected.pathname, e),
            );
            return report;
        }
    };

    report.value_count = stored.value_count;
    report.sample = stored.values.iter().take(SAMPLE_SIZE).copied().collect();

    let mut problems = Vec::new();
    if stored.value_count != stored.values.len() {
        problems.push(format!(
            "stored count {} but {} values",
            stored.value_count,
            stored.values.len()
        ));
    }
    if stored.value_count != expected.value_count {
        problems.push(format!(
            "wrote {} values, read back {}",
            expected.value_count, stored.value_count
        ));
    }
    let expected_sample: Vec<f64> = expected.values.iter().take(SAMPLE_SIZE).copied().collect();
    if report.sample != expected_sample {
        problems.push(format!(
            "sample {:?} differs from written {:?}",
            report.sample, expected_sample
        ));
    }

    if problems.is_empty() {
        report.status = VerificationStatus::Success;
        logging::info(
            Component::Verify,
            None,
            &format!(
                "Test read OK: {} values, first {:?}",
                report.value_count, report.sample
            ),
        );
    } else {
        report.status = VerificationStatus::Mismatch;
        let message = problems.join("; ");
        logging::warn(
            Component::Verify,
            None,
            &format!("Verification mismatch for {}: {}", expected.pathname, message),
        );
        report.error_message = Some(message);
    }
    report
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogError;
    use crate::model::{AccumulationType, UNITS_MM};
    use chrono::NaiveDate;
    use std::collections::HashMap;

    /// In-memory store whose reads can be tampered with.
    #[derive(Default)]
    struct MemoryCatalog {
        records: HashMap<String, CatalogEntry>,
    }

    impl Catalog for MemoryCatalog {
        fn pathnames(&self) -> Result<Vec<String>, CatalogError> {
            Ok(self.records.keys().cloned().collect())
        }
        fn delete(&mut self, pathname: &str) -> Result<(), CatalogError> {
            self.records.remove(pathname);
            Ok(())
        }
        fn put_series(&mut self, entry: &CatalogEntry) -> Result<(), CatalogError> {
            self.records.insert(entry.pathname.clone(), entry.clone());
            Ok(())
        }
        fn read_series(&self, pathname: &str) -> Result<CatalogEntry, CatalogError> {
            self.records
                .get(pathname)
                .cloned()
                .ok_or_else(|| CatalogError::NotFound(pathname.to_string()))
        }
    }

    fn entry(values: Vec<f64>) -> CatalogEntry {
        CatalogEntry::daily(
            "/1/PRECIP/OBS/01JAN2024/1DAY/OBS/".to_string(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            values,
            UNITS_MM,
            AccumulationType::Incremental,
        )
    }

    #[test]
    fn test_matching_record_verifies() {
        let written = entry(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let mut catalog = MemoryCatalog::default();
        catalog.put_series(&written).unwrap();

        let report = verify_entry(&catalog, &written);
        assert_eq!(report.status, VerificationStatus::Success);
        assert_eq!(report.value_count, 7);
        assert_eq!(report.sample, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert!(report.error_message.is_none());
    }

    #[test]
    fn test_tampered_sample_is_mismatch() {
        let written = entry(vec![1.0, 2.0, 3.0]);
        let mut catalog = MemoryCatalog::default();
        catalog.put_series(&entry(vec![1.0, 2.5, 3.0])).unwrap();

        let report = verify_entry(&catalog, &written);
        assert_eq!(report.status, VerificationStatus::Mismatch);
        assert!(report.error_message.unwrap().contains("sample"));
    }

    #[test]
    fn test_inconsistent_stored_count_is_mismatch() {
        let written = entry(vec![1.0, 2.0]);
        let mut stored = written.clone();
        stored.value_count = 5;
        let mut catalog = MemoryCatalog::default();
        catalog.put_series(&stored).unwrap();

        let report = verify_entry(&catalog, &written);
        assert_eq!(report.status, VerificationStatus::Mismatch);
        assert_eq!(report.value_count, 5);
    }

    #[test]
    fn test_missing_record_is_unreadable() {
        let catalog = MemoryCatalog::default();
        let report = verify_entry(&catalog, &entry(vec![1.0]));
        assert_eq!(report.status, VerificationStatus::Unreadable);
        assert!(report.error_message.is_some());
    }
}

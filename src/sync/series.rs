/// Per-subbasin record assembly under the two accumulation policies.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::{SubbasinGroup, SyncOptions};
use crate::config::AccumulationPolicy;
use crate::model::{AccumulationType, CatalogEntry, MISSING_VALUE};
use crate::pathname::{Pathname, format_date_block};

/// Builds the catalog record for one group that has values.
///
/// Rows are sorted by date first (stable, so equal dates keep input order).
/// Under the incremental policy a blank row is stored as [`MISSING_VALUE`];
/// under the cumulative policy it counts as a missing day.
pub fn build_entry(group: &SubbasinGroup<'_>, options: &SyncOptions) -> CatalogEntry {
    let mut rows = group.rows.clone();
    rows.sort_by_key(|r| r.date);

    match options.policy {
        AccumulationPolicy::Incremental => {
            let start = rows.first().map(|r| r.date).unwrap_or_default();
            let values = rows
                .iter()
                .map(|r| r.value.unwrap_or(MISSING_VALUE))
                .collect();
            let pathname = pathname_for(group.subbasin_id, format_date_block(start), options);
            CatalogEntry::daily(
                pathname,
                start,
                values,
                &options.units,
                AccumulationType::Incremental,
            )
        }
        AccumulationPolicy::Cumulative {
            period_start,
            period_end,
        } => {
            let observed = rows
                .iter()
                .filter_map(|r| r.value.map(|v| (r.date, v)));
            let values = gap_fill(observed, period_start, period_end);
            let pathname = pathname_for(group.subbasin_id, String::new(), options);
            CatalogEntry::daily(
                pathname,
                period_start,
                values,
                &options.units,
                AccumulationType::Cumulative,
            )
        }
    }
}

/// Reindexes `(date, value)` pairs onto every day of `start..=end`.
///
/// Missing days become `0.0`, days outside the period are dropped, and the
/// last pair for a repeated date wins.
pub fn gap_fill<I>(observed: I, start: NaiveDate, end: NaiveDate) -> Vec<f64>
where
    I: IntoIterator<Item = (NaiveDate, f64)>,
{
    let by_date: BTreeMap<NaiveDate, f64> = observed
        .into_iter()
        .filter(|(date, _)| *date >= start && *date <= end)
        .collect();

    start
        .iter_days()
        .take_while(|day| *day <= end)
        .map(|day| by_date.get(&day).copied().unwrap_or(0.0))
        .collect()
}

fn pathname_for(subbasin_id: &str, date_block: String, options: &SyncOptions) -> String {
    Pathname {
        location: subbasin_id.to_string(),
        parameter: options.parameter.clone(),
        qualifier: options.qualifier.clone(),
        date_block,
        interval_label: options.interval_label.clone(),
        version: options.version.clone(),
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PrecipitationRow;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    fn rows(id: &str, data: &[(u32, f64)]) -> Vec<PrecipitationRow> {
        data.iter()
            .map(|(day, v)| PrecipitationRow::new(id, d(1, *day), *v))
            .collect()
    }

    fn group<'a>(id: &'a str, rows: &'a [PrecipitationRow]) -> SubbasinGroup<'a> {
        SubbasinGroup {
            subbasin_id: id,
            rows: rows.iter().collect(),
        }
    }

    #[test]
    fn test_incremental_sorts_and_anchors_at_first_date() {
        let data = rows("7", &[(5, 3.0), (3, 1.0), (4, 2.0)]);
        let entry = build_entry(&group("7", &data), &SyncOptions::default());
        assert_eq!(entry.pathname, "/7/PRECIP/OBS/03JAN2024/1DAY/OBS/");
        assert_eq!(entry.start_timestamp, "03JAN2024 00:00:00");
        assert_eq!(entry.values, vec![1.0, 2.0, 3.0]);
        assert_eq!(entry.value_count, 3);
        assert_eq!(entry.accumulation_type, AccumulationType::Incremental);
        assert_eq!(entry.interval_minutes, 1440);
    }

    #[test]
    fn test_incremental_keeps_gaps_and_duplicates() {
        let data = rows("7", &[(1, 1.0), (9, 9.0), (1, 1.5)]);
        let entry = build_entry(&group("7", &data), &SyncOptions::default());
        assert_eq!(entry.values, vec![1.0, 1.5, 9.0]);
    }

    #[test]
    fn test_incremental_blank_cell_keeps_later_values_on_their_dates() {
        let data = vec![
            PrecipitationRow::new("7", d(1, 1), 1.0),
            PrecipitationRow {
                subbasin_id: "7".to_string(),
                date: d(1, 2),
                value: None,
            },
            PrecipitationRow::new("7", d(1, 3), 3.0),
        ];
        let entry = build_entry(&group("7", &data), &SyncOptions::default());
        assert_eq!(entry.start_timestamp, "01JAN2024 00:00:00");
        assert_eq!(entry.value_count, 3);
        assert_eq!(entry.values, vec![1.0, MISSING_VALUE, 3.0]);
    }

    #[test]
    fn test_cumulative_blank_cell_is_a_missing_day() {
        let mut data = rows("7", &[(1, 1.0), (3, 3.0)]);
        data.insert(
            1,
            PrecipitationRow {
                subbasin_id: "7".to_string(),
                date: d(1, 2),
                value: None,
            },
        );
        let options = SyncOptions {
            policy: AccumulationPolicy::Cumulative {
                period_start: d(1, 1),
                period_end: d(1, 3),
            },
            ..SyncOptions::default()
        };
        let entry = build_entry(&group("7", &data), &options);
        assert_eq!(entry.values, vec![1.0, 0.0, 3.0]);
    }

    #[test]
    fn test_cumulative_fills_missing_days_with_zero() {
        // 10-day period, 3 days missing (3, 6, 9).
        let data = rows(
            "7",
            &[(1, 1.0), (2, 2.0), (4, 4.0), (5, 5.0), (7, 7.0), (8, 8.0), (10, 10.0)],
        );
        let options = SyncOptions {
            policy: AccumulationPolicy::Cumulative {
                period_start: d(1, 1),
                period_end: d(1, 10),
            },
            ..SyncOptions::default()
        };
        let entry = build_entry(&group("7", &data), &options);
        assert_eq!(entry.values.len(), 10);
        assert_eq!(entry.values.iter().filter(|v| **v == 0.0).count(), 3);
        assert_eq!(
            entry.values,
            vec![1.0, 2.0, 0.0, 4.0, 5.0, 0.0, 7.0, 8.0, 0.0, 10.0]
        );
        assert_eq!(entry.pathname, "/7/PRECIP/OBS//1DAY/OBS/");
        assert_eq!(entry.start_timestamp, "01JAN2024 00:00:00");
        assert_eq!(entry.accumulation_type, AccumulationType::Cumulative);
    }

    #[test]
    fn test_cumulative_starts_at_period_start_not_first_observation() {
        let data = rows("7", &[(6, 6.0)]);
        let options = SyncOptions {
            policy: AccumulationPolicy::Cumulative {
                period_start: d(1, 2),
                period_end: d(1, 7),
            },
            ..SyncOptions::default()
        };
        let entry = build_entry(&group("7", &data), &options);
        assert_eq!(entry.start_timestamp, "02JAN2024 00:00:00");
        assert_eq!(entry.values, vec![0.0, 0.0, 0.0, 0.0, 6.0, 0.0]);
    }

    #[test]
    fn test_gap_fill_drops_out_of_period_and_last_duplicate_wins() {
        let observed = vec![(d(1, 1), 9.0), (d(1, 2), 1.0), (d(1, 2), 2.0), (d(1, 4), 4.0)];
        let values = gap_fill(observed, d(1, 2), d(1, 3));
        assert_eq!(values, vec![2.0, 0.0]);
    }

    #[test]
    fn test_gap_fill_single_day_period() {
        assert_eq!(gap_fill(Vec::new(), d(2, 29), d(2, 29)), vec![0.0]);
    }
}

/// Groups flat input rows into per-subbasin series.

use std::collections::HashMap;

use crate::model::PrecipitationRow;

/// One subbasin's rows, in input order, blank cells included.
#[derive(Debug, Clone, PartialEq)]
pub struct SubbasinGroup<'a> {
    pub subbasin_id: &'a str,
    pub rows: Vec<&'a PrecipitationRow>,
}

impl SubbasinGroup<'_> {
    /// `false` when every row of the subbasin is blank.
    pub fn has_values(&self) -> bool {
        self.rows.iter().any(|r| r.value.is_some())
    }
}

/// Groups rows by subbasin in first-appearance order.
///
/// Blank rows stay in their group so a series keeps one slot per date.
pub fn group_by_subbasin(rows: &[PrecipitationRow]) -> Vec<SubbasinGroup<'_>> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<SubbasinGroup<'_>> = Vec::new();

    for row in rows {
        let idx = *positions.entry(row.subbasin_id.as_str()).or_insert_with(|| {
            groups.push(SubbasinGroup {
                subbasin_id: row.subbasin_id.as_str(),
                rows: Vec::new(),
            });
            groups.len() - 1
        });
        groups[idx].rows.push(row);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(id: &str, day: u32, value: Option<f64>) -> PrecipitationRow {
        PrecipitationRow {
            subbasin_id: id.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            value,
        }
    }

    #[test]
    fn test_groups_follow_first_appearance_not_sorted_order() {
        let rows = vec![
            row("10", 1, Some(1.0)),
            row("2", 1, Some(2.0)),
            row("10", 2, Some(3.0)),
            row("1", 1, Some(4.0)),
        ];
        let groups = group_by_subbasin(&rows);
        let ids: Vec<_> = groups.iter().map(|g| g.subbasin_id).collect();
        assert_eq!(ids, vec!["10", "2", "1"]);
        assert_eq!(groups[0].rows.len(), 2);
    }

    #[test]
    fn test_all_blank_subbasin_has_no_values() {
        let rows = vec![row("A", 1, Some(1.0)), row("B", 1, None), row("B", 2, None)];
        let groups = group_by_subbasin(&rows);
        assert_eq!(groups.len(), 2);
        assert!(groups[0].has_values());
        assert!(!groups[1].has_values(), "B has no observed values");
        assert_eq!(groups[1].rows.len(), 2);
    }

    #[test]
    fn test_blank_rows_keep_their_place_in_a_group() {
        let rows = vec![row("A", 1, Some(1.0)), row("A", 2, None), row("A", 3, Some(3.0))];
        let groups = group_by_subbasin(&rows);
        assert_eq!(groups[0].rows.len(), 3, "blank row must not be dropped");
        assert!(groups[0].has_values());
    }

    #[test]
    fn test_empty_input_has_no_groups() {
        assert!(group_by_subbasin(&[]).is_empty());
    }
}

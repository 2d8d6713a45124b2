//! Name normalization, assignment splitting, and duplicate-job merging.

use crate::ingest::parse::is_missing;
use crate::models::{Dataset, ProjectRecord};
use std::collections::HashMap;
use tracing::{debug, info};

/// Delimiters tried, in priority order, on a consultant assignment field.
pub const ASSIGNMENT_DELIMITERS: [char; 4] = [',', ';', '|', '\n'];

/// Collapse whitespace runs to one space and trim. Missing values become "".
pub fn normalize_name(name: &str) -> String {
    if is_missing(name) {
        return String::new();
    }
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split a consultant assignment field.
///
/// Only the first delimiter (by priority) present in the text is used; text
/// with no delimiter is a single name. Empty names are dropped.
pub fn split_assignments(raw: &str) -> Vec<String> {
    if is_missing(raw) {
        return Vec::new();
    }

    match ASSIGNMENT_DELIMITERS.iter().find(|d| raw.contains(**d)) {
        Some(delimiter) => raw
            .split(*delimiter)
            .map(normalize_name)
            .filter(|name| !name.is_empty())
            .collect(),
        None => {
            let name = normalize_name(raw);
            if name.is_empty() {
                Vec::new()
            } else {
                vec![name]
            }
        }
    }
}

/// Comma-only splitter used for architect fields and DAS+ explosion.
pub fn split_comma_list(raw: &str) -> Vec<String> {
    if is_missing(raw) {
        return Vec::new();
    }
    raw.split(',')
        .map(normalize_name)
        .filter(|name| !name.is_empty())
        .collect()
}

/// Merge records that share a job identifier.
///
/// Output keeps the order in which each job id first appears. Hours are
/// summed across the group (unparseable budgets count as 0), assignment
/// fields take the union of their names, everything else comes from the
/// first row.
pub fn combine_duplicate_jobs(dataset: &Dataset) -> Dataset {
    let mut order: Vec<Vec<&ProjectRecord>> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for record in &dataset.records {
        match index.get(record.job_id.as_str()) {
            Some(&slot) => order[slot].push(record),
            None => {
                index.insert(record.job_id.as_str(), order.len());
                order.push(vec![record]);
            }
        }
    }

    let mut merged_groups = 0;
    let records: Vec<ProjectRecord> = order
        .into_iter()
        .map(|group| {
            if group.len() == 1 {
                group[0].clone()
            } else {
                merged_groups += 1;
                debug!("Merging {} rows for job {}", group.len(), group[0].job_id);
                merge_group(&group)
            }
        })
        .collect();

    if merged_groups > 0 {
        info!(
            "Combined duplicate jobs: {} -> {} records ({} jobs merged)",
            dataset.len(),
            records.len(),
            merged_groups
        );
    }

    dataset.with_records(records)
}

fn merge_group(group: &[&ProjectRecord]) -> ProjectRecord {
    let mut merged = group[0].clone();

    let budget: f64 = group.iter().filter_map(|r| r.budgeted_hours).sum();
    merged.budgeted_hours = Some(budget);
    merged.budget_raw = budget.to_string();
    merged.actual_hours = group.iter().map(|r| r.actual_hours).sum();

    if let Some(names) = union_names(group, |r| split_assignments(&r.consultants_raw)) {
        merged.consultants_raw = names;
    }
    if let Some(names) = union_names(group, |r| split_comma_list(&r.architects_raw)) {
        merged.architects_raw = names;
    }
    if let Some(managers) = union_names(group, |r| {
        let value = r.account_manager.trim();
        if is_missing(value) {
            Vec::new()
        } else {
            vec![value.to_string()]
        }
    }) {
        merged.account_manager = managers;
    }

    merged
}

/// Distinct values in first-seen order, joined with ", ". `None` if there are none.
fn union_names<F>(group: &[&ProjectRecord], extract: F) -> Option<String>
where
    F: Fn(&ProjectRecord) -> Vec<String>,
{
    let mut seen: Vec<String> = Vec::new();
    for record in group {
        for name in extract(record) {
            if !seen.contains(&name) {
                seen.push(name);
            }
        }
    }

    if seen.is_empty() {
        None
    } else {
        Some(seen.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldPresence;

    fn make_record(job: &str, budget: Option<f64>, actual: f64, consultants: &str) -> ProjectRecord {
        let mut record = ProjectRecord::new(job, budget, actual);
        record.consultants_raw = consultants.to_string();
        record
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Ann   Lee  "), "Ann Lee");
        assert_eq!(normalize_name("Ann\tLee"), "Ann Lee");
        assert_eq!(normalize_name("McDONALD"), "McDONALD");
        assert_eq!(normalize_name(""), "");
        assert_eq!(normalize_name("N/A"), "");
    }

    #[test]
    fn test_split_assignments_priority() {
        assert_eq!(split_assignments("Ann Lee, Bob Ray"), vec!["Ann Lee", "Bob Ray"]);
        assert_eq!(split_assignments("Ann Lee; Bob Ray"), vec!["Ann Lee", "Bob Ray"]);
        assert_eq!(split_assignments("Ann | Bob |"), vec!["Ann", "Bob"]);
        assert_eq!(split_assignments("Ann\nBob"), vec!["Ann", "Bob"]);
        // Comma wins; the semicolon stays inside a name
        assert_eq!(split_assignments("Ann; Bob, Cy"), vec!["Ann; Bob", "Cy"]);
        assert_eq!(split_assignments("  Ann   Lee "), vec!["Ann Lee"]);
        assert!(split_assignments("").is_empty());
        assert!(split_assignments(" , ").is_empty());
    }

    #[test]
    fn test_split_comma_list_ignores_other_delimiters() {
        assert_eq!(split_comma_list("A; B, C"), vec!["A; B", "C"]);
        assert!(split_comma_list("n/a").is_empty());
    }

    #[test]
    fn test_combine_sums_and_unions() {
        let dataset = Dataset::new(
            FieldPresence::all(),
            vec![
                make_record("J1", Some(100.0), 40.0, "Ann, Bob"),
                make_record("J2", Some(50.0), 10.0, "Cy"),
                make_record("J1", None, 30.0, "Bob; Dee"),
                make_record("J1", Some(20.0), 5.0, "N/A"),
            ],
        );

        let merged = combine_duplicate_jobs(&dataset);
        assert_eq!(merged.len(), 2);

        let j1 = &merged.records[0];
        assert_eq!(j1.job_id, "J1");
        assert_eq!(j1.budgeted_hours, Some(120.0));
        assert_eq!(j1.actual_hours, 75.0);
        assert_eq!(j1.consultants_raw, "Ann, Bob, Dee");
        assert_eq!(merged.records[1].job_id, "J2");
    }

    #[test]
    fn test_single_row_groups_pass_through() {
        let mut record = make_record("J9", Some(10.0), 1.0, "Ann;Bob");
        record.status = "Open".to_string();
        let dataset = Dataset::new(FieldPresence::all(), vec![record.clone()]);

        let merged = combine_duplicate_jobs(&dataset);
        assert_eq!(merged.records, vec![record]);
    }

    #[test]
    fn test_merge_keeps_first_row_fields() {
        let mut first = make_record("J1", Some(10.0), 1.0, "");
        first.customer = "Acme".to_string();
        first.architects_raw = "Sam".to_string();
        let mut second = make_record("J1", Some(10.0), 1.0, "");
        second.customer = "Other".to_string();
        second.architects_raw = "Sam, Tia".to_string();

        let merged = combine_duplicate_jobs(&Dataset::new(FieldPresence::all(), vec![first, second]));
        let record = &merged.records[0];
        assert_eq!(record.customer, "Acme");
        assert_eq!(record.architects_raw, "Sam, Tia");
        assert_eq!(record.consultants_raw, "");
    }
}

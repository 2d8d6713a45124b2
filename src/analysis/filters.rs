//! Filter pipeline.
//!
//! Every filter takes a snapshot and returns a new one; nothing mutates
//! records in place. The allow-lists and exclusion pairs live in a
//! [`Roster`] shared by all scoring stages.

use super::normalize::{normalize_name, split_assignments, split_comma_list};
use crate::models::{Dataset, MissingBudget, ProjectRecord};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

/// Drop one entity's attribution for one job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExclusionRule {
    pub entity: String,
    pub job_id: String,
}

impl ExclusionRule {
    pub fn new(entity: &str, job_id: &str) -> Self {
        Self {
            entity: normalize_name(entity),
            job_id: job_id.trim().to_string(),
        }
    }
}

/// Tracked consultants, tracked architects, and exclusion pairs.
///
/// An empty allow-list tracks everyone in that role.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    consultants: HashSet<String>,
    architects: HashSet<String>,
    exclusions: HashSet<ExclusionRule>,
}

impl Roster {
    pub fn new(consultants: Vec<String>, architects: Vec<String>, exclusions: Vec<ExclusionRule>) -> Self {
        Self {
            consultants: consultants.iter().map(|n| normalize_name(n)).collect(),
            architects: architects.iter().map(|n| normalize_name(n)).collect(),
            exclusions: exclusions.into_iter().collect(),
        }
    }

    pub fn tracked_consultants(&self) -> usize {
        self.consultants.len()
    }

    pub fn tracked_architects(&self) -> usize {
        self.architects.len()
    }

    pub fn exclusion_count(&self) -> usize {
        self.exclusions.len()
    }

    pub fn tracks_consultant(&self, name: &str) -> bool {
        self.consultants.is_empty() || self.consultants.contains(name)
    }

    pub fn tracks_architect(&self, name: &str) -> bool {
        self.architects.is_empty() || self.architects.contains(name)
    }

    pub fn is_excluded(&self, name: &str, job_id: &str) -> bool {
        !self.exclusions.is_empty()
            && self.exclusions.contains(&ExclusionRule {
                entity: name.to_string(),
                job_id: job_id.to_string(),
            })
    }

    /// Tracked and not excluded from this job.
    pub fn admits_consultant(&self, name: &str, job_id: &str) -> bool {
        self.tracks_consultant(name) && !self.is_excluded(name, job_id)
    }

    /// Tracked and not excluded from this job.
    pub fn admits_architect(&self, name: &str, job_id: &str) -> bool {
        self.tracks_architect(name) && !self.is_excluded(name, job_id)
    }

    /// Whether any assigned consultant or architect is tracked.
    pub fn is_tracked_project(&self, record: &ProjectRecord) -> bool {
        split_assignments(&record.consultants_raw)
            .iter()
            .any(|name| self.tracks_consultant(name))
            || split_comma_list(&record.architects_raw)
                .iter()
                .any(|name| self.tracks_architect(name))
    }
}

/// Budget parses and is positive.
pub fn passes_validity(record: &ProjectRecord) -> bool {
    record.valid_budget().is_some()
}

/// Status does not mention cancellation.
pub fn passes_cancellation(record: &ProjectRecord) -> bool {
    !record.is_cancelled()
}

/// Valid budget and not cancelled: the records every scoring stage uses.
pub fn is_scorable(record: &ProjectRecord) -> bool {
    passes_validity(record) && passes_cancellation(record)
}

/// Keep records matching `predicate`.
pub fn retain(dataset: &Dataset, predicate: impl Fn(&ProjectRecord) -> bool) -> Dataset {
    dataset.with_records(dataset.records.iter().filter(|r| predicate(r)).cloned().collect())
}

/// Records with an unparseable or non-positive budget, for the missing-budget report.
pub fn missing_budget_report(dataset: &Dataset) -> Vec<MissingBudget> {
    dataset
        .records
        .iter()
        .filter(|r| !passes_validity(r))
        .map(|r| MissingBudget {
            job_id: r.job_id.clone(),
            customer: r.customer.clone(),
            description: r.description.clone(),
            budget_raw: r.budget_raw.clone(),
        })
        .collect()
}

/// Closed projects that ended before `cutoff` fall outside the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub cutoff: NaiveDate,
}

impl DateWindow {
    pub fn new(cutoff: NaiveDate) -> Self {
        Self { cutoff }
    }

    /// Open projects and unparseable dates are always retained.
    pub fn retains(&self, is_closed: bool, end_date: Option<NaiveDate>) -> bool {
        match end_date {
            Some(end) if is_closed => end >= self.cutoff,
            _ => true,
        }
    }

    pub fn retains_record(&self, record: &ProjectRecord) -> bool {
        self.retains(record.is_closed(), record.end_date)
    }
}

/// What the date window did to a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateWindowSummary {
    pub cutoff: NaiveDate,
    pub excluded: usize,
    pub remaining: usize,
}

/// Apply the window, if any.
///
/// Without an end-date field there is nothing to compare, so the dataset
/// passes through and the summary reports no exclusions.
pub fn apply_date_window(
    dataset: &Dataset,
    window: Option<DateWindow>,
) -> (Dataset, Option<DateWindowSummary>) {
    let Some(window) = window else {
        return (dataset.clone(), None);
    };

    let filtered = if dataset.fields.end_date {
        retain(dataset, |r| window.retains_record(r))
    } else {
        debug!("No end date field - date window has nothing to compare");
        dataset.clone()
    };

    let excluded = dataset.len() - filtered.len();
    info!(
        "Date window: excluded {} closed projects ending before {}",
        excluded, window.cutoff
    );

    let summary = DateWindowSummary {
        cutoff: window.cutoff,
        excluded,
        remaining: filtered.len(),
    };
    (filtered, Some(summary))
}

/// One record per job id among tracked, budgeted projects, in input order.
pub fn tracked_budgeted_projects<'a>(dataset: &'a Dataset, roster: &Roster) -> Vec<&'a ProjectRecord> {
    let mut seen: HashSet<&str> = HashSet::new();
    dataset
        .records
        .iter()
        .filter(|r| passes_validity(r) && roster.is_tracked_project(r))
        .filter(|r| seen.insert(r.job_id.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldPresence;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn closed_on(job: &str, status: &str, end: Option<NaiveDate>) -> ProjectRecord {
        let mut record = ProjectRecord::new(job, Some(10.0), 10.0);
        record.status = status.to_string();
        record.end_date = end;
        record
    }

    #[test]
    fn test_roster_empty_tracks_everyone() {
        let roster = Roster::default();
        assert!(roster.tracks_consultant("Anyone"));
        assert!(roster.admits_architect("Anyone", "J1"));
    }

    #[test]
    fn test_roster_allow_list_and_exclusions() {
        let roster = Roster::new(
            vec!["Ann  Lee".to_string()],
            vec![],
            vec![ExclusionRule::new("Ann Lee", "J2")],
        );

        assert!(roster.tracks_consultant("Ann Lee"));
        assert!(!roster.tracks_consultant("Bob Ray"));
        assert!(roster.admits_consultant("Ann Lee", "J1"));
        assert!(!roster.admits_consultant("Ann Lee", "J2"));
        // Exclusions apply to architects with the same name too
        assert!(!roster.admits_architect("Ann Lee", "J2"));
    }

    #[test]
    fn test_is_tracked_project_either_role() {
        let roster = Roster::new(vec!["Ann".to_string()], vec!["Sam".to_string()], vec![]);

        let mut record = ProjectRecord::new("J1", Some(10.0), 5.0);
        record.consultants_raw = "Bob; Ann".to_string();
        assert!(roster.is_tracked_project(&record));

        record.consultants_raw = "Bob".to_string();
        assert!(!roster.is_tracked_project(&record));

        record.architects_raw = "Tia, Sam".to_string();
        assert!(roster.is_tracked_project(&record));
    }

    #[test]
    fn test_scorable_predicates() {
        let mut record = ProjectRecord::new("J1", Some(10.0), 5.0);
        assert!(is_scorable(&record));

        record.status = "Cancelled".to_string();
        assert!(!is_scorable(&record));

        let zero = ProjectRecord::new("J2", Some(0.0), 5.0);
        assert!(!passes_validity(&zero));
        assert!(passes_cancellation(&zero));
    }

    #[test]
    fn test_missing_budget_report() {
        let mut bad = ProjectRecord::new("J2", None, 5.0);
        bad.budget_raw = "TBD".to_string();
        bad.customer = "Acme".to_string();
        let dataset = Dataset::new(
            FieldPresence::all(),
            vec![ProjectRecord::new("J1", Some(10.0), 5.0), bad],
        );

        let missing = missing_budget_report(&dataset);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].job_id, "J2");
        assert_eq!(missing[0].budget_raw, "TBD");
    }

    #[test]
    fn test_date_window_retains() {
        let window = DateWindow::new(date(2024, 1, 1));
        assert!(!window.retains(true, Some(date(2023, 12, 31))));
        assert!(window.retains(true, Some(date(2024, 1, 1))));
        assert!(window.retains(false, Some(date(2020, 1, 1))));
        assert!(window.retains(true, None));
    }

    #[test]
    fn test_apply_date_window() {
        let dataset = Dataset::new(
            FieldPresence::all(),
            vec![
                closed_on("J1", "Closed", Some(date(2023, 6, 1))),
                closed_on("J2", "Open", Some(date(2023, 6, 1))),
                closed_on("J3", "Closed", None),
                closed_on("J4", "Closed", Some(date(2024, 6, 1))),
                // Not exactly "closed": retained
                closed_on("J5", "Closed - Won", Some(date(2023, 6, 1))),
            ],
        );

        let (filtered, summary) = apply_date_window(&dataset, Some(DateWindow::new(date(2024, 1, 1))));
        let ids: Vec<&str> = filtered.records.iter().map(|r| r.job_id.as_str()).collect();
        assert_eq!(ids, vec!["J2", "J3", "J4", "J5"]);

        let summary = summary.unwrap();
        assert_eq!(summary.excluded, 1);
        assert_eq!(summary.remaining, 4);

        let (same, none) = apply_date_window(&dataset, None);
        assert_eq!(same, dataset);
        assert!(none.is_none());
    }

    #[test]
    fn test_date_window_without_end_date_field() {
        let mut fields = FieldPresence::all();
        fields.end_date = false;
        let dataset = Dataset::new(fields, vec![closed_on("J1", "Closed", None)]);

        let (filtered, summary) = apply_date_window(&dataset, Some(DateWindow::new(date(2024, 1, 1))));
        assert_eq!(filtered.len(), 1);
        assert_eq!(summary.unwrap().excluded, 0);
    }

    #[test]
    fn test_tracked_budgeted_projects_dedups() {
        let mut a = ProjectRecord::new("J1", Some(10.0), 5.0);
        a.consultants_raw = "Ann".to_string();
        let b = a.clone();
        let mut c = ProjectRecord::new("J2", None, 5.0);
        c.consultants_raw = "Ann".to_string();
        let d = ProjectRecord::new("J3", Some(10.0), 5.0);

        let dataset = Dataset::new(FieldPresence::all(), vec![a, b, c, d]);
        let projects = tracked_budgeted_projects(&dataset, &Roster::default());
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].job_id, "J1");
    }
}

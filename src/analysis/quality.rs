//! Project status consistency check.

use crate::config::{days_before, QualityCheckConfig};
use crate::ingest::parse::is_missing;
use crate::models::{Dataset, ProjectRecord};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityIssueKind {
    /// Job still open while the project closed long ago.
    StaleOpenJob,
    /// Project status is blank or N/A.
    MissingStatus,
}

impl fmt::Display for QualityIssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityIssueKind::StaleOpenJob => write!(f, "Open job on old closed project"),
            QualityIssueKind::MissingStatus => write!(f, "Missing project status"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityIssue {
    pub kind: QualityIssueKind,
    pub job_id: String,
    pub customer: String,
    pub job_status: String,
    pub project_status: String,
    pub end_date: Option<NaiveDate>,
}

impl QualityIssue {
    fn new(kind: QualityIssueKind, record: &ProjectRecord) -> Self {
        Self {
            kind,
            job_id: record.job_id.clone(),
            customer: record.customer.clone(),
            job_status: record.job_status.clone(),
            project_status: record.status.clone(),
            end_date: record.end_date,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Closing date threshold used for the stale check, if it ran.
    pub stale_before: Option<NaiveDate>,
    pub issues: Vec<QualityIssue>,
}

impl QualityReport {
    pub fn count(&self, kind: QualityIssueKind) -> usize {
        self.issues.iter().filter(|i| i.kind == kind).count()
    }
}

/// Flag open jobs on projects that closed more than `old_project_days`
/// before `today`, and (optionally) projects with no status.
///
/// Runs on the merged dataset before any filtering so nothing is hidden.
pub fn check_status_consistency(
    dataset: &Dataset,
    config: &QualityCheckConfig,
    today: NaiveDate,
) -> QualityReport {
    let fields = dataset.fields;
    if !fields.status {
        return QualityReport::default();
    }

    let stale_before = if fields.job_status && fields.end_date {
        let before = days_before(today, config.old_project_days);
        if before.is_none() {
            warn!(
                "old_project_days ({}) reaches past the earliest supported date - stale job check skipped",
                config.old_project_days
            );
        }
        before
    } else {
        None
    };

    let issues: Vec<QualityIssue> = dataset
        .records
        .iter()
        .filter_map(|record| {
            let stale = stale_before.is_some_and(|before| {
                record.job_status.trim().eq_ignore_ascii_case("open")
                    && record.is_closed()
                    && record.end_date.is_some_and(|end| end < before)
            });

            if stale {
                Some(QualityIssue::new(QualityIssueKind::StaleOpenJob, record))
            } else if config.include_na_status && is_missing(&record.status) {
                Some(QualityIssue::new(QualityIssueKind::MissingStatus, record))
            } else {
                None
            }
        })
        .collect();

    if !issues.is_empty() {
        info!("Status check flagged {} projects", issues.len());
    }

    QualityReport {
        stale_before,
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldPresence;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(job: &str, job_status: &str, status: &str, end: Option<NaiveDate>) -> ProjectRecord {
        let mut r = ProjectRecord::new(job, Some(10.0), 5.0);
        r.job_status = job_status.to_string();
        r.status = status.to_string();
        r.end_date = end;
        r
    }

    #[test]
    fn test_flags_stale_and_missing() {
        let dataset = Dataset::new(
            FieldPresence::all(),
            vec![
                record("J1", "Open", "Closed", Some(date(2020, 1, 1))),
                record("J2", "Open", "Closed", Some(date(2025, 1, 1))),
                record("J3", "Closed", "Closed", Some(date(2020, 1, 1))),
                record("J4", "Open", "", None),
                record("J5", "Open", "Open", None),
            ],
        );

        let report = check_status_consistency(&dataset, &QualityCheckConfig::default(), date(2025, 7, 1));
        let flagged: Vec<(&str, QualityIssueKind)> =
            report.issues.iter().map(|i| (i.job_id.as_str(), i.kind)).collect();
        assert_eq!(
            flagged,
            vec![
                ("J1", QualityIssueKind::StaleOpenJob),
                ("J4", QualityIssueKind::MissingStatus)
            ]
        );
        assert_eq!(report.stale_before, Some(date(2023, 7, 2)));
        assert_eq!(report.count(QualityIssueKind::MissingStatus), 1);
    }

    #[test]
    fn test_missing_status_can_be_disabled() {
        let dataset = Dataset::new(FieldPresence::all(), vec![record("J1", "Open", "N/A", None)]);
        let config = QualityCheckConfig {
            include_na_status: false,
            ..Default::default()
        };
        assert!(check_status_consistency(&dataset, &config, date(2025, 7, 1)).issues.is_empty());
    }

    #[test]
    fn test_without_job_status_only_missing_check_runs() {
        let mut fields = FieldPresence::all();
        fields.job_status = false;
        let dataset = Dataset::new(
            fields,
            vec![
                record("J1", "", "Closed", Some(date(2010, 1, 1))),
                record("J2", "", "", None),
            ],
        );

        let report = check_status_consistency(&dataset, &QualityCheckConfig::default(), date(2025, 7, 1));
        assert_eq!(report.stale_before, None);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].kind, QualityIssueKind::MissingStatus);
    }

    #[test]
    fn test_huge_stale_window_skips_stale_check() {
        let dataset = Dataset::new(
            FieldPresence::all(),
            vec![
                record("J1", "Open", "Closed", Some(date(2020, 1, 1))),
                record("J2", "Open", "", None),
            ],
        );
        let config = QualityCheckConfig {
            old_project_days: 200_000_000,
            ..Default::default()
        };

        let report = check_status_consistency(&dataset, &config, date(2025, 7, 1));
        assert_eq!(report.stale_before, None);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].kind, QualityIssueKind::MissingStatus);
    }
}

//! Data models for the metrics analyzer.
//!
//! This module contains the project record every stage consumes, the
//! per-entity metrics tables the scorer produces, and the report
//! envelope handed to the writers.

use crate::config::Thresholds;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One project row after field resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    /// Job identifier; the grouping key.
    pub job_id: String,
    /// Budgeted hours, `None` when the cell did not parse.
    pub budgeted_hours: Option<f64>,
    /// Budget cell as it appeared in the input.
    pub budget_raw: String,
    /// Actual hours posted, 0 when the cell did not parse.
    pub actual_hours: f64,
    /// Project status text ("Open", "Closed", "On Hold", ...).
    pub status: String,
    /// Job status text, used only by the data-quality check.
    pub job_status: String,
    /// Completion percentage (0-100), `None` when missing or unparseable.
    pub completion_pct: Option<f64>,
    /// End date, `None` when missing or in no recognized format.
    pub end_date: Option<NaiveDate>,
    pub customer: String,
    pub account_manager: String,
    /// Raw consultant assignment field (delimited list).
    pub consultants_raw: String,
    /// Raw solution-architect assignment field (comma-separated).
    pub architects_raw: String,
    pub description: String,
}

impl ProjectRecord {
    /// Creates a record with only the identifier and hours set.
    pub fn new(job_id: impl Into<String>, budgeted_hours: Option<f64>, actual_hours: f64) -> Self {
        Self {
            job_id: job_id.into(),
            budgeted_hours,
            budget_raw: budgeted_hours.map(|b| b.to_string()).unwrap_or_default(),
            actual_hours,
            status: String::new(),
            job_status: String::new(),
            completion_pct: None,
            end_date: None,
            customer: String::new(),
            account_manager: String::new(),
            consultants_raw: String::new(),
            architects_raw: String::new(),
            description: String::new(),
        }
    }

    /// The budget when it is a positive number.
    pub fn valid_budget(&self) -> Option<f64> {
        self.budgeted_hours.filter(|b| *b > 0.0)
    }

    /// `(actual - budget) / budget`, or `None` without a valid budget.
    pub fn variance(&self) -> Option<f64> {
        self.valid_budget()
            .map(|budget| (self.actual_hours - budget) / budget)
    }

    pub fn is_cancelled(&self) -> bool {
        self.status.to_lowercase().contains("cancel")
    }

    pub fn is_on_hold(&self) -> bool {
        self.status.to_lowercase().contains("hold")
    }

    /// Exact (case-insensitive) "closed" status.
    pub fn is_closed(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case("closed")
    }
}

/// Which optional logical fields the input actually carried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPresence {
    pub consultants: bool,
    pub architects: bool,
    pub status: bool,
    pub job_status: bool,
    pub end_date: bool,
    pub completion: bool,
    pub customer: bool,
}

impl FieldPresence {
    /// Every optional field present.
    #[cfg(test)]
    pub fn all() -> Self {
        Self {
            consultants: true,
            architects: true,
            status: true,
            job_status: true,
            end_date: true,
            completion: true,
            customer: true,
        }
    }
}

/// An immutable snapshot passed between stages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub fields: FieldPresence,
    pub records: Vec<ProjectRecord>,
}

impl Dataset {
    pub fn new(fields: FieldPresence, records: Vec<ProjectRecord>) -> Self {
        Self { fields, records }
    }

    /// A new snapshot with the same schema and a different record set.
    pub fn with_records(&self, records: Vec<ProjectRecord>) -> Self {
        Self {
            fields: self.fields,
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Scoring role. The same name is scored independently in each role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Consultant,
    SolutionArchitect,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Consultant => write!(f, "Consultant"),
            Role::SolutionArchitect => write!(f, "Solution Architect"),
        }
    }
}

/// Color band of a project's variance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarianceBand {
    /// Under budget beyond the green threshold.
    Green,
    /// Between green and yellow.
    Neutral,
    /// Over the yellow threshold.
    Yellow,
    /// Over the red threshold.
    Red,
}

impl VarianceBand {
    pub fn classify(variance: f64, thresholds: &Thresholds) -> Self {
        if variance < thresholds.green_threshold {
            VarianceBand::Green
        } else if variance > thresholds.red_threshold {
            VarianceBand::Red
        } else if variance > thresholds.yellow_threshold {
            VarianceBand::Yellow
        } else {
            VarianceBand::Neutral
        }
    }

    /// Returns an emoji representation of the band.
    pub fn emoji(&self) -> &'static str {
        match self {
            VarianceBand::Green => "🟢",
            VarianceBand::Neutral => "⚪",
            VarianceBand::Yellow => "🟡",
            VarianceBand::Red => "🔴",
        }
    }
}

impl fmt::Display for VarianceBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarianceBand::Green => write!(f, "Green"),
            VarianceBand::Neutral => write!(f, "Neutral"),
            VarianceBand::Yellow => write!(f, "Yellow"),
            VarianceBand::Red => write!(f, "Red"),
        }
    }
}

/// A project as it appears in an entity's detail table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDetail {
    pub job_id: String,
    pub customer: String,
    pub description: String,
    /// Hours as attributed to the entity (apportioned for architects).
    pub budgeted_hours: f64,
    pub actual_hours: f64,
    /// Whole-project variance, in percent.
    pub variance_pct: f64,
    pub band: VarianceBand,
}

/// Metrics for one consultant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultantMetrics {
    pub name: String,
    pub unique_projects: usize,
    pub total_hours: f64,
    /// Percent of projects within the efficiency threshold.
    pub efficiency_score: f64,
    /// Percent of projects within the success threshold.
    pub success_ratio: f64,
    pub composite_score: f64,
    pub projects_within_budget: usize,
    pub projects_over_budget: usize,
    pub projects_on_hold: usize,
    pub projects: Vec<ProjectDetail>,
}

/// Metrics for one solution architect, with apportioned hours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchitectMetrics {
    pub name: String,
    pub total_projects: usize,
    pub successful_projects: usize,
    pub failed_projects: usize,
    pub success_rate: f64,
    pub total_budgeted_hours: f64,
    pub total_actual_hours: f64,
    pub composite_score: f64,
    pub projects: Vec<ProjectDetail>,
}

impl ArchitectMetrics {
    /// Variance of the apportioned totals, in percent.
    pub fn variance_pct(&self) -> f64 {
        if self.total_budgeted_hours > 0.0 {
            (self.total_actual_hours - self.total_budgeted_hours) / self.total_budgeted_hours
                * 100.0
        } else {
            0.0
        }
    }
}

/// A metric that can be compared across periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendMetric {
    UniqueProjects,
    TotalHours,
    EfficiencyScore,
    SuccessRatio,
    CompositeScore,
    ProjectsWithinBudget,
    ProjectsOverBudget,
    ProjectsOnHold,
}

impl fmt::Display for TrendMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrendMetric::UniqueProjects => "unique_projects",
            TrendMetric::TotalHours => "total_hours",
            TrendMetric::EfficiencyScore => "efficiency_score",
            TrendMetric::SuccessRatio => "success_ratio",
            TrendMetric::CompositeScore => "composite_score",
            TrendMetric::ProjectsWithinBudget => "projects_within_budget",
            TrendMetric::ProjectsOverBudget => "projects_over_budget",
            TrendMetric::ProjectsOnHold => "projects_on_hold",
        };
        write!(f, "{}", name)
    }
}

impl ConsultantMetrics {
    pub fn metric(&self, metric: TrendMetric) -> Option<f64> {
        Some(match metric {
            TrendMetric::UniqueProjects => self.unique_projects as f64,
            TrendMetric::TotalHours => self.total_hours,
            TrendMetric::EfficiencyScore => self.efficiency_score,
            TrendMetric::SuccessRatio => self.success_ratio,
            TrendMetric::CompositeScore => self.composite_score,
            TrendMetric::ProjectsWithinBudget => self.projects_within_budget as f64,
            TrendMetric::ProjectsOverBudget => self.projects_over_budget as f64,
            TrendMetric::ProjectsOnHold => self.projects_on_hold as f64,
        })
    }
}

impl ArchitectMetrics {
    /// Architects have no efficiency score or hold count.
    pub fn metric(&self, metric: TrendMetric) -> Option<f64> {
        match metric {
            TrendMetric::UniqueProjects => Some(self.total_projects as f64),
            TrendMetric::TotalHours => Some(self.total_actual_hours),
            TrendMetric::SuccessRatio => Some(self.success_rate),
            TrendMetric::CompositeScore => Some(self.composite_score),
            TrendMetric::ProjectsWithinBudget => Some(self.successful_projects as f64),
            TrendMetric::ProjectsOverBudget => Some(self.failed_projects as f64),
            TrendMetric::EfficiencyScore | TrendMetric::ProjectsOnHold => None,
        }
    }
}

/// A record that failed the validity filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingBudget {
    pub job_id: String,
    pub customer: String,
    pub description: String,
    pub budget_raw: String,
}

/// Metadata about the analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Projects file that was analyzed.
    pub input_file: String,
    /// Date and time of the analysis.
    pub analysis_date: DateTime<Utc>,
    /// Date used as "today" for windows and age checks.
    pub reference_date: NaiveDate,
    /// Size of the consultant allow-list (0 = everyone).
    pub tracked_consultants: usize,
    /// Size of the architect allow-list (0 = everyone).
    pub tracked_architects: usize,
    pub exclusion_rules: usize,
    /// Whether rankings print composite scores.
    #[serde(default)]
    pub show_composite: bool,
    /// Duration of the analysis in seconds.
    pub duration_seconds: f64,
}

/// The complete analysis report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    #[serde(flatten)]
    pub analysis: crate::analysis::AnalysisOutput,
    /// Present when two or more periods were compared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trends: Option<crate::analysis::trend::TrendReport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variance_requires_positive_budget() {
        let record = ProjectRecord::new("J1", Some(100.0), 95.0);
        assert!((record.variance().unwrap() + 0.05).abs() < 1e-12);

        assert_eq!(ProjectRecord::new("J2", Some(0.0), 10.0).variance(), None);
        assert_eq!(ProjectRecord::new("J3", None, 10.0).variance(), None);
        assert_eq!(ProjectRecord::new("J4", Some(-5.0), 10.0).variance(), None);
    }

    #[test]
    fn test_status_predicates() {
        let mut record = ProjectRecord::new("J1", Some(10.0), 0.0);
        record.status = "Cancelled - client request".to_string();
        assert!(record.is_cancelled());
        assert!(!record.is_closed());

        record.status = " CLOSED ".to_string();
        assert!(record.is_closed());

        record.status = "On Hold".to_string();
        assert!(record.is_on_hold());
    }

    #[test]
    fn test_variance_band_classify() {
        let thresholds = Thresholds::default();
        assert_eq!(VarianceBand::classify(-0.2, &thresholds), VarianceBand::Green);
        assert_eq!(VarianceBand::classify(0.0, &thresholds), VarianceBand::Neutral);
        assert_eq!(VarianceBand::classify(0.2, &thresholds), VarianceBand::Yellow);
        assert_eq!(VarianceBand::classify(0.31, &thresholds), VarianceBand::Red);
        assert_eq!(VarianceBand::classify(0.30, &thresholds), VarianceBand::Yellow);
    }

    #[test]
    fn test_architect_metric_lookup() {
        let metrics = ArchitectMetrics {
            name: "A".to_string(),
            total_projects: 4,
            successful_projects: 3,
            failed_projects: 1,
            success_rate: 75.0,
            total_budgeted_hours: 200.0,
            total_actual_hours: 250.0,
            composite_score: 15.0,
            projects: Vec::new(),
        };
        assert_eq!(metrics.metric(TrendMetric::SuccessRatio), Some(75.0));
        assert_eq!(metrics.metric(TrendMetric::EfficiencyScore), None);
        assert!((metrics.variance_pct() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_trend_metric_display_matches_serde() {
        let json = serde_json::to_string(&TrendMetric::ProjectsOnHold).unwrap();
        assert_eq!(json, format!("\"{}\"", TrendMetric::ProjectsOnHold));
    }
}

//! Portfolio-level aggregation and summary statistics.
//!
//! This module provides ranking helpers shared by the scoring stages and
//! computes the company-wide, practice-wide, and forecast summaries.

use super::filters::{tracked_budgeted_projects, Roster};
use super::normalize::split_assignments;
use crate::config::Thresholds;
use crate::models::{ConsultantMetrics, Dataset};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// `part / whole * 100`, or 0 when `whole` is 0.
pub fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Stable sort, highest key first.
pub fn sort_desc_by<T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> f64,
{
    items.sort_by(|a, b| key(b).partial_cmp(&key(a)).unwrap_or(std::cmp::Ordering::Equal));
}

/// Get the top N items by `key`.
pub fn top_n<T: Clone, F>(items: &[T], n: usize, key: F) -> Vec<T>
where
    F: Fn(&T) -> f64,
{
    let mut sorted: Vec<T> = items.to_vec();
    sort_desc_by(&mut sorted, key);
    sorted.truncate(n);
    sorted
}

/// Within/over budget across every budget-valid project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyPerformance {
    pub total_projects: usize,
    pub within_budget: usize,
    pub over_budget: usize,
    pub success_rate: f64,
}

pub fn company_performance(dataset: &Dataset, thresholds: &Thresholds) -> CompanyPerformance {
    let variances: Vec<f64> = dataset
        .records
        .iter()
        .filter_map(|r| r.variance())
        .collect();

    let within = variances
        .iter()
        .filter(|v| **v <= thresholds.success_threshold)
        .count();

    CompanyPerformance {
        total_projects: variances.len(),
        within_budget: within,
        over_budget: variances.len() - within,
        success_rate: percent(within, variances.len()),
    }
}

/// Unique projects with at least one tracked consultant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PracticeSummary {
    pub tracked_projects: usize,
    pub within_budget: usize,
    pub over_budget: usize,
    /// Tracked projects left out for lack of a valid budget.
    pub missing_budget: usize,
}

pub fn practice_summary(dataset: &Dataset, roster: &Roster, thresholds: &Thresholds) -> PracticeSummary {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut summary = PracticeSummary::default();

    for record in &dataset.records {
        if record.is_cancelled()
            || !split_assignments(&record.consultants_raw)
                .iter()
                .any(|name| roster.tracks_consultant(name))
            || !seen.insert(record.job_id.as_str())
        {
            continue;
        }

        summary.tracked_projects += 1;
        match record.variance() {
            Some(v) if v <= thresholds.success_threshold => summary.within_budget += 1,
            Some(_) => summary.over_budget += 1,
            None => summary.missing_budget += 1,
        }
    }

    summary
}

/// Budget size classes used by the forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeBucket {
    Small,
    Medium,
    Large,
}

impl SizeBucket {
    pub const ALL: [SizeBucket; 3] = [SizeBucket::Small, SizeBucket::Medium, SizeBucket::Large];

    /// `< 100` small, `100..=500` medium, `> 500` large.
    pub fn for_budget(budget: f64) -> Self {
        if budget < 100.0 {
            SizeBucket::Small
        } else if budget <= 500.0 {
            SizeBucket::Medium
        } else {
            SizeBucket::Large
        }
    }
}

impl fmt::Display for SizeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeBucket::Small => write!(f, "Small (<100h)"),
            SizeBucket::Medium => write!(f, "Medium (100-500h)"),
            SizeBucket::Large => write!(f, "Large (>500h)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketForecast {
    pub bucket: SizeBucket,
    pub projects: usize,
    pub success_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultantForecast {
    pub name: String,
    pub efficiency_score: f64,
    pub predicted_success: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub buckets: Vec<BucketForecast>,
    pub top_performers: Vec<ConsultantForecast>,
}

/// Consultants carried into the forecast.
pub const FORECAST_TOP_PERFORMERS: usize = 3;
/// Ceiling on a predicted success rate.
pub const FORECAST_CEILING: f64 = 95.0;

/// Historical success rate per budget size, plus a naive outlook for the
/// most efficient consultants. Empty buckets are omitted.
pub fn forecast(
    dataset: &Dataset,
    roster: &Roster,
    thresholds: &Thresholds,
    consultants: &[ConsultantMetrics],
) -> Forecast {
    let projects = tracked_budgeted_projects(dataset, roster);

    let buckets = SizeBucket::ALL
        .iter()
        .filter_map(|bucket| {
            let variances: Vec<f64> = projects
                .iter()
                .filter(|r| r.valid_budget().map(SizeBucket::for_budget) == Some(*bucket))
                .filter_map(|r| r.variance())
                .collect();
            if variances.is_empty() {
                return None;
            }
            let successful = variances
                .iter()
                .filter(|v| **v <= thresholds.success_threshold)
                .count();
            Some(BucketForecast {
                bucket: *bucket,
                projects: variances.len(),
                success_rate: percent(successful, variances.len()),
            })
        })
        .collect();

    let top_performers = top_n(consultants, FORECAST_TOP_PERFORMERS, |m| m.efficiency_score)
        .into_iter()
        .map(|m| ConsultantForecast {
            predicted_success: (m.efficiency_score + 5.0).min(FORECAST_CEILING),
            efficiency_score: m.efficiency_score,
            name: m.name,
        })
        .collect();

    Forecast {
        buckets,
        top_performers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldPresence, ProjectRecord};

    fn project(job: &str, budget: Option<f64>, actual: f64, consultants: &str) -> ProjectRecord {
        let mut record = ProjectRecord::new(job, budget, actual);
        record.consultants_raw = consultants.to_string();
        record
    }

    fn metrics(name: &str, efficiency: f64) -> ConsultantMetrics {
        ConsultantMetrics {
            name: name.to_string(),
            unique_projects: 1,
            total_hours: 0.0,
            efficiency_score: efficiency,
            success_ratio: 0.0,
            composite_score: 0.0,
            projects_within_budget: 0,
            projects_over_budget: 0,
            projects_on_hold: 0,
            projects: Vec::new(),
        }
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(1, 4), 25.0);
        assert_eq!(percent(3, 0), 0.0);
    }

    #[test]
    fn test_sort_desc_is_stable() {
        let mut items = vec![("a", 1.0), ("b", 3.0), ("c", 1.0), ("d", 3.0)];
        sort_desc_by(&mut items, |i| i.1);
        let names: Vec<&str> = items.iter().map(|i| i.0).collect();
        assert_eq!(names, vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn test_company_performance() {
        let mut cancelled = project("J4", Some(100.0), 10.0, "");
        cancelled.status = "Cancelled".to_string();
        let data = Dataset::new(
            FieldPresence::all(),
            vec![
                project("J1", Some(100.0), 90.0, ""),
                project("J2", Some(100.0), 200.0, ""),
                project("J3", None, 50.0, ""),
                cancelled,
            ],
        );

        let perf = company_performance(&data, &Thresholds::default());
        assert_eq!(perf.total_projects, 3);
        assert_eq!(perf.within_budget, 2);
        assert_eq!(perf.over_budget, 1);
        assert!((perf.success_rate - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_practice_summary() {
        let roster = Roster::new(vec!["Ann".to_string()], vec![], vec![]);
        let data = Dataset::new(
            FieldPresence::all(),
            vec![
                project("J1", Some(100.0), 90.0, "Ann"),
                project("J1", Some(100.0), 90.0, "Ann"),
                project("J2", Some(100.0), 190.0, "Ann, Bob"),
                project("J3", None, 10.0, "Ann"),
                project("J4", Some(100.0), 10.0, "Bob"),
            ],
        );

        let summary = practice_summary(&data, &roster, &Thresholds::default());
        assert_eq!(summary.tracked_projects, 3);
        assert_eq!(summary.within_budget, 1);
        assert_eq!(summary.over_budget, 1);
        assert_eq!(summary.missing_budget, 1);
    }

    #[test]
    fn test_size_bucket_boundaries() {
        assert_eq!(SizeBucket::for_budget(99.9), SizeBucket::Small);
        assert_eq!(SizeBucket::for_budget(100.0), SizeBucket::Medium);
        assert_eq!(SizeBucket::for_budget(500.0), SizeBucket::Medium);
        assert_eq!(SizeBucket::for_budget(500.1), SizeBucket::Large);
    }

    #[test]
    fn test_forecast() {
        let data = Dataset::new(
            FieldPresence::all(),
            vec![
                project("J1", Some(50.0), 40.0, "Ann"),
                project("J2", Some(50.0), 90.0, "Ann"),
                project("J3", Some(1000.0), 900.0, "Bob"),
            ],
        );
        let scored = vec![
            metrics("Ann", 50.0),
            metrics("Bob", 93.0),
            metrics("Cy", 10.0),
            metrics("Dee", 60.0),
        ];

        let result = forecast(&data, &Roster::default(), &Thresholds::default(), &scored);
        assert_eq!(result.buckets.len(), 2);
        assert_eq!(result.buckets[0].bucket, SizeBucket::Small);
        assert_eq!(result.buckets[0].success_rate, 50.0);
        assert_eq!(result.buckets[1].bucket, SizeBucket::Large);
        assert_eq!(result.buckets[1].success_rate, 100.0);

        let names: Vec<&str> = result.top_performers.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Bob", "Dee", "Ann"]);
        assert_eq!(result.top_performers[0].predicted_success, 95.0);
        assert_eq!(result.top_performers[1].predicted_success, 65.0);
    }
}

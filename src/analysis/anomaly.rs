//! Variance outlier detection over tracked projects.

use super::filters::{tracked_budgeted_projects, Roster};
use crate::config::AnomalyMode;
use crate::models::{Dataset, ProjectRecord};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::debug;

/// Observations needed before anything can be flagged.
pub const MIN_HISTORY: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub job_id: String,
    pub customer: String,
    pub description: String,
    pub budgeted_hours: f64,
    pub actual_hours: f64,
    pub variance_pct: f64,
    /// Signed distance from the reference mean, in standard deviations.
    pub deviations: f64,
}

impl Anomaly {
    fn new(record: &ProjectRecord, variance: f64, mean: f64, std_dev: f64) -> Self {
        Self {
            job_id: record.job_id.clone(),
            customer: record.customer.clone(),
            description: record.description.clone(),
            budgeted_hours: record.budgeted_hours.unwrap_or_default(),
            actual_hours: record.actual_hours,
            variance_pct: variance * 100.0,
            deviations: if std_dev > 0.0 {
                (variance - mean) / std_dev
            } else {
                0.0
            },
        }
    }
}

fn is_outlier(value: f64, mean: f64, std_dev: f64, threshold: f64) -> bool {
    (value - mean).abs() > threshold * std_dev
}

/// Flag projects whose variance is more than `threshold` population
/// standard deviations from the mean.
///
/// In [`AnomalyMode::Incremental`] each project is compared with every
/// variance seen so far, itself included, once more than [`MIN_HISTORY`]
/// have accumulated; the result depends on input order. In
/// [`AnomalyMode::Population`] the statistics cover all tracked projects
/// and every project is compared against them.
pub fn detect(dataset: &Dataset, roster: &Roster, threshold: f64, mode: AnomalyMode) -> Vec<Anomaly> {
    let observations: Vec<(&ProjectRecord, f64)> = tracked_budgeted_projects(dataset, roster)
        .into_iter()
        .filter_map(|r| r.variance().map(|v| (r, v)))
        .collect();

    let anomalies = match mode {
        AnomalyMode::Incremental => incremental(&observations, threshold),
        AnomalyMode::Population => population(&observations, threshold),
    };

    debug!(
        "Anomaly scan ({:?}): {} observations, {} flagged",
        mode,
        observations.len(),
        anomalies.len()
    );
    anomalies
}

fn incremental(observations: &[(&ProjectRecord, f64)], threshold: f64) -> Vec<Anomaly> {
    let mut history: Vec<f64> = Vec::with_capacity(observations.len());
    let mut anomalies = Vec::new();

    for (record, variance) in observations {
        history.push(*variance);
        if history.len() <= MIN_HISTORY {
            continue;
        }

        let mean = history.iter().mean();
        let std_dev = history.iter().population_std_dev();
        if is_outlier(*variance, mean, std_dev, threshold) {
            anomalies.push(Anomaly::new(record, *variance, mean, std_dev));
        }
    }

    anomalies
}

fn population(observations: &[(&ProjectRecord, f64)], threshold: f64) -> Vec<Anomaly> {
    if observations.len() <= MIN_HISTORY {
        return Vec::new();
    }

    let variances: Vec<f64> = observations.iter().map(|(_, v)| *v).collect();
    let mean = variances.iter().mean();
    let std_dev = variances.iter().population_std_dev();

    observations
        .iter()
        .filter(|(_, v)| is_outlier(*v, mean, std_dev, threshold))
        .map(|(record, v)| Anomaly::new(record, *v, mean, std_dev))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldPresence;

    fn dataset(actuals: &[f64]) -> Dataset {
        let records = actuals
            .iter()
            .enumerate()
            .map(|(i, actual)| {
                let mut r = ProjectRecord::new(format!("J{}", i), Some(100.0), *actual);
                r.consultants_raw = "Ann".to_string();
                r
            })
            .collect();
        Dataset::new(FieldPresence::all(), records)
    }

    #[test]
    fn test_needs_more_than_ten_observations() {
        let mut actuals = vec![100.0; 9];
        actuals.push(1000.0);
        let data = dataset(&actuals);

        assert!(detect(&data, &Roster::default(), 2.0, AnomalyMode::Incremental).is_empty());
        assert!(detect(&data, &Roster::default(), 2.0, AnomalyMode::Population).is_empty());
    }

    #[test]
    fn test_incremental_flags_late_outlier() {
        let mut actuals = vec![100.0, 102.0, 98.0, 101.0, 99.0, 100.0, 103.0, 97.0, 100.0, 101.0];
        actuals.push(400.0);
        let data = dataset(&actuals);

        let anomalies = detect(&data, &Roster::default(), 2.0, AnomalyMode::Incremental);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].job_id, "J10");
        assert!((anomalies[0].variance_pct - 300.0).abs() < 1e-9);
        assert!(anomalies[0].deviations > 2.0);
    }

    #[test]
    fn test_incremental_is_order_dependent() {
        // The same outlier first in line is never compared against anything
        let mut actuals = vec![400.0];
        actuals.extend([100.0, 102.0, 98.0, 101.0, 99.0, 100.0, 103.0, 97.0, 100.0, 101.0]);
        let data = dataset(&actuals);

        assert!(detect(&data, &Roster::default(), 2.0, AnomalyMode::Incremental).is_empty());
        let population = detect(&data, &Roster::default(), 2.0, AnomalyMode::Population);
        assert_eq!(population.len(), 1);
        assert_eq!(population[0].job_id, "J0");
    }

    #[test]
    fn test_constant_variances_flag_nothing() {
        let data = dataset(&[100.0; 15]);
        assert!(detect(&data, &Roster::default(), 2.0, AnomalyMode::Incremental).is_empty());
        assert!(detect(&data, &Roster::default(), 2.0, AnomalyMode::Population).is_empty());
    }

    #[test]
    fn test_untracked_projects_ignored() {
        let mut actuals = vec![100.0; 10];
        actuals.push(400.0);
        let data = dataset(&actuals);
        let roster = Roster::new(vec!["Bob".to_string()], vec![], vec![]);

        assert!(detect(&data, &roster, 2.0, AnomalyMode::Population).is_empty());
    }
}

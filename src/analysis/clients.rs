//! Customer and consultant-customer performance.

use super::aggregator::{percent, sort_desc_by};
use super::filters::{is_scorable, Roster};
use super::normalize::{normalize_name, split_assignments};
use crate::config::{ClientAnalysisConfig, Thresholds};
use crate::models::Dataset;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientMetrics {
    pub customer: String,
    pub total_projects: usize,
    pub successful_projects: usize,
    pub efficient_projects: usize,
    pub success_rate: f64,
    pub efficiency_rate: f64,
    pub total_budgeted_hours: f64,
    pub total_actual_hours: f64,
    pub avg_variance_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultantClientMetrics {
    pub consultant: String,
    pub customer: String,
    pub total_projects: usize,
    pub success_rate: f64,
    pub efficiency_rate: f64,
    pub avg_variance_pct: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientAnalysis {
    pub min_projects: usize,
    /// Highest success rate first.
    pub clients: Vec<ClientMetrics>,
    /// Highest efficiency rate first.
    pub consultant_clients: Vec<ConsultantClientMetrics>,
}

#[derive(Clone, Copy)]
struct Sample {
    budget: f64,
    actual: f64,
    variance: f64,
}

struct Tally<'a> {
    thresholds: &'a Thresholds,
    samples: &'a [Sample],
}

impl Tally<'_> {
    fn total(&self) -> usize {
        self.samples.len()
    }

    fn successful(&self) -> usize {
        self.samples
            .iter()
            .filter(|s| s.variance <= self.thresholds.success_threshold)
            .count()
    }

    fn efficient(&self) -> usize {
        self.samples
            .iter()
            .filter(|s| s.variance <= self.thresholds.efficiency_threshold)
            .count()
    }

    fn avg_variance_pct(&self) -> f64 {
        let sum: f64 = self.samples.iter().map(|s| s.variance).sum();
        if self.samples.is_empty() {
            0.0
        } else {
            sum / self.samples.len() as f64 * 100.0
        }
    }
}

/// Group samples by key in first-seen order.
fn group<K: Clone + Eq + std::hash::Hash>(pairs: Vec<(K, Sample)>) -> Vec<(K, Vec<Sample>)> {
    let mut order: Vec<(K, Vec<Sample>)> = Vec::new();
    let mut index: HashMap<K, usize> = HashMap::new();
    for (key, sample) in pairs {
        match index.get(&key) {
            Some(&slot) => order[slot].1.push(sample),
            None => {
                index.insert(key.clone(), order.len());
                order.push((key, vec![sample]));
            }
        }
    }
    order
}

/// Runs on the merged dataset before the date window, so long-running
/// customer relationships are judged on their whole history.
pub fn analyze(
    dataset: &Dataset,
    roster: &Roster,
    thresholds: &Thresholds,
    config: &ClientAnalysisConfig,
) -> ClientAnalysis {
    let min_projects = config.min_projects_threshold as usize;
    let mut by_client = Vec::new();
    let mut by_pair = Vec::new();

    for record in dataset.records.iter().filter(|r| is_scorable(r)) {
        let customer = normalize_name(&record.customer);
        let (Some(budget), Some(variance)) = (record.valid_budget(), record.variance()) else {
            continue;
        };
        if customer.is_empty() {
            continue;
        }

        let sample = Sample {
            budget,
            actual: record.actual_hours,
            variance,
        };
        by_client.push((customer.clone(), sample));

        if config.track_consultant_client_performance {
            for consultant in split_assignments(&record.consultants_raw) {
                if roster.admits_consultant(&consultant, &record.job_id) {
                    by_pair.push(((consultant, customer.clone()), sample));
                }
            }
        }
    }

    let mut clients: Vec<ClientMetrics> = group(by_client)
        .into_iter()
        .filter(|(_, samples)| samples.len() >= min_projects)
        .map(|(customer, samples)| {
            let tally = Tally {
                thresholds,
                samples: &samples,
            };
            ClientMetrics {
                total_projects: tally.total(),
                successful_projects: tally.successful(),
                efficient_projects: tally.efficient(),
                success_rate: percent(tally.successful(), tally.total()),
                efficiency_rate: percent(tally.efficient(), tally.total()),
                total_budgeted_hours: samples.iter().map(|s| s.budget).sum(),
                total_actual_hours: samples.iter().map(|s| s.actual).sum(),
                avg_variance_pct: tally.avg_variance_pct(),
                customer,
            }
        })
        .collect();
    sort_desc_by(&mut clients, |c| c.success_rate);

    let mut consultant_clients: Vec<ConsultantClientMetrics> = group(by_pair)
        .into_iter()
        .filter(|(_, samples)| samples.len() >= min_projects)
        .map(|((consultant, customer), samples)| {
            let tally = Tally {
                thresholds,
                samples: &samples,
            };
            ConsultantClientMetrics {
                consultant,
                customer,
                total_projects: tally.total(),
                success_rate: percent(tally.successful(), tally.total()),
                efficiency_rate: percent(tally.efficient(), tally.total()),
                avg_variance_pct: tally.avg_variance_pct(),
            }
        })
        .collect();
    sort_desc_by(&mut consultant_clients, |c| c.efficiency_rate);

    debug!(
        "Client analysis: {} customers, {} consultant-customer pairs at >= {} projects",
        clients.len(),
        consultant_clients.len(),
        min_projects
    );

    ClientAnalysis {
        min_projects,
        clients,
        consultant_clients,
    }
}

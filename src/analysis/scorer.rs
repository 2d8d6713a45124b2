//! Entity scorer.
//!
//! Scores consultants and solution architects over a filtered snapshot.
//! Consultants are credited with whole projects; architects share each
//! project's hours equally among the valid architects on it.

use super::aggregator::{percent, sort_desc_by};
use super::filters::{is_scorable, Roster};
use super::normalize::{split_assignments, split_comma_list};
use crate::config::{ArchitectScoringConfig, ScoringConfig, Thresholds};
use crate::models::{
    ArchitectMetrics, ConsultantMetrics, Dataset, ProjectDetail, ProjectRecord, VarianceBand,
};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Entries grouped by entity name, in order of first appearance.
struct Grouped<T> {
    order: Vec<String>,
    entries: HashMap<String, Vec<T>>,
}

impl<T> Grouped<T> {
    fn new() -> Self {
        Self {
            order: Vec::new(),
            entries: HashMap::new(),
        }
    }

    fn push(&mut self, name: String, entry: T) {
        if !self.entries.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.entries.entry(name).or_default().push(entry);
    }

    fn into_groups(mut self) -> Vec<(String, Vec<T>)> {
        self.order
            .into_iter()
            .filter_map(|name| {
                let entries = self.entries.remove(&name)?;
                Some((name, entries))
            })
            .collect()
    }
}

fn detail(record: &ProjectRecord, budget: f64, actual: f64, variance: f64, thresholds: &Thresholds) -> ProjectDetail {
    ProjectDetail {
        job_id: record.job_id.clone(),
        customer: record.customer.clone(),
        description: record.description.clone(),
        budgeted_hours: budget,
        actual_hours: actual,
        variance_pct: variance * 100.0,
        band: VarianceBand::classify(variance, thresholds),
    }
}

/// Score every admitted consultant, ranked by composite score (ties keep first appearance).
///
/// A job listed more than once for a consultant counts once toward the
/// project tallies; its hours still add to `total_hours` each time.
pub fn score_consultants(
    dataset: &Dataset,
    roster: &Roster,
    thresholds: &Thresholds,
    scoring: &ScoringConfig,
) -> Vec<ConsultantMetrics> {
    let mut grouped: Grouped<&ProjectRecord> = Grouped::new();

    for record in dataset.records.iter().filter(|r| is_scorable(r)) {
        for name in split_assignments(&record.consultants_raw) {
            if roster.admits_consultant(&name, &record.job_id) {
                grouped.push(name, record);
            }
        }
    }

    let mut metrics: Vec<ConsultantMetrics> = grouped
        .into_groups()
        .into_iter()
        .map(|(name, records)| consultant_metrics(name, &records, thresholds, scoring))
        .collect();

    sort_desc_by(&mut metrics, |m| m.composite_score);
    debug!("Scored {} consultants", metrics.len());
    metrics
}

fn consultant_metrics(
    name: String,
    records: &[&ProjectRecord],
    thresholds: &Thresholds,
    scoring: &ScoringConfig,
) -> ConsultantMetrics {
    let total_hours: f64 = records.iter().map(|r| r.actual_hours).sum();

    let mut seen = HashSet::new();
    let unique: Vec<&ProjectRecord> = records
        .iter()
        .copied()
        .filter(|r| seen.insert(r.job_id.as_str()))
        .collect();

    let mut efficient = 0;
    let mut successful = 0;
    let mut on_hold = 0;
    let mut projects = Vec::with_capacity(unique.len());

    for record in &unique {
        let (Some(budget), Some(variance)) = (record.valid_budget(), record.variance()) else {
            continue;
        };
        if variance <= thresholds.efficiency_threshold {
            efficient += 1;
        }
        if variance <= thresholds.success_threshold {
            successful += 1;
        }
        if record.is_on_hold() {
            on_hold += 1;
        }
        projects.push(detail(record, budget, record.actual_hours, variance, thresholds));
    }

    let unique_projects = unique.len();
    let efficiency_score = percent(efficient, unique_projects);
    let volume = (total_hours / scoring.hours_per_bonus_point).min(scoring.max_hours_multiplier);

    ConsultantMetrics {
        name,
        unique_projects,
        total_hours,
        efficiency_score,
        success_ratio: percent(successful, unique_projects),
        composite_score: efficiency_score + volume * scoring.bonus_points_per_1000_hours,
        projects_within_budget: successful,
        projects_over_budget: unique_projects - successful,
        projects_on_hold: on_hold,
        projects,
    }
}

struct ArchitectShare<'a> {
    record: &'a ProjectRecord,
    budget: f64,
    actual: f64,
    variance: f64,
}

/// Score every admitted solution architect, ranked by composite score.
///
/// Each project's hours are split equally among its admitted architects;
/// success is judged on the whole project's variance.
pub fn score_architects(
    dataset: &Dataset,
    roster: &Roster,
    thresholds: &Thresholds,
    scoring: &ArchitectScoringConfig,
) -> Vec<ArchitectMetrics> {
    let mut grouped: Grouped<ArchitectShare> = Grouped::new();

    for record in dataset.records.iter().filter(|r| is_scorable(r)) {
        let (Some(budget), Some(variance)) = (record.valid_budget(), record.variance()) else {
            continue;
        };
        let names: Vec<String> = split_comma_list(&record.architects_raw)
            .into_iter()
            .filter(|name| roster.admits_architect(name, &record.job_id))
            .collect();
        if names.is_empty() {
            continue;
        }

        let share = names.len() as f64;
        for name in names {
            grouped.push(
                name,
                ArchitectShare {
                    record,
                    budget: budget / share,
                    actual: record.actual_hours / share,
                    variance,
                },
            );
        }
    }

    let mut metrics: Vec<ArchitectMetrics> = grouped
        .into_groups()
        .into_iter()
        .map(|(name, shares)| {
            let total_projects = shares.len();
            let successful = shares
                .iter()
                .filter(|s| s.variance <= thresholds.success_threshold)
                .count();
            let total_budgeted_hours: f64 = shares.iter().map(|s| s.budget).sum();
            let success_rate = percent(successful, total_projects);
            let volume = (total_budgeted_hours / scoring.hours_per_multiplier)
                .min(scoring.max_volume_multiplier);

            ArchitectMetrics {
                name,
                total_projects,
                successful_projects: successful,
                failed_projects: total_projects - successful,
                success_rate,
                total_budgeted_hours,
                total_actual_hours: shares.iter().map(|s| s.actual).sum(),
                composite_score: success_rate * volume,
                projects: shares
                    .iter()
                    .map(|s| detail(s.record, s.budget, s.actual, s.variance, thresholds))
                    .collect(),
            }
        })
        .collect();

    sort_desc_by(&mut metrics, |m| m.composite_score);
    debug!("Scored {} solution architects", metrics.len());
    metrics
}

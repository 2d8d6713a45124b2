//! Cross-period trend comparison.
//!
//! Each period is merged, windowed, and scored independently; the metric
//! tables are then compared entity by entity. An entity missing from a
//! period is absent for that period, never zero.

use super::aggregator::sort_desc_by;
use super::Pipeline;
use crate::models::{ArchitectMetrics, ConsultantMetrics, Dataset, Role, TrendMetric};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;

/// Highlights carried per list.
pub const HIGHLIGHT_COUNT: usize = 3;
/// Efficiency change (%) below which a consultant needs attention.
pub const DECLINE_THRESHOLD_PCT: f64 = -5.0;

/// Scored tables for one labelled period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodSnapshot {
    pub label: String,
    pub records: usize,
    pub consultants: Vec<ConsultantMetrics>,
    pub architects: Vec<ArchitectMetrics>,
}

impl PeriodSnapshot {
    fn value(&self, role: Role, entity: &str, metric: TrendMetric) -> Option<f64> {
        match role {
            Role::Consultant => self
                .consultants
                .iter()
                .find(|m| m.name == entity)
                .and_then(|m| m.metric(metric)),
            Role::SolutionArchitect => self
                .architects
                .iter()
                .find(|m| m.name == entity)
                .and_then(|m| m.metric(metric)),
        }
    }

    fn entities(&self, role: Role) -> Vec<&str> {
        match role {
            Role::Consultant => self.consultants.iter().map(|m| m.name.as_str()).collect(),
            Role::SolutionArchitect => self.architects.iter().map(|m| m.name.as_str()).collect(),
        }
    }
}

/// First-to-last change of one metric for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendDelta {
    pub entity: String,
    pub role: Role,
    pub metric: TrendMetric,
    pub first_period: String,
    pub last_period: String,
    pub first_value: f64,
    pub last_value: f64,
    pub change: f64,
    /// 0 when the first value is 0.
    pub change_pct: f64,
    pub periods_present: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    pub periods: Vec<String>,
    pub metrics: Vec<TrendMetric>,
    pub snapshots: Vec<PeriodSnapshot>,
    pub deltas: Vec<TrendDelta>,
    /// Consultants with the largest efficiency gains.
    pub top_improvers: Vec<TrendDelta>,
    /// Consultants whose efficiency fell by more than 5%.
    pub needs_attention: Vec<TrendDelta>,
}

/// Merge, window, and score one period.
pub fn snapshot(pipeline: &Pipeline, label: &str, raw: &Dataset) -> PeriodSnapshot {
    let prepared = pipeline.prepare(raw);
    let scores = pipeline.score(&prepared.working);
    info!(
        "Period {}: {} consultants, {} solution architects",
        label,
        scores.consultants.len(),
        scores.architects.len()
    );

    PeriodSnapshot {
        label: label.to_string(),
        records: prepared.working.len(),
        consultants: scores.consultants,
        architects: scores.architects,
    }
}

/// Deltas for every entity seen in any period, in role then name order.
pub fn compare(snapshots: &[PeriodSnapshot], metrics: &[TrendMetric]) -> Vec<TrendDelta> {
    let mut deltas = Vec::new();

    for role in [Role::Consultant, Role::SolutionArchitect] {
        let entities: BTreeSet<&str> = snapshots.iter().flat_map(|s| s.entities(role)).collect();

        for entity in entities {
            for metric in metrics {
                let present: Vec<(&str, f64)> = snapshots
                    .iter()
                    .filter_map(|s| s.value(role, entity, *metric).map(|v| (s.label.as_str(), v)))
                    .collect();
                let (Some(first), Some(last)) = (present.first(), present.last()) else {
                    continue;
                };
                if present.len() < 2 {
                    continue;
                }

                let change = last.1 - first.1;
                deltas.push(TrendDelta {
                    entity: entity.to_string(),
                    role,
                    metric: *metric,
                    first_period: first.0.to_string(),
                    last_period: last.0.to_string(),
                    first_value: first.1,
                    last_value: last.1,
                    change,
                    change_pct: if first.1 == 0.0 {
                        0.0
                    } else {
                        change / first.1 * 100.0
                    },
                    periods_present: present.len(),
                });
            }
        }
    }

    deltas
}

/// Score every period and compare them.
pub fn analyze(pipeline: &Pipeline, periods: &[(String, Dataset)], metrics: &[TrendMetric]) -> TrendReport {
    let snapshots: Vec<PeriodSnapshot> = periods
        .iter()
        .map(|(label, raw)| snapshot(pipeline, label, raw))
        .collect();
    let deltas = compare(&snapshots, metrics);

    let efficiency: Vec<TrendDelta> = deltas
        .iter()
        .filter(|d| d.role == Role::Consultant && d.metric == TrendMetric::EfficiencyScore)
        .cloned()
        .collect();

    let mut top_improvers = efficiency.clone();
    sort_desc_by(&mut top_improvers, |d| d.change_pct);
    top_improvers.truncate(HIGHLIGHT_COUNT);

    let mut needs_attention: Vec<TrendDelta> = efficiency
        .into_iter()
        .filter(|d| d.change_pct < DECLINE_THRESHOLD_PCT)
        .collect();
    sort_desc_by(&mut needs_attention, |d| -d.change_pct);
    needs_attention.truncate(HIGHLIGHT_COUNT);

    info!(
        "Compared {} periods: {} metric deltas",
        snapshots.len(),
        deltas.len()
    );

    TrendReport {
        periods: periods.iter().map(|(label, _)| label.clone()).collect(),
        metrics: metrics.to_vec(),
        snapshots,
        deltas,
        top_improvers,
        needs_attention,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::filters::Roster;
    use crate::config::Config;
    use crate::models::{FieldPresence, ProjectRecord};
    use chrono::NaiveDate;

    fn period(rows: &[(&str, f64, &str)]) -> Dataset {
        let records = rows
            .iter()
            .map(|(job, actual, consultants)| {
                let mut r = ProjectRecord::new(*job, Some(100.0), *actual);
                r.consultants_raw = consultants.to_string();
                r
            })
            .collect();
        Dataset::new(FieldPresence::all(), records)
    }

    fn run(periods: Vec<(&str, Dataset)>, metrics: &[TrendMetric]) -> TrendReport {
        let config = Config::default();
        let roster = Roster::default();
        let pipeline = Pipeline::new(&config, &roster, NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
        let periods: Vec<(String, Dataset)> =
            periods.into_iter().map(|(l, d)| (l.to_string(), d)).collect();
        analyze(&pipeline, &periods, metrics)
    }

    fn delta<'a>(report: &'a TrendReport, entity: &str, metric: TrendMetric) -> Option<&'a TrendDelta> {
        report
            .deltas
            .iter()
            .find(|d| d.entity == entity && d.metric == metric && d.role == Role::Consultant)
    }

    #[test]
    fn test_first_to_last_change() {
        let report = run(
            vec![
                ("Q1", period(&[("J1", 200.0, "Ann"), ("J2", 90.0, "Ann")])),
                ("Q2", period(&[("J3", 90.0, "Ann")])),
            ],
            &[TrendMetric::EfficiencyScore, TrendMetric::UniqueProjects],
        );

        let eff = delta(&report, "Ann", TrendMetric::EfficiencyScore).unwrap();
        assert_eq!(eff.first_value, 50.0);
        assert_eq!(eff.last_value, 100.0);
        assert_eq!(eff.change, 50.0);
        assert_eq!(eff.change_pct, 100.0);
        assert_eq!((eff.first_period.as_str(), eff.last_period.as_str()), ("Q1", "Q2"));

        let projects = delta(&report, "Ann", TrendMetric::UniqueProjects).unwrap();
        assert_eq!(projects.change, -1.0);
        assert_eq!(report.top_improvers.len(), 1);
    }

    #[test]
    fn test_zero_first_value_reports_zero_pct() {
        let report = run(
            vec![
                ("Q1", period(&[("J1", 200.0, "Ann")])),
                ("Q2", period(&[("J2", 90.0, "Ann")])),
            ],
            &[TrendMetric::EfficiencyScore],
        );
        let eff = delta(&report, "Ann", TrendMetric::EfficiencyScore).unwrap();
        assert_eq!(eff.change, 100.0);
        assert_eq!(eff.change_pct, 0.0);
    }

    #[test]
    fn test_absent_periods_are_skipped() {
        let report = run(
            vec![
                ("Q1", period(&[("J1", 90.0, "Ann")])),
                ("Q2", period(&[("J2", 90.0, "Bob")])),
                ("Q3", period(&[("J3", 200.0, "Ann")])),
            ],
            &[TrendMetric::EfficiencyScore],
        );

        let ann = delta(&report, "Ann", TrendMetric::EfficiencyScore).unwrap();
        assert_eq!(ann.last_period, "Q3");
        assert_eq!(ann.periods_present, 2);
        assert_eq!(ann.change_pct, -100.0);
        // Present in one period only: no delta
        assert!(delta(&report, "Bob", TrendMetric::EfficiencyScore).is_none());

        assert_eq!(report.needs_attention.len(), 1);
        assert_eq!(report.needs_attention[0].entity, "Ann");
    }

    #[test]
    fn test_architect_efficiency_not_compared() {
        let mut q1 = period(&[("J1", 90.0, "")]);
        q1.records[0].architects_raw = "Sam".to_string();
        let mut q2 = period(&[("J2", 90.0, "")]);
        q2.records[0].architects_raw = "Sam".to_string();

        let report = run(
            vec![("Q1", q1), ("Q2", q2)],
            &[TrendMetric::EfficiencyScore, TrendMetric::SuccessRatio],
        );
        let sam: Vec<&TrendDelta> = report.deltas.iter().filter(|d| d.entity == "Sam").collect();
        assert_eq!(sam.len(), 1);
        assert_eq!(sam[0].metric, TrendMetric::SuccessRatio);
        assert_eq!(sam[0].role, Role::SolutionArchitect);
    }
}

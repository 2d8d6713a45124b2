//! Additive multi-factor risk scoring.

use super::aggregator::sort_desc_by;
use super::filters::{tracked_budgeted_projects, Roster};
use super::normalize::split_assignments;
use crate::config::AnalyticsConfig;
use crate::models::Dataset;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Projects scoring at least this much are reported.
pub const REPORT_THRESHOLD: u32 = 3;
/// More distinct consultants than this is complex resourcing.
pub const COMPLEX_TEAM_SIZE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFactor {
    LargeBudget,
    HighOverrun,
    ComplexResourcing,
}

impl RiskFactor {
    pub fn points(&self) -> u32 {
        match self {
            RiskFactor::LargeBudget => 2,
            RiskFactor::HighOverrun => 3,
            RiskFactor::ComplexResourcing => 1,
        }
    }
}

impl fmt::Display for RiskFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskFactor::LargeBudget => write!(f, "Large budget"),
            RiskFactor::HighOverrun => write!(f, "High overrun"),
            RiskFactor::ComplexResourcing => write!(f, "Complex resourcing"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskProject {
    pub job_id: String,
    pub customer: String,
    pub description: String,
    pub budgeted_hours: f64,
    pub variance_pct: f64,
    pub consultant_count: usize,
    pub factors: Vec<RiskFactor>,
    pub score: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Projects at or above [`REPORT_THRESHOLD`], highest score first.
    pub projects: Vec<RiskProject>,
    /// Scanned projects carrying the large-budget factor.
    pub large_budget_projects: usize,
    /// Scanned projects carrying the complex-resourcing factor.
    pub complex_projects: usize,
}

pub fn assess(dataset: &Dataset, roster: &Roster, config: &AnalyticsConfig) -> RiskAssessment {
    let mut assessment = RiskAssessment::default();

    for record in tracked_budgeted_projects(dataset, roster) {
        let (Some(budget), Some(variance)) = (record.valid_budget(), record.variance()) else {
            continue;
        };
        let consultant_count = split_assignments(&record.consultants_raw)
            .into_iter()
            .collect::<HashSet<_>>()
            .len();

        let mut factors = Vec::new();
        if budget > config.risk_threshold_hours {
            factors.push(RiskFactor::LargeBudget);
            assessment.large_budget_projects += 1;
        }
        if variance > config.risk_threshold_variance {
            factors.push(RiskFactor::HighOverrun);
        }
        if consultant_count > COMPLEX_TEAM_SIZE {
            factors.push(RiskFactor::ComplexResourcing);
            assessment.complex_projects += 1;
        }

        let score: u32 = factors.iter().map(RiskFactor::points).sum();
        if score >= REPORT_THRESHOLD {
            assessment.projects.push(RiskProject {
                job_id: record.job_id.clone(),
                customer: record.customer.clone(),
                description: record.description.clone(),
                budgeted_hours: budget,
                variance_pct: variance * 100.0,
                consultant_count,
                factors,
                score,
            });
        }
    }

    sort_desc_by(&mut assessment.projects, |p| p.score as f64);
    assessment
}

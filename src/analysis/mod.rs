//! Analysis modules.
//!
//! This module wires the stages together: merge duplicate jobs, apply the
//! date window, score entities, then run the optional analytics. Every
//! stage reads an immutable [`Dataset`] snapshot and returns new tables.

pub mod aggregator;
pub mod anomaly;
pub mod clients;
pub mod das;
pub mod filters;
pub mod normalize;
pub mod quality;
pub mod risk;
pub mod scorer;
pub mod trend;

use crate::config::Config;
use crate::models::{ArchitectMetrics, ConsultantMetrics, Dataset, MissingBudget};
use aggregator::{CompanyPerformance, Forecast, PracticeSummary};
use anomaly::Anomaly;
use chrono::NaiveDate;
use clients::ClientAnalysis;
use das::DasAnalysis;
use filters::{DateWindow, DateWindowSummary, Roster};
use quality::QualityReport;
use risk::RiskAssessment;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Record counts at each step of preparation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCounts {
    pub loaded: usize,
    pub after_merge: usize,
    pub in_scope: usize,
}

/// Everything one run over one input produces.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub counts: RecordCounts,
    pub quality: QualityReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_window: Option<DateWindowSummary>,
    pub missing_budget: Vec<MissingBudget>,
    pub consultants: Vec<ConsultantMetrics>,
    pub architects: Vec<ArchitectMetrics>,
    pub company: CompanyPerformance,
    pub practice: PracticeSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub das_plus: Option<DasAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast: Option<Forecast>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anomalies: Option<Vec<Anomaly>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk: Option<RiskAssessment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clients: Option<ClientAnalysis>,
    /// Stages that could not run because the input lacked a field.
    pub skipped_stages: Vec<String>,
}

/// A dataset after merging and windowing.
#[derive(Debug, Clone)]
pub struct Prepared {
    /// One record per job id, before the date window.
    pub merged: Dataset,
    /// The merged records the date window retained.
    pub working: Dataset,
    pub window: Option<DateWindowSummary>,
}

/// Consultant and architect rankings for one snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scores {
    pub consultants: Vec<ConsultantMetrics>,
    pub architects: Vec<ArchitectMetrics>,
}

/// Runs the stages with one configuration, roster, and reference date.
pub struct Pipeline<'a> {
    config: &'a Config,
    roster: &'a Roster,
    today: NaiveDate,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config, roster: &'a Roster, today: NaiveDate) -> Self {
        Self {
            config,
            roster,
            today,
        }
    }

    pub fn window(&self) -> Option<DateWindow> {
        self.config
            .project_filtering
            .cutoff(self.today)
            .map(DateWindow::new)
    }

    /// Merge duplicate jobs, then apply the date window.
    pub fn prepare(&self, raw: &Dataset) -> Prepared {
        let merged = normalize::combine_duplicate_jobs(raw);
        let (working, window) = filters::apply_date_window(&merged, self.window());
        Prepared {
            merged,
            working,
            window,
        }
    }

    /// Rank both roles over a prepared snapshot. A role whose assignment
    /// field is absent yields an empty table.
    pub fn score(&self, working: &Dataset) -> Scores {
        let config = self.config;
        let consultants = if working.fields.consultants {
            scorer::score_consultants(working, self.roster, &config.thresholds, &config.scoring)
        } else {
            Vec::new()
        };
        let architects = if working.fields.architects {
            scorer::score_architects(
                working,
                self.roster,
                &config.thresholds,
                &config.solution_architect_scoring,
            )
        } else {
            Vec::new()
        };

        Scores {
            consultants,
            architects,
        }
    }

    /// Run every enabled stage over one input.
    pub fn run(&self, raw: &Dataset) -> AnalysisOutput {
        let config = self.config;
        let prepared = self.prepare(raw);
        let working = &prepared.working;
        let skipped_stages = skipped_stages(raw, config);
        for stage in &skipped_stages {
            warn!("Skipping {}", stage);
        }

        let quality = quality::check_status_consistency(
            &prepared.merged,
            &config.inconsistent_project_check,
            self.today,
        );
        let scores = self.score(working);
        info!(
            "Scored {} consultants and {} solution architects over {} records",
            scores.consultants.len(),
            scores.architects.len(),
            working.len()
        );

        let analytics = &config.advanced_analytics;
        let das_plus = (config.das_plus_analysis.enable_das_plus && raw.fields.consultants).then(|| {
            das::analyze(
                &prepared.merged,
                self.roster,
                &config.das_plus_analysis,
                self.window(),
                self.today,
            )
        });
        let forecast = analytics.enable_predictive.then(|| {
            aggregator::forecast(working, self.roster, &config.thresholds, &scores.consultants)
        });
        let anomalies = analytics.enable_anomaly_detection.then(|| {
            let found = anomaly::detect(
                working,
                self.roster,
                analytics.anomaly_threshold,
                analytics.anomaly_mode,
            );
            info!("Found {} variance anomalies", found.len());
            found
        });
        let risk = analytics.enable_risk_assessment.then(|| {
            let assessment = risk::assess(working, self.roster, analytics);
            info!("Flagged {} high-risk projects", assessment.projects.len());
            assessment
        });
        let clients = (config.client_analysis.enable_client_analysis && raw.fields.customer).then(|| {
            clients::analyze(
                &prepared.merged,
                self.roster,
                &config.thresholds,
                &config.client_analysis,
            )
        });

        AnalysisOutput {
            counts: RecordCounts {
                loaded: raw.len(),
                after_merge: prepared.merged.len(),
                in_scope: working.len(),
            },
            quality,
            date_window: prepared.window,
            missing_budget: filters::missing_budget_report(working),
            company: aggregator::company_performance(working, &config.thresholds),
            practice: aggregator::practice_summary(working, self.roster, &config.thresholds),
            consultants: scores.consultants,
            architects: scores.architects,
            das_plus,
            forecast,
            anomalies,
            risk,
            clients,
            skipped_stages,
        }
    }
}

/// Stages the input's fields cannot support.
fn skipped_stages(raw: &Dataset, config: &Config) -> Vec<String> {
    let fields = raw.fields;
    let mut skipped = Vec::new();
    if !fields.consultants {
        skipped.push("consultant scoring (no resources engaged column)".to_string());
        if config.das_plus_analysis.enable_das_plus {
            skipped.push("DAS+ analysis (no resources engaged column)".to_string());
        }
    }
    if !fields.architects {
        skipped.push("solution architect scoring (no solution architect column)".to_string());
    }
    if config.das_plus_analysis.enable_das_plus && fields.consultants && !fields.completion {
        skipped.push("DAS+ scoring (no completion column - every project unscored)".to_string());
    }
    if config.client_analysis.enable_client_analysis && !fields.customer {
        skipped.push("client analysis (no customer column)".to_string());
    }
    skipped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldPresence, ProjectRecord};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()
    }

    fn create_test_dataset() -> Dataset {
        let mut records = Vec::new();
        for (job, budget, actual, consultants, architects, status) in [
            ("J1", 100.0, 95.0, "Ann Lee", "Sam", "Open"),
            ("J2", 200.0, 240.0, "Ann Lee, Bob Ray", "Sam, Tia", "Closed"),
            ("J1", 50.0, 10.0, "Bob Ray", "", "Open"),
            ("J3", 100.0, 500.0, "Bob Ray", "", "Cancelled"),
        ] {
            let mut record = ProjectRecord::new(job, Some(budget), actual);
            record.consultants_raw = consultants.to_string();
            record.architects_raw = architects.to_string();
            record.status = status.to_string();
            record.customer = "Acme".to_string();
            record.completion_pct = Some(50.0);
            records.push(record);
        }
        Dataset::new(FieldPresence::all(), records)
    }

    #[test]
    fn test_run_end_to_end() {
        let mut config = Config::default();
        config.client_analysis.min_projects_threshold = 2;
        let roster = Roster::default();
        let output = Pipeline::new(&config, &roster, today()).run(&create_test_dataset());

        assert_eq!(
            output.counts,
            RecordCounts {
                loaded: 4,
                after_merge: 3,
                in_scope: 3
            }
        );
        assert!(output.skipped_stages.is_empty());

        let ann = output.consultants.iter().find(|c| c.name == "Ann Lee").unwrap();
        assert_eq!(ann.unique_projects, 2);
        // J1 merged: 150 budget, 105 actual
        assert_eq!(ann.total_hours, 345.0);

        let bob = output.consultants.iter().find(|c| c.name == "Bob Ray").unwrap();
        // Cancelled J3 is not scored
        assert_eq!(bob.unique_projects, 2);

        let tia = output.architects.iter().find(|a| a.name == "Tia").unwrap();
        assert_eq!(tia.total_budgeted_hours, 100.0);
        assert_eq!(tia.total_actual_hours, 120.0);

        assert!(output.das_plus.is_some());
        assert!(output.forecast.is_some());
        assert_eq!(output.anomalies.as_ref().map(Vec::len), Some(0));
        assert_eq!(output.clients.as_ref().map(|c| c.clients.len()), Some(1));
    }

    #[test]
    fn test_missing_architect_column_disables_only_architects() {
        let mut dataset = create_test_dataset();
        dataset.fields.architects = false;

        let config = Config::default();
        let roster = Roster::default();
        let output = Pipeline::new(&config, &roster, today()).run(&dataset);

        assert!(output.architects.is_empty());
        assert!(!output.consultants.is_empty());
        assert_eq!(output.skipped_stages.len(), 1);
    }

    #[test]
    fn test_disabled_stages_are_absent() {
        let mut config = Config::default();
        config.das_plus_analysis.enable_das_plus = false;
        config.advanced_analytics.enable_predictive = false;
        config.advanced_analytics.enable_anomaly_detection = false;
        config.advanced_analytics.enable_risk_assessment = false;
        config.client_analysis.enable_client_analysis = false;
        let roster = Roster::default();

        let output = Pipeline::new(&config, &roster, today()).run(&create_test_dataset());
        assert!(output.das_plus.is_none());
        assert!(output.forecast.is_none());
        assert!(output.anomalies.is_none());
        assert!(output.risk.is_none());
        assert!(output.clients.is_none());
    }

    #[test]
    fn test_date_window_shrinks_working_set() {
        let mut dataset = create_test_dataset();
        dataset.records[1].end_date = NaiveDate::from_ymd_opt(2020, 1, 1);

        let mut config = Config::default();
        config.project_filtering.enable_date_filter = true;
        config.client_analysis.min_projects_threshold = 2;
        let roster = Roster::default();

        let output = Pipeline::new(&config, &roster, today()).run(&dataset);
        assert_eq!(output.counts.in_scope, 2);
        assert_eq!(output.date_window.map(|w| w.excluded), Some(1));
        // Client analysis still sees the closed project
        let acme = &output.clients.unwrap().clients[0];
        assert_eq!(acme.total_projects, 2);
    }
}

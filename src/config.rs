//! Configuration file handling.
//!
//! This module handles loading, validating, and merging configuration
//! from `.consultant-metrics.toml` files.

use crate::error::{ConfigError, ValidationErrors};
use crate::models::TrendMetric;
use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// `today` minus `days`, or `None` when the result leaves chrono's date range.
pub fn days_before(today: NaiveDate, days: i64) -> Option<NaiveDate> {
    today.checked_sub_signed(TimeDelta::try_days(days)?)
}

/// `today`'s year shifted by `offset`, or `None` when that year has no calendar date.
pub fn offset_year(today: NaiveDate, offset: i32) -> Option<i32> {
    let year = today.year().checked_add(offset)?;
    NaiveDate::from_ymd_opt(year, 1, 1).map(|_| year)
}

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".consultant-metrics.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Input file locations.
    #[serde(default)]
    pub files: FilesConfig,

    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Variance thresholds.
    #[serde(default)]
    pub thresholds: Thresholds,

    /// Consultant composite scoring.
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Solution architect composite scoring.
    #[serde(default)]
    pub solution_architect_scoring: ArchitectScoringConfig,

    /// DAS+ analysis settings.
    #[serde(default)]
    pub das_plus_analysis: DasPlusConfig,

    /// Forecast, anomaly, and risk settings.
    #[serde(default)]
    pub advanced_analytics: AnalyticsConfig,

    /// Date-window filter.
    #[serde(default)]
    pub project_filtering: DateFilterConfig,

    /// Customer analysis settings.
    #[serde(default)]
    pub client_analysis: ClientAnalysisConfig,

    /// Data-quality check settings.
    #[serde(default)]
    pub inconsistent_project_check: QualityCheckConfig,

    /// Multi-period comparison settings.
    #[serde(default)]
    pub trending_analysis: TrendingConfig,
}

/// Input file locations. CLI flags take precedence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilesConfig {
    /// Project records (CSV).
    #[serde(default)]
    pub projects_file: Option<PathBuf>,

    /// Tracked consultants, one name per line.
    #[serde(default)]
    pub consultants_file: Option<PathBuf>,

    /// Tracked solution architects, one name per line.
    #[serde(default)]
    pub architects_file: Option<PathBuf>,

    /// Consultant/project exclusion pairs (CSV).
    #[serde(default)]
    pub exclusions_file: Option<PathBuf>,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Show composite scores in the rankings.
    #[serde(default)]
    pub show_composite: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            show_composite: false,
        }
    }
}

fn default_output() -> String {
    "consultant_metrics_report.md".to_string()
}

/// Variance cutoffs. Variance is `(actual - budget) / budget`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thresholds {
    /// Strict cutoff for the efficiency score.
    #[serde(default = "default_efficiency_threshold")]
    pub efficiency_threshold: f64,

    /// Lenient cutoff for the success ratio.
    #[serde(default = "default_success_threshold")]
    pub success_threshold: f64,

    /// Below this a project is marked green (under budget).
    #[serde(default = "default_green_threshold")]
    pub green_threshold: f64,

    /// Above this a project is marked yellow.
    #[serde(default = "default_yellow_threshold")]
    pub yellow_threshold: f64,

    /// Above this a project is marked red.
    #[serde(default = "default_red_threshold")]
    pub red_threshold: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            efficiency_threshold: default_efficiency_threshold(),
            success_threshold: default_success_threshold(),
            green_threshold: default_green_threshold(),
            yellow_threshold: default_yellow_threshold(),
            red_threshold: default_red_threshold(),
        }
    }
}

fn default_efficiency_threshold() -> f64 {
    0.15
}

fn default_success_threshold() -> f64 {
    0.30
}

fn default_green_threshold() -> f64 {
    -0.10
}

fn default_yellow_threshold() -> f64 {
    0.10
}

fn default_red_threshold() -> f64 {
    0.30
}

/// Consultant composite score: efficiency plus a capped volume bonus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_hours_per_point")]
    pub hours_per_bonus_point: f64,

    #[serde(default = "default_max_multiplier")]
    pub max_hours_multiplier: f64,

    #[serde(default = "default_bonus_points")]
    pub bonus_points_per_1000_hours: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            hours_per_bonus_point: default_hours_per_point(),
            max_hours_multiplier: default_max_multiplier(),
            bonus_points_per_1000_hours: default_bonus_points(),
        }
    }
}

fn default_hours_per_point() -> f64 {
    1000.0
}

fn default_max_multiplier() -> f64 {
    3.0
}

fn default_bonus_points() -> f64 {
    5.0
}

/// Solution architect composite score: success rate times capped volume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchitectScoringConfig {
    #[serde(default = "default_hours_per_point")]
    pub hours_per_multiplier: f64,

    #[serde(default = "default_max_multiplier")]
    pub max_volume_multiplier: f64,
}

impl Default for ArchitectScoringConfig {
    fn default() -> Self {
        Self {
            hours_per_multiplier: default_hours_per_point(),
            max_volume_multiplier: default_max_multiplier(),
        }
    }
}

/// DAS+ (Delivery Accuracy Score Plus) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DasPlusConfig {
    #[serde(default = "default_true")]
    pub enable_das_plus: bool,

    /// Lower bound of the review sampling band (inclusive).
    #[serde(default = "default_review_min")]
    pub review_das_min: f64,

    /// Upper bound of the review sampling band (inclusive).
    #[serde(default = "default_review_max")]
    pub review_das_max: f64,

    #[serde(default = "default_sample_count")]
    pub sample_projects_per_consultant: u32,

    /// Offset applied to the current year for the "current year" slice. Must be <= 0.
    #[serde(default)]
    pub current_year_offset: i32,

    /// Consultants with fewer scored projects are left out of the summaries.
    #[serde(default = "default_min_projects")]
    pub min_projects_for_review: u32,

    /// Seed for review-project sampling.
    #[serde(default = "default_seed")]
    pub sample_seed: u64,
}

impl Default for DasPlusConfig {
    fn default() -> Self {
        Self {
            enable_das_plus: true,
            review_das_min: default_review_min(),
            review_das_max: default_review_max(),
            sample_projects_per_consultant: default_sample_count(),
            current_year_offset: 0,
            min_projects_for_review: default_min_projects(),
            sample_seed: default_seed(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_review_min() -> f64 {
    0.3
}

fn default_review_max() -> f64 {
    0.9
}

fn default_sample_count() -> u32 {
    2
}

fn default_min_projects() -> u32 {
    3
}

fn default_seed() -> u64 {
    42
}

/// How the anomaly detector computes its reference statistics.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyMode {
    /// Running statistics over the variances seen so far (input-order dependent).
    #[default]
    Incremental,
    /// Statistics over the whole tracked population, computed before flagging.
    Population,
}

/// Forecast, anomaly detection, and risk assessment settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default = "default_true")]
    pub enable_predictive: bool,

    #[serde(default = "default_true")]
    pub enable_anomaly_detection: bool,

    #[serde(default = "default_true")]
    pub enable_risk_assessment: bool,

    /// Standard deviations from the mean before a variance is anomalous.
    #[serde(default = "default_anomaly_threshold")]
    pub anomaly_threshold: f64,

    #[serde(default)]
    pub anomaly_mode: AnomalyMode,

    /// Budgets above this many hours add the large-budget risk factor.
    #[serde(default = "default_risk_hours")]
    pub risk_threshold_hours: f64,

    /// Variances above this add the high-overrun risk factor.
    #[serde(default = "default_risk_variance")]
    pub risk_threshold_variance: f64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            enable_predictive: true,
            enable_anomaly_detection: true,
            enable_risk_assessment: true,
            anomaly_threshold: default_anomaly_threshold(),
            anomaly_mode: AnomalyMode::default(),
            risk_threshold_hours: default_risk_hours(),
            risk_threshold_variance: default_risk_variance(),
        }
    }
}

fn default_anomaly_threshold() -> f64 {
    2.0
}

fn default_risk_hours() -> f64 {
    500.0
}

fn default_risk_variance() -> f64 {
    0.5
}

/// How the date-window cutoff is computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    /// `today - days_from_today`.
    #[default]
    Days,
    /// A fixed `specific_date`.
    Date,
}

/// Date-window filter for closed projects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateFilterConfig {
    #[serde(default)]
    pub enable_date_filter: bool,

    #[serde(default)]
    pub filter_type: FilterType,

    #[serde(default = "default_days_back")]
    pub days_from_today: i64,

    /// Fixed cutoff in `YYYY-MM-DD` form, used when `filter_type = "date"`.
    #[serde(default)]
    pub specific_date: String,

    #[serde(default = "default_true")]
    pub exclude_closed_before_date: bool,
}

impl Default for DateFilterConfig {
    fn default() -> Self {
        Self {
            enable_date_filter: false,
            filter_type: FilterType::Days,
            days_from_today: default_days_back(),
            specific_date: String::new(),
            exclude_closed_before_date: true,
        }
    }
}

fn default_days_back() -> i64 {
    90
}

impl DateFilterConfig {
    /// The cutoff before which closed projects are dropped, if the window is active.
    ///
    /// Returns `None` when the filter is disabled, the fixed date does not
    /// parse, or the day count reaches past the earliest representable date.
    /// Validation rejects the last two before a run starts.
    pub fn cutoff(&self, today: NaiveDate) -> Option<NaiveDate> {
        if !self.enable_date_filter || !self.exclude_closed_before_date {
            return None;
        }

        match self.filter_type {
            FilterType::Days => days_before(today, self.days_from_today),
            FilterType::Date => NaiveDate::parse_from_str(self.specific_date.trim(), "%Y-%m-%d").ok(),
        }
    }
}

/// Customer analysis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientAnalysisConfig {
    #[serde(default = "default_true")]
    pub enable_client_analysis: bool,

    #[serde(default = "default_min_projects")]
    pub min_projects_threshold: u32,

    #[serde(default = "default_true")]
    pub track_consultant_client_performance: bool,
}

impl Default for ClientAnalysisConfig {
    fn default() -> Self {
        Self {
            enable_client_analysis: true,
            min_projects_threshold: default_min_projects(),
            track_consultant_client_performance: true,
        }
    }
}

/// Data-quality check for stale or missing project statuses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityCheckConfig {
    /// Closed projects still open as jobs are flagged once older than this.
    #[serde(default = "default_old_days")]
    pub old_project_days: i64,

    #[serde(default = "default_true")]
    pub include_na_status: bool,
}

impl Default for QualityCheckConfig {
    fn default() -> Self {
        Self {
            old_project_days: default_old_days(),
            include_na_status: true,
        }
    }
}

fn default_old_days() -> i64 {
    730
}

/// One labelled input for trend comparison.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodInput {
    #[serde(default)]
    pub file: String,

    #[serde(default)]
    pub period: String,
}

/// Multi-period trend comparison settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendingConfig {
    #[serde(default)]
    pub enable_trending: bool,

    #[serde(default)]
    pub input_files: Vec<PeriodInput>,

    #[serde(default = "default_comparison_metrics")]
    pub comparison_metrics: Vec<TrendMetric>,
}

impl Default for TrendingConfig {
    fn default() -> Self {
        Self {
            enable_trending: false,
            input_files: Vec::new(),
            comparison_metrics: default_comparison_metrics(),
        }
    }
}

fn default_comparison_metrics() -> Vec<TrendMetric> {
    vec![
        TrendMetric::EfficiencyScore,
        TrendMetric::SuccessRatio,
        TrendMetric::CompositeScore,
        TrendMetric::TotalHours,
    ]
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were actually given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref input) = args.input {
            self.files.projects_file = Some(input.clone());
        }
        if let Some(ref consultants) = args.consultants {
            self.files.consultants_file = Some(consultants.clone());
        }
        if let Some(ref architects) = args.architects {
            self.files.architects_file = Some(architects.clone());
        }
        if let Some(ref exclusions) = args.exclusions {
            self.files.exclusions_file = Some(exclusions.clone());
        }

        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if args.show_composite {
            self.general.show_composite = true;
        }

        if let Some(seed) = args.seed {
            self.das_plus_analysis.sample_seed = seed;
        }
        if let Some(mode) = args.anomaly_mode {
            self.advanced_analytics.anomaly_mode = mode;
        }

        // Periods given on the command line replace the configured list
        if !args.periods.is_empty() {
            self.trending_analysis.enable_trending = true;
            self.trending_analysis.input_files = args.periods.clone();
        }
    }

    /// Check every setting and report all problems at once.
    ///
    /// `today` anchors the "not in the future" checks.
    pub fn validate(&self, today: NaiveDate) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();

        let t = &self.thresholds;
        if t.efficiency_threshold > t.success_threshold {
            errors.push(ConfigError::ThresholdOrder {
                efficiency: t.efficiency_threshold,
                success: t.success_threshold,
            });
        }
        if !(t.green_threshold < t.yellow_threshold && t.yellow_threshold < t.red_threshold) {
            errors.push(ConfigError::BandOrder {
                green: t.green_threshold,
                yellow: t.yellow_threshold,
                red: t.red_threshold,
            });
        }
        if (t.red_threshold - t.success_threshold).abs() > 0.01 {
            warn!(
                "red_threshold ({}) should match success_threshold ({}) so red projects line up with failed ones",
                t.red_threshold, t.success_threshold
            );
        }

        if self.scoring.hours_per_bonus_point <= 0.0 {
            errors.push(ConfigError::NotPositive {
                field: "hours_per_bonus_point",
                value: self.scoring.hours_per_bonus_point,
            });
        }
        if self.solution_architect_scoring.hours_per_multiplier <= 0.0 {
            errors.push(ConfigError::NotPositive {
                field: "hours_per_multiplier",
                value: self.solution_architect_scoring.hours_per_multiplier,
            });
        }

        self.validate_date_filter(today, &mut errors);
        self.validate_das_plus(today, &mut errors);

        let trending = &self.trending_analysis;
        if trending.enable_trending {
            if trending.input_files.len() < 2 {
                errors.push(ConfigError::TooFewPeriods(trending.input_files.len()));
            }
            for (index, input) in trending.input_files.iter().enumerate() {
                if input.file.trim().is_empty() {
                    errors.push(ConfigError::IncompletePeriod {
                        index,
                        field: "file",
                    });
                }
                if input.period.trim().is_empty() {
                    errors.push(ConfigError::IncompletePeriod {
                        index,
                        field: "period",
                    });
                }
            }
        }

        if self.client_analysis.enable_client_analysis
            && self.client_analysis.min_projects_threshold == 0
        {
            errors.push(ConfigError::NotPositive {
                field: "min_projects_threshold",
                value: 0.0,
            });
        }

        if self.inconsistent_project_check.old_project_days <= 0 {
            errors.push(ConfigError::NotPositive {
                field: "old_project_days",
                value: self.inconsistent_project_check.old_project_days as f64,
            });
        } else if days_before(today, self.inconsistent_project_check.old_project_days).is_none() {
            errors.push(ConfigError::DateOutOfRange {
                field: "old_project_days",
                value: self.inconsistent_project_check.old_project_days,
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(errors))
        }
    }

    fn validate_date_filter(&self, today: NaiveDate, errors: &mut Vec<ConfigError>) {
        let filtering = &self.project_filtering;
        if !filtering.enable_date_filter {
            return;
        }

        match filtering.filter_type {
            FilterType::Days => {
                if filtering.days_from_today <= 0 {
                    errors.push(ConfigError::NotPositive {
                        field: "days_from_today",
                        value: filtering.days_from_today as f64,
                    });
                } else if days_before(today, filtering.days_from_today).is_none() {
                    errors.push(ConfigError::DateOutOfRange {
                        field: "days_from_today",
                        value: filtering.days_from_today,
                    });
                } else if filtering.days_from_today > 3650 {
                    warn!(
                        "days_from_today ({}) covers more than 10 years of data",
                        filtering.days_from_today
                    );
                }
            }
            FilterType::Date => {
                match NaiveDate::parse_from_str(filtering.specific_date.trim(), "%Y-%m-%d") {
                    Ok(date) if date > today => {
                        errors.push(ConfigError::FutureDate(filtering.specific_date.clone()))
                    }
                    Ok(_) => {}
                    Err(_) => errors.push(ConfigError::BadDate(filtering.specific_date.clone())),
                }
            }
        }
    }

    fn validate_das_plus(&self, today: NaiveDate, errors: &mut Vec<ConfigError>) {
        let das = &self.das_plus_analysis;
        if !das.enable_das_plus {
            return;
        }

        for (field, value) in [
            ("review_das_min", das.review_das_min),
            ("review_das_max", das.review_das_max),
        ] {
            if !(0.0..=1.0).contains(&value) {
                errors.push(ConfigError::OutOfUnitRange { field, value });
            }
        }
        if das.review_das_min >= das.review_das_max {
            errors.push(ConfigError::ReviewBandOrder {
                min: das.review_das_min,
                max: das.review_das_max,
            });
        }
        if das.sample_projects_per_consultant == 0 {
            errors.push(ConfigError::NotPositive {
                field: "sample_projects_per_consultant",
                value: 0.0,
            });
        }
        if das.min_projects_for_review == 0 {
            errors.push(ConfigError::NotPositive {
                field: "min_projects_for_review",
                value: 0.0,
            });
        }
        if das.current_year_offset > 0 {
            errors.push(ConfigError::FutureYearOffset(das.current_year_offset));
        } else if offset_year(today, das.current_year_offset).is_none() {
            errors.push(ConfigError::DateOutOfRange {
                field: "current_year_offset",
                value: das.current_year_offset as i64,
            });
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

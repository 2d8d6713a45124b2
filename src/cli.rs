//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::config::{AnomalyMode, PeriodInput};
use chrono::{Local, NaiveDate};
use clap::Parser;
use std::path::PathBuf;

/// consultant-metrics - delivery metrics for consultants and solution architects
///
/// Scores consultants and solution architects on budget efficiency,
/// success ratio, and DAS+ delivery alignment from a project export,
/// flags variance anomalies and risky projects, and compares periods.
///
/// Examples:
///   consultant-metrics --input projects.csv
///   consultant-metrics --input projects.csv --consultants consultants.txt --format json
///   consultant-metrics --input q2.csv --period Q1=q1.csv --period Q2=q2.csv
///   consultant-metrics --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Project export to analyze (CSV)
    ///
    /// Overrides `files.projects_file` from the config file.
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Tracked consultants, one name per line
    ///
    /// Without a roster every consultant in the data is analyzed.
    #[arg(long, value_name = "FILE")]
    pub consultants: Option<PathBuf>,

    /// Tracked solution architects, one name per line
    #[arg(long, value_name = "FILE")]
    pub architects: Option<PathBuf>,

    /// Consultant/project pairs to leave out (CSV with Consultant,Project headers)
    #[arg(long, value_name = "FILE")]
    pub exclusions: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .consultant-metrics.toml in the current directory
    #[arg(short, long, value_name = "FILE", env = "CONSULTANT_METRICS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Add a labelled period for trend comparison (repeatable)
    ///
    /// Example: --period Q1=q1.csv --period Q2=q2.csv
    #[arg(long = "period", value_name = "LABEL=FILE", value_parser = parse_period)]
    pub periods: Vec<PeriodInput>,

    /// Seed for DAS+ review-project sampling
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// How anomaly statistics are computed
    #[arg(long, value_name = "MODE")]
    pub anomaly_mode: Option<AnomalyMode>,

    /// Reference date for date windows and age checks (YYYY-MM-DD)
    ///
    /// Defaults to the local date.
    #[arg(long, value_name = "DATE", value_parser = parse_day)]
    pub today: Option<NaiveDate>,

    /// Show composite scores in the rankings
    #[arg(long)]
    pub show_composite: bool,

    /// Enable verbose logging output
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .consultant-metrics.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Parse `LABEL=FILE`.
fn parse_period(raw: &str) -> Result<PeriodInput, String> {
    let (label, file) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected LABEL=FILE, got '{}'", raw))?;
    let (label, file) = (label.trim(), file.trim());
    if label.is_empty() || file.is_empty() {
        return Err(format!("period label and file must both be set in '{}'", raw));
    }

    Ok(PeriodInput {
        file: file.to_string(),
        period: label.to_string(),
    })
}

fn parse_day(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD, got '{}': {}", raw, e))
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        for (flag, path) in [
            ("--input", &self.input),
            ("--consultants", &self.consultants),
            ("--architects", &self.architects),
            ("--exclusions", &self.exclusions),
        ] {
            if let Some(path) = path {
                if path.is_dir() {
                    return Err(format!("{} expects a file, got directory: {}", flag, path.display()));
                }
            }
        }

        if let Some(ref input) = self.input {
            if !input.exists() {
                return Err(format!("Input file does not exist: {}", input.display()));
            }
        }

        if self.periods.len() == 1 {
            return Err("Trend comparison needs at least two --period values".to_string());
        }

        Ok(())
    }

    /// The date treated as "today".
    pub fn reference_date(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            input: None,
            consultants: None,
            architects: None,
            exclusions: None,
            config: None,
            output: None,
            format: OutputFormat::Markdown,
            periods: Vec::new(),
            seed: None,
            anomaly_mode: None,
            today: None,
            show_composite: false,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_from_command_line() {
        let args = Args::try_parse_from([
            "consultant-metrics",
            "--consultants",
            "team.txt",
            "--format",
            "json",
            "--period",
            "Q1=q1.csv",
            "--period",
            "Q2 = q2.csv",
            "--anomaly-mode",
            "population",
            "--today",
            "2025-03-31",
            "--seed",
            "7",
        ])
        .unwrap();

        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.consultants, Some(PathBuf::from("team.txt")));
        assert_eq!(args.periods.len(), 2);
        assert_eq!(args.periods[1].period, "Q2");
        assert_eq!(args.periods[1].file, "q2.csv");
        assert_eq!(args.anomaly_mode, Some(AnomalyMode::Population));
        assert_eq!(args.today, NaiveDate::from_ymd_opt(2025, 3, 31));
        assert_eq!(args.seed, Some(7));
    }

    #[test]
    fn test_parse_period_errors() {
        assert!(parse_period("q1.csv").is_err());
        assert!(parse_period("=q1.csv").is_err());
        assert!(parse_period("Q1=").is_err());
    }

    #[test]
    fn test_bad_today_rejected() {
        let result = Args::try_parse_from(["consultant-metrics", "--today", "31/03/2025"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_missing_input() {
        let mut args = make_args();
        args.input = Some(PathBuf::from("/nonexistent/projects.csv"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_single_period() {
        let mut args = make_args();
        args.periods = vec![parse_period("Q1=q1.csv").unwrap()];
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_init_config_skips_validation() {
        let mut args = make_args();
        args.init_config = true;
        args.input = Some(PathBuf::from("/nonexistent/projects.csv"));
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_reference_date() {
        let mut args = make_args();
        args.today = NaiveDate::from_ymd_opt(2024, 2, 29);
        assert_eq!(args.reference_date(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}

//! Error types.
//!
//! Per-record parse problems never surface here; they degrade to defaults
//! inside the ingestion code. These types cover the failures that stop a
//! run (configuration) or a stage (schema), plus input I/O.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A single configuration validation failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error(
        "efficiency_threshold ({efficiency}) must be <= success_threshold ({success}); \
         efficiency is the stricter cutoff, try efficiency_threshold = {success} or lower"
    )]
    ThresholdOrder { efficiency: f64, success: f64 },

    #[error(
        "color thresholds must satisfy green < yellow < red (got green={green}, yellow={yellow}, red={red}); \
         suggested: green=-0.1, yellow=0.1, red=0.3"
    )]
    BandOrder { green: f64, yellow: f64, red: f64 },

    #[error("{field} ({value}) must be positive")]
    NotPositive { field: &'static str, value: f64 },

    #[error("specific_date '{0}' is not in YYYY-MM-DD format, use a date like '2024-01-01'")]
    BadDate(String),

    #[error("specific_date ({0}) cannot be in the future; use a past date or switch to filter_type = \"days\"")]
    FutureDate(String),

    #[error("{field} ({value}) must be between 0.0 and 1.0; DAS+ scores range from 0.0 (worst) to 1.0 (perfect)")]
    OutOfUnitRange { field: &'static str, value: f64 },

    #[error("review_das_min ({min}) must be < review_das_max ({max}); suggested: min=0.3, max=0.9")]
    ReviewBandOrder { min: f64, max: f64 },

    #[error(
        "current_year_offset ({0}) cannot point at a future year; use 0 for the current year, \
         -1 for the previous year, and so on"
    )]
    FutureYearOffset(i32),

    #[error(
        "{field} ({value}) reaches outside the supported calendar range; \
         use a value that stays within a few centuries of today"
    )]
    DateOutOfRange { field: &'static str, value: i64 },

    #[error("trending analysis requires at least 2 input periods (got {0}); add entries to trending_analysis.input_files")]
    TooFewPeriods(usize),

    #[error("trending input #{index} is missing its '{field}' field; each entry needs 'file' and 'period'")]
    IncompletePeriod { index: usize, field: &'static str },
}

/// Every validation failure found in one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationErrors(pub Vec<ConfigError>);

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "configuration validation failed:")?;
        for err in &self.0 {
            writeln!(f, "  - {}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// A required logical field could not be resolved from the input headers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("could not find a '{field}' column (available columns: {})", available.join(", "))]
    MissingField {
        field: &'static str,
        available: Vec<String>,
    },
}

/// Failures reading input tables, rosters, or exclusion files.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("exclusion file {0} needs 'Consultant' and 'Project' columns")]
    ExclusionHeaders(PathBuf),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

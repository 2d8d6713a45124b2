//! consultant-metrics - delivery metrics for consultants and solution architects
//!
//! A CLI tool that reads a project financials export and ranks the people
//! assigned to those projects on budget efficiency, success ratio, and
//! DAS+ delivery alignment, then writes a Markdown or JSON report.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Error (bad arguments, invalid config, unreadable or unusable input)

mod analysis;
mod cli;
mod config;
mod error;
mod ingest;
mod models;
mod report;

use analysis::filters::Roster;
use analysis::Pipeline;
use anyhow::{bail, Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, DEFAULT_CONFIG_FILE};
use models::{Dataset, Report, ReportMetadata};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        if let Err(e) = handle_init_config() {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
        return;
    }

    // Initialize logging
    init_logging(&args);

    info!("consultant-metrics v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run_analysis(&args) {
        error!("Analysis failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Handle --init-config: generate a default config file.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        bail!(
            "{} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to set input files, thresholds, and analytics options.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// `RUST_LOG` wins over the verbosity flags when set.
fn init_logging(args: &Args) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level().to_string().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete analysis workflow.
fn run_analysis(args: &Args) -> Result<()> {
    let start_time = Instant::now();
    let today = args.reference_date();

    // Load configuration
    let mut config = load_config(args)?;
    config.merge_with_args(args);
    config.validate(today)?;

    let Some(input) = config.files.projects_file.clone() else {
        bail!(
            "No projects file given. Pass --input or set files.projects_file in {}",
            DEFAULT_CONFIG_FILE
        );
    };

    // Step 1: Load inputs
    println!("📥 Loading projects: {}", input.display());
    let dataset = ingest::load_dataset(&input)?;
    let consultants = ingest::load_roster(config.files.consultants_file.as_deref(), "consultant")?;
    let architects = ingest::load_roster(config.files.architects_file.as_deref(), "solution architect")?;
    let exclusions = ingest::load_exclusions(config.files.exclusions_file.as_deref())?;
    let roster = Roster::new(consultants, architects, exclusions);

    if dataset.is_empty() {
        warn!("{} has no project rows", input.display());
    }

    // Step 2: Run the pipeline
    println!("🔬 Analyzing {} records...", dataset.len());
    let pipeline = Pipeline::new(&config, &roster, today);
    let analysis = pipeline.run(&dataset);

    // Step 3: Compare periods
    let trends = if config.trending_analysis.enable_trending {
        println!(
            "📈 Comparing {} periods...",
            config.trending_analysis.input_files.len()
        );
        let periods = load_periods(&config)?;
        Some(analysis::trend::analyze(
            &pipeline,
            &periods,
            &config.trending_analysis.comparison_metrics,
        ))
    } else {
        None
    };

    // Step 4: Build and save the report
    println!("📝 Generating report...");
    let duration = start_time.elapsed().as_secs_f64();

    let metadata = ReportMetadata {
        input_file: input.display().to_string(),
        analysis_date: Utc::now(),
        reference_date: today,
        tracked_consultants: roster.tracked_consultants(),
        tracked_architects: roster.tracked_architects(),
        exclusion_rules: roster.exclusion_count(),
        show_composite: config.general.show_composite,
        duration_seconds: duration,
    };

    let report = Report {
        metadata,
        analysis,
        trends,
    };

    let output_path = Path::new(&config.general.output);
    match args.format {
        OutputFormat::Json => report::write_json_report(&report, output_path)?,
        OutputFormat::Markdown => report::write_report(&report, output_path)?,
    }

    // Print summary
    let analysis = &report.analysis;
    println!("\n📊 Analysis Summary:");
    println!(
        "   Records: {} loaded, {} unique jobs, {} in scope",
        analysis.counts.loaded, analysis.counts.after_merge, analysis.counts.in_scope
    );
    println!("   Consultants ranked: {}", analysis.consultants.len());
    println!("   Solution architects ranked: {}", analysis.architects.len());
    println!(
        "   Company success rate: {:.1}% ({} of {} projects)",
        analysis.company.success_rate, analysis.company.within_budget, analysis.company.total_projects
    );
    if let Some(ref anomalies) = analysis.anomalies {
        println!("   Variance anomalies: {}", anomalies.len());
    }
    if let Some(ref risk) = analysis.risk {
        println!("   High-risk projects: {}", risk.projects.len());
    }
    if !analysis.quality.issues.is_empty() {
        println!("   ⚠️  Data quality issues: {}", analysis.quality.issues.len());
    }
    println!("   Duration: {:.1}s", duration);
    println!("\n✅ Analysis complete! Report saved to: {}", output_path.display());

    Ok(())
}

/// Load every configured trend period, in order.
fn load_periods(config: &Config) -> Result<Vec<(String, Dataset)>> {
    config
        .trending_analysis
        .input_files
        .iter()
        .map(|period| {
            info!("Loading period {} from {}", period.period, period.file);
            let dataset = ingest::load_dataset(Path::new(&period.file))
                .with_context(|| format!("Failed to load period '{}'", period.period))?;
            Ok((period.period.clone(), dataset))
        })
        .collect()
}

/// Load configuration from file or use defaults.
///
/// An explicit `--config` must load. A malformed default file is also an error.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default()? {
        Some(config) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        None => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}

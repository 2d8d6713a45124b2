//! Markdown report generation.
//!
//! This module renders the metrics report as Markdown or JSON from the
//! analysis results.

use crate::analysis::aggregator::{CompanyPerformance, Forecast, PracticeSummary};
use crate::analysis::anomaly::Anomaly;
use crate::analysis::clients::ClientAnalysis;
use crate::analysis::das::{DasAnalysis, DasSummary};
use crate::analysis::quality::QualityIssueKind;
use crate::analysis::risk::RiskAssessment;
use crate::analysis::trend::{TrendDelta, TrendReport};
use crate::analysis::AnalysisOutput;
use crate::models::{ArchitectMetrics, ConsultantMetrics, ProjectDetail, Report, ReportMetadata};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::io::Write;
use std::path::Path;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report) -> String {
    let analysis = &report.analysis;
    let show_composite = report.metadata.show_composite;
    let mut output = String::new();

    // Title
    output.push_str("# Consultant Metrics Report\n\n");

    output.push_str(&generate_metadata_section(&report.metadata, analysis));
    output.push_str(&generate_table_of_contents(report));
    output.push_str(&generate_quality_section(analysis));
    output.push_str(&generate_consultant_section(&analysis.consultants, show_composite));
    output.push_str(&generate_architect_section(&analysis.architects, show_composite));
    output.push_str(&generate_portfolio_section(&analysis.company, &analysis.practice));

    if let Some(ref das) = analysis.das_plus {
        output.push_str(&generate_das_section(das));
    }
    if let Some(ref forecast) = analysis.forecast {
        output.push_str(&generate_forecast_section(forecast));
    }
    if let Some(ref anomalies) = analysis.anomalies {
        output.push_str(&generate_anomaly_section(anomalies));
    }
    if let Some(ref risk) = analysis.risk {
        output.push_str(&generate_risk_section(risk));
    }
    if let Some(ref clients) = analysis.clients {
        output.push_str(&generate_client_section(clients));
    }
    if let Some(ref trends) = report.trends {
        output.push_str(&generate_trend_section(trends));
    }

    output.push_str(&generate_footer());

    output
}

/// Make a value safe for a table cell.
fn cell(value: &str) -> String {
    let value = value.replace('|', "\\|").replace(['\r', '\n'], " ");
    if value.trim().is_empty() {
        "-".to_string()
    } else {
        value
    }
}

fn date_cell(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata, analysis: &AnalysisOutput) -> String {
    let mut section = String::new();
    let roster_size = |n: usize| {
        if n == 0 {
            "everyone".to_string()
        } else {
            n.to_string()
        }
    };

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Input File:** `{}`\n", metadata.input_file));
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        metadata.analysis_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Reference Date:** {}\n",
        metadata.reference_date.format("%Y-%m-%d")
    ));
    section.push_str(&format!(
        "- **Records:** {} loaded, {} after merging duplicate jobs, {} in scope\n",
        analysis.counts.loaded, analysis.counts.after_merge, analysis.counts.in_scope
    ));
    section.push_str(&format!(
        "- **Tracked Consultants:** {}\n",
        roster_size(metadata.tracked_consultants)
    ));
    section.push_str(&format!(
        "- **Tracked Solution Architects:** {}\n",
        roster_size(metadata.tracked_architects)
    ));
    if metadata.exclusion_rules > 0 {
        section.push_str(&format!(
            "- **Exclusion Rules:** {}\n",
            metadata.exclusion_rules
        ));
    }
    section.push_str(&format!(
        "- **Analysis Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    if !analysis.skipped_stages.is_empty() {
        section.push_str("> **Skipped:**\n");
        for stage in &analysis.skipped_stages {
            section.push_str(&format!("> - {}\n", stage));
        }
        section.push('\n');
    }

    section
}

/// Generate the table of contents.
fn generate_table_of_contents(report: &Report) -> String {
    let analysis = &report.analysis;
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Metadata](#metadata)\n");
    toc.push_str("- [Data Quality](#data-quality)\n");
    toc.push_str("- [Consultant Rankings](#consultant-rankings)\n");
    toc.push_str("- [Solution Architect Rankings](#solution-architect-rankings)\n");
    toc.push_str("- [Portfolio Summary](#portfolio-summary)\n");

    if analysis.das_plus.is_some() {
        toc.push_str("- [DAS+ Analysis](#das-analysis)\n");
    }
    if analysis.forecast.is_some() {
        toc.push_str("- [Forecast](#forecast)\n");
    }
    if analysis.anomalies.is_some() {
        toc.push_str("- [Variance Anomalies](#variance-anomalies)\n");
    }
    if analysis.risk.is_some() {
        toc.push_str("- [Risk Assessment](#risk-assessment)\n");
    }
    if analysis.clients.is_some() {
        toc.push_str("- [Client Analysis](#client-analysis)\n");
    }
    if report.trends.is_some() {
        toc.push_str("- [Trends](#trends)\n");
    }

    toc.push('\n');

    toc
}

/// Generate the data-quality section.
fn generate_quality_section(analysis: &AnalysisOutput) -> String {
    let mut section = String::new();
    let quality = &analysis.quality;

    section.push_str("## Data Quality\n\n");

    if let Some(ref window) = analysis.date_window {
        section.push_str(&format!(
            "Date window: closed projects ending before **{}** are out of scope \
             ({} excluded, {} remaining).\n\n",
            window.cutoff.format("%Y-%m-%d"),
            window.excluded,
            window.remaining
        ));
    }

    section.push_str("| Check | Count |\n");
    section.push_str("|:---|:---:|\n");
    for kind in [QualityIssueKind::StaleOpenJob, QualityIssueKind::MissingStatus] {
        section.push_str(&format!("| {} | {} |\n", kind, quality.count(kind)));
    }
    section.push_str(&format!(
        "| Missing or invalid budget | {} |\n\n",
        analysis.missing_budget.len()
    ));

    if !quality.issues.is_empty() {
        section.push_str("### Status Inconsistencies\n\n");
        if let Some(before) = quality.stale_before {
            section.push_str(&format!(
                "*Open jobs are flagged when their project closed before {}.*\n\n",
                before.format("%Y-%m-%d")
            ));
        }
        section.push_str("| Job | Customer | Issue | Job Status | Project Status | End Date |\n");
        section.push_str("|:---|:---|:---|:---:|:---:|:---:|\n");
        for issue in &quality.issues {
            section.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} |\n",
                cell(&issue.job_id),
                cell(&issue.customer),
                issue.kind,
                cell(&issue.job_status),
                cell(&issue.project_status),
                date_cell(issue.end_date)
            ));
        }
        section.push('\n');
    }

    if !analysis.missing_budget.is_empty() {
        section.push_str("### Projects Missing a Budget\n\n");
        section.push_str("| Job | Customer | Description | Budget Cell |\n");
        section.push_str("|:---|:---|:---|:---:|\n");
        for missing in &analysis.missing_budget {
            section.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                cell(&missing.job_id),
                cell(&missing.customer),
                cell(&missing.description),
                cell(&missing.budget_raw)
            ));
        }
        section.push('\n');
    }

    section
}

/// Generate one entity's project table.
fn generate_project_table(projects: &[ProjectDetail]) -> String {
    let mut table = String::new();

    table.push_str("| | Job | Customer | Description | Budget (h) | Actual (h) | Variance |\n");
    table.push_str("|:---:|:---|:---|:---|---:|---:|---:|\n");
    for project in projects {
        table.push_str(&format!(
            "| {} | {} | {} | {} | {:.1} | {:.1} | {:+.1}% |\n",
            project.band.emoji(),
            cell(&project.job_id),
            cell(&project.customer),
            cell(&project.description),
            project.budgeted_hours,
            project.actual_hours,
            project.variance_pct
        ));
    }
    table.push('\n');

    table
}

/// Generate the consultant rankings section.
fn generate_consultant_section(consultants: &[ConsultantMetrics], show_composite: bool) -> String {
    let mut section = String::new();

    section.push_str("## Consultant Rankings\n\n");

    if consultants.is_empty() {
        section.push_str("No consultants to rank.\n\n");
        return section;
    }

    if show_composite {
        section.push_str("| Rank | Consultant | Projects | Hours | Efficiency | Success | Composite | On Hold |\n");
        section.push_str("|:---:|:---|:---:|---:|---:|---:|---:|:---:|\n");
    } else {
        section.push_str("| Rank | Consultant | Projects | Hours | Efficiency | Success | On Hold |\n");
        section.push_str("|:---:|:---|:---:|---:|---:|---:|:---:|\n");
    }
    for (rank, c) in consultants.iter().enumerate() {
        let composite = if show_composite {
            format!(" {:.1} |", c.composite_score)
        } else {
            String::new()
        };
        section.push_str(&format!(
            "| {} | {} | {} | {:.1} | {:.1}% | {:.1}% |{} {} |\n",
            rank + 1,
            cell(&c.name),
            c.unique_projects,
            c.total_hours,
            c.efficiency_score,
            c.success_ratio,
            composite,
            c.projects_on_hold
        ));
    }
    section.push('\n');

    for c in consultants {
        section.push_str(&format!("### {}\n\n", c.name));
        section.push_str(&format!(
            "*Within budget: {} | Over budget: {} | On hold: {}*\n\n",
            c.projects_within_budget, c.projects_over_budget, c.projects_on_hold
        ));
        section.push_str(&generate_project_table(&c.projects));
    }

    section
}

/// Generate the solution architect rankings section.
fn generate_architect_section(architects: &[ArchitectMetrics], show_composite: bool) -> String {
    let mut section = String::new();

    section.push_str("## Solution Architect Rankings\n\n");

    if architects.is_empty() {
        section.push_str("No solution architects to rank.\n\n");
        return section;
    }

    section.push_str("*Hours are split equally among the architects on a project.*\n\n");
    if show_composite {
        section.push_str("| Rank | Architect | Projects | Successful | Success | Budget (h) | Actual (h) | Variance | Composite |\n");
        section.push_str("|:---:|:---|:---:|:---:|---:|---:|---:|---:|---:|\n");
    } else {
        section.push_str("| Rank | Architect | Projects | Successful | Success | Budget (h) | Actual (h) | Variance |\n");
        section.push_str("|:---:|:---|:---:|:---:|---:|---:|---:|---:|\n");
    }
    for (rank, a) in architects.iter().enumerate() {
        let composite = if show_composite {
            format!(" {:.1} |", a.composite_score)
        } else {
            String::new()
        };
        section.push_str(&format!(
            "| {} | {} | {} | {} | {:.1}% | {:.1} | {:.1} | {:+.1}% |{}\n",
            rank + 1,
            cell(&a.name),
            a.total_projects,
            a.successful_projects,
            a.success_rate,
            a.total_budgeted_hours,
            a.total_actual_hours,
            a.variance_pct(),
            composite
        ));
    }
    section.push('\n');

    for a in architects {
        section.push_str(&format!("### {}\n\n", a.name));
        section.push_str(&generate_project_table(&a.projects));
    }

    section
}

/// Generate the company and practice summary.
fn generate_portfolio_section(company: &CompanyPerformance, practice: &PracticeSummary) -> String {
    let mut section = String::new();

    section.push_str("## Portfolio Summary\n\n");
    section.push_str("| Scope | Projects | Within Budget | Over Budget | Success Rate |\n");
    section.push_str("|:---|:---:|:---:|:---:|---:|\n");
    section.push_str(&format!(
        "| Company | {} | {} | {} | {:.1}% |\n",
        company.total_projects, company.within_budget, company.over_budget, company.success_rate
    ));
    let budgeted = practice.within_budget + practice.over_budget;
    let practice_rate = crate::analysis::aggregator::percent(practice.within_budget, budgeted);
    section.push_str(&format!(
        "| Tracked consultants | {} | {} | {} | {:.1}% |\n\n",
        practice.tracked_projects, practice.within_budget, practice.over_budget, practice_rate
    ));
    if practice.missing_budget > 0 {
        section.push_str(&format!(
            "{} tracked project(s) have no valid budget.\n\n",
            practice.missing_budget
        ));
    }

    section
}

fn generate_das_summary_table(summary: &DasSummary) -> String {
    let mut table = String::new();

    table.push_str(&format!("### {}\n\n", summary.period));
    if summary.rows.is_empty() {
        table.push_str("No consultant has enough scored projects.\n\n");
        return table;
    }
    table.push_str("| Consultant | Projects | Mean | Median | Low | High |\n");
    table.push_str("|:---|:---:|---:|---:|:---:|:---:|\n");
    for row in &summary.rows {
        table.push_str(&format!(
            "| {} | {} | {:.3} | {:.3} | {} | {} |\n",
            cell(&row.consultant),
            row.projects,
            row.mean,
            row.median,
            row.low_count,
            row.high_count
        ));
    }
    table.push('\n');

    table
}

/// Generate the DAS+ section.
fn generate_das_section(das: &DasAnalysis) -> String {
    let mut section = String::new();

    section.push_str("## DAS+ Analysis\n\n");
    section.push_str(&format!(
        "*{} scored consultant-project pairs. Current year: {}.*\n\n",
        das.scores.len(),
        das.reference_year
    ));

    section.push_str(&generate_das_summary_table(&das.all_time));
    section.push_str(&generate_das_summary_table(&das.current_year));
    section.push_str(&generate_das_summary_table(&das.date_filtered));

    section.push_str("### Review Projects\n\n");
    section.push_str(&format!(
        "*Sampled from scores between {:.2} and {:.2}.*\n\n",
        das.band.min, das.band.max
    ));
    if das.review_projects.is_empty() {
        section.push_str("No projects fall in the review band.\n\n");
        return section;
    }
    section.push_str("| Consultant | Job | Customer | DAS+ | Completion | Budget (h) | Actual (h) | End Date |\n");
    section.push_str("|:---|:---|:---|---:|---:|---:|---:|:---:|\n");
    for project in &das.review_projects {
        section.push_str(&format!(
            "| {} | {} | {} | {:.3} | {:.0}% | {:.1} | {:.1} | {} |\n",
            cell(&project.consultant),
            cell(&project.job_id),
            cell(&project.customer),
            project.score,
            project.completion_pct,
            project.budgeted_hours,
            project.actual_hours,
            date_cell(project.end_date)
        ));
    }
    section.push('\n');

    section
}

/// Generate the forecast section.
fn generate_forecast_section(forecast: &Forecast) -> String {
    let mut section = String::new();

    section.push_str("## Forecast\n\n");

    if !forecast.buckets.is_empty() {
        section.push_str("| Project Size | Projects | Historical Success |\n");
        section.push_str("|:---|:---:|---:|\n");
        for bucket in &forecast.buckets {
            section.push_str(&format!(
                "| {} | {} | {:.1}% |\n",
                bucket.bucket, bucket.projects, bucket.success_rate
            ));
        }
        section.push('\n');
    }

    if !forecast.top_performers.is_empty() {
        section.push_str("| Consultant | Efficiency | Predicted Success |\n");
        section.push_str("|:---|---:|---:|\n");
        for c in &forecast.top_performers {
            section.push_str(&format!(
                "| {} | {:.1}% | {:.1}% |\n",
                cell(&c.name),
                c.efficiency_score,
                c.predicted_success
            ));
        }
        section.push('\n');
    }

    section
}

/// Generate the anomaly section.
fn generate_anomaly_section(anomalies: &[Anomaly]) -> String {
    let mut section = String::new();

    section.push_str("## Variance Anomalies\n\n");

    if anomalies.is_empty() {
        section.push_str("No variance anomalies detected.\n\n");
        return section;
    }

    section.push_str("| Job | Customer | Description | Budget (h) | Actual (h) | Variance | Std Devs |\n");
    section.push_str("|:---|:---|:---|---:|---:|---:|---:|\n");
    for a in anomalies {
        section.push_str(&format!(
            "| {} | {} | {} | {:.1} | {:.1} | {:+.1}% | {:.2} |\n",
            cell(&a.job_id),
            cell(&a.customer),
            cell(&a.description),
            a.budgeted_hours,
            a.actual_hours,
            a.variance_pct,
            a.deviations
        ));
    }
    section.push('\n');

    section
}

/// Generate the risk section.
fn generate_risk_section(risk: &RiskAssessment) -> String {
    let mut section = String::new();

    section.push_str("## Risk Assessment\n\n");
    section.push_str(&format!(
        "- **Large-budget projects:** {}\n- **Complex-resourcing projects:** {}\n\n",
        risk.large_budget_projects, risk.complex_projects
    ));

    if risk.projects.is_empty() {
        section.push_str("No high-risk projects.\n\n");
        return section;
    }

    section.push_str("| Job | Customer | Budget (h) | Variance | Consultants | Factors | Score |\n");
    section.push_str("|:---|:---|---:|---:|:---:|:---|:---:|\n");
    for p in &risk.projects {
        let factors: Vec<String> = p.factors.iter().map(ToString::to_string).collect();
        section.push_str(&format!(
            "| {} | {} | {:.1} | {:+.1}% | {} | {} | {} |\n",
            cell(&p.job_id),
            cell(&p.customer),
            p.budgeted_hours,
            p.variance_pct,
            p.consultant_count,
            factors.join(", "),
            p.score
        ));
    }
    section.push('\n');

    section
}

/// Generate the client section.
fn generate_client_section(clients: &ClientAnalysis) -> String {
    let mut section = String::new();

    section.push_str("## Client Analysis\n\n");
    section.push_str(&format!(
        "*Customers and pairs with at least {} projects.*\n\n",
        clients.min_projects
    ));

    if clients.clients.is_empty() {
        section.push_str("No customer meets the project threshold.\n\n");
    } else {
        section.push_str("| Customer | Projects | Success | Efficiency | Budget (h) | Actual (h) | Avg Variance |\n");
        section.push_str("|:---|:---:|---:|---:|---:|---:|---:|\n");
        for c in &clients.clients {
            section.push_str(&format!(
                "| {} | {} | {:.1}% | {:.1}% | {:.1} | {:.1} | {:+.1}% |\n",
                cell(&c.customer),
                c.total_projects,
                c.success_rate,
                c.efficiency_rate,
                c.total_budgeted_hours,
                c.total_actual_hours,
                c.avg_variance_pct
            ));
        }
        section.push('\n');
    }

    if !clients.consultant_clients.is_empty() {
        section.push_str("### Consultant-Customer Performance\n\n");
        section.push_str("| Consultant | Customer | Projects | Success | Efficiency | Avg Variance |\n");
        section.push_str("|:---|:---|:---:|---:|---:|---:|\n");
        for pair in &clients.consultant_clients {
            section.push_str(&format!(
                "| {} | {} | {} | {:.1}% | {:.1}% | {:+.1}% |\n",
                cell(&pair.consultant),
                cell(&pair.customer),
                pair.total_projects,
                pair.success_rate,
                pair.efficiency_rate,
                pair.avg_variance_pct
            ));
        }
        section.push('\n');
    }

    section
}

fn generate_delta_rows(deltas: &[TrendDelta]) -> String {
    let mut rows = String::new();
    for d in deltas {
        rows.push_str(&format!(
            "| {} | {} | {} | {:.1} ({}) | {:.1} ({}) | {:+.1} | {:+.1}% |\n",
            cell(&d.entity),
            d.role,
            d.metric,
            d.first_value,
            d.first_period,
            d.last_value,
            d.last_period,
            d.change,
            d.change_pct
        ));
    }
    rows
}

const DELTA_HEADER: &str = "| Entity | Role | Metric | First | Last | Change | Change % |\n\
                            |:---|:---|:---|---:|---:|---:|---:|\n";

/// Generate the trend section.
fn generate_trend_section(trends: &TrendReport) -> String {
    let mut section = String::new();

    section.push_str("## Trends\n\n");
    section.push_str(&format!("*Periods: {}*\n\n", trends.periods.join(" → ")));

    section.push_str("| Period | Records | Consultants | Architects |\n");
    section.push_str("|:---|:---:|:---:|:---:|\n");
    for snapshot in &trends.snapshots {
        section.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            cell(&snapshot.label),
            snapshot.records,
            snapshot.consultants.len(),
            snapshot.architects.len()
        ));
    }
    section.push('\n');

    if !trends.top_improvers.is_empty() {
        section.push_str("### Top Improvers\n\n");
        section.push_str(DELTA_HEADER);
        section.push_str(&generate_delta_rows(&trends.top_improvers));
        section.push('\n');
    }

    if !trends.needs_attention.is_empty() {
        section.push_str("### Needs Attention\n\n");
        section.push_str(DELTA_HEADER);
        section.push_str(&generate_delta_rows(&trends.needs_attention));
        section.push('\n');
    }

    section.push_str("### All Changes\n\n");
    if trends.deltas.is_empty() {
        section.push_str("No entity appears in two or more periods.\n\n");
    } else {
        section.push_str(DELTA_HEADER);
        section.push_str(&generate_delta_rows(&trends.deltas));
        section.push('\n');
    }

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by consultant-metrics v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

/// Write the report to a file.
pub fn write_report(report: &Report, path: &Path) -> Result<()> {
    let content = generate_markdown_report(report);

    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create report file: {}", path.display()))?;
    file.write_all(content.as_bytes())?;

    Ok(())
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Write a JSON report to a file.
pub fn write_json_report(report: &Report, path: &Path) -> Result<()> {
    let content = generate_json_report(report)?;

    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create report file: {}", path.display()))?;
    file.write_all(content.as_bytes())?;

    Ok(())
}

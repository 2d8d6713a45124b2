//! DAS+ (Delivery Accuracy Score Plus).
//!
//! Scores how closely a project's budget consumption tracks its reported
//! completion, then summarizes the scores per consultant over three
//! slices of time and samples mid-range projects for review.

use super::aggregator::sort_desc_by;
use super::filters::{DateWindow, Roster};
use super::normalize::split_comma_list;
use crate::config::DasPlusConfig;
use crate::models::{Dataset, ProjectRecord};
use chrono::{Datelike, NaiveDate};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median, Statistics};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info, warn};

/// Scores below this count as low.
pub const LOW_SCORE: f64 = 0.75;
/// Scores at or above this count as high.
pub const HIGH_SCORE: f64 = 0.85;
/// Completion at or above this percentage counts as done.
pub const COMPLETE_PCT: f64 = 95.0;

/// One scored (project, consultant) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DasScoreRecord {
    pub job_id: String,
    pub consultant: String,
    pub score: f64,
    pub customer: String,
    pub description: String,
    pub status: String,
    pub end_date: Option<NaiveDate>,
    pub budgeted_hours: f64,
    pub actual_hours: f64,
    pub completion_pct: f64,
}

/// Per-project score, `None` without a positive budget or a completion figure.
pub fn das_plus(record: &ProjectRecord) -> Option<f64> {
    let budget = record.valid_budget()?;
    let completion_pct = record.completion_pct?;

    let completion = if record.status.to_lowercase().contains("closed") || completion_pct >= COMPLETE_PCT {
        1.0
    } else {
        completion_pct / 100.0
    };
    let consumption = record.actual_hours / budget;
    let score = (1.0 - (consumption - completion).abs()).clamp(0.0, 1.0);

    Some((score * 10_000.0).round() / 10_000.0)
}

/// Score every project and explode it per admitted consultant.
pub fn score_projects(dataset: &Dataset, roster: &Roster) -> Vec<DasScoreRecord> {
    let mut unscored = 0;
    let mut scores = Vec::new();

    for record in &dataset.records {
        let Some(score) = das_plus(record) else {
            unscored += 1;
            continue;
        };
        for consultant in split_comma_list(&record.consultants_raw) {
            if !roster.admits_consultant(&consultant, &record.job_id) {
                continue;
            }
            scores.push(DasScoreRecord {
                job_id: record.job_id.clone(),
                consultant,
                score,
                customer: record.customer.clone(),
                description: record.description.clone(),
                status: record.status.clone(),
                end_date: record.end_date,
                budgeted_hours: record.budgeted_hours.unwrap_or_default(),
                actual_hours: record.actual_hours,
                completion_pct: record.completion_pct.unwrap_or_default(),
            });
        }
    }

    debug!(
        "DAS+ scored {} consultant-project pairs ({} projects unscored)",
        scores.len(),
        unscored
    );
    scores
}

/// Which records a summary covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DasPeriod {
    AllTime,
    CurrentYear,
    DateFiltered,
}

impl fmt::Display for DasPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DasPeriod::AllTime => write!(f, "All Time"),
            DasPeriod::CurrentYear => write!(f, "Current Year"),
            DasPeriod::DateFiltered => write!(f, "Date Filtered"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DasSummaryRow {
    pub consultant: String,
    pub projects: usize,
    pub mean: f64,
    pub median: f64,
    pub low_count: usize,
    pub high_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DasSummary {
    pub period: DasPeriod,
    pub rows: Vec<DasSummaryRow>,
}

/// Per-consultant statistics for consultants with at least `min_projects`
/// scores, highest mean first (ties by name).
pub fn summarize(scores: &[DasScoreRecord], min_projects: usize, period: DasPeriod) -> DasSummary {
    let mut by_consultant: HashMap<&str, Vec<f64>> = HashMap::new();
    for record in scores {
        by_consultant
            .entry(record.consultant.as_str())
            .or_default()
            .push(record.score);
    }

    let mut rows: Vec<DasSummaryRow> = by_consultant
        .into_iter()
        .filter(|(_, values)| values.len() >= min_projects)
        .map(|(consultant, values)| DasSummaryRow {
            consultant: consultant.to_string(),
            projects: values.len(),
            mean: values.iter().mean(),
            low_count: values.iter().filter(|v| **v < LOW_SCORE).count(),
            high_count: values.iter().filter(|v| **v >= HIGH_SCORE).count(),
            median: Data::new(values).median(),
        })
        .collect();

    rows.sort_by(|a, b| a.consultant.cmp(&b.consultant));
    sort_desc_by(&mut rows, |r| r.mean);

    DasSummary { period, rows }
}

/// Records whose end date falls in `year`.
pub fn current_year_slice(scores: &[DasScoreRecord], year: i32) -> Vec<DasScoreRecord> {
    scores
        .iter()
        .filter(|r| r.end_date.is_some_and(|d| d.year() == year))
        .cloned()
        .collect()
}

/// Records the date window retains; everything without a window.
pub fn date_window_slice(scores: &[DasScoreRecord], window: Option<DateWindow>) -> Vec<DasScoreRecord> {
    match window {
        Some(window) => scores
            .iter()
            .filter(|r| window.retains(r.status.trim().eq_ignore_ascii_case("closed"), r.end_date))
            .cloned()
            .collect(),
        None => scores.to_vec(),
    }
}

/// Inclusive DAS+ band for review sampling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReviewBand {
    pub min: f64,
    pub max: f64,
}

impl ReviewBand {
    pub fn contains(&self, score: f64) -> bool {
        (self.min..=self.max).contains(&score)
    }
}

/// Up to `per_consultant` in-band projects for each consultant in `summary`.
///
/// Each consultant draws from a fresh generator seeded with `seed`, so one
/// consultant's sample does not depend on who else is in the summary.
pub fn select_review_projects(
    scores: &[DasScoreRecord],
    summary: &DasSummary,
    band: ReviewBand,
    per_consultant: usize,
    seed: u64,
) -> Vec<DasScoreRecord> {
    let mut selected = Vec::new();

    for row in &summary.rows {
        let candidates: Vec<&DasScoreRecord> = scores
            .iter()
            .filter(|r| r.consultant == row.consultant && band.contains(r.score))
            .collect();
        if candidates.is_empty() {
            continue;
        }

        let mut rng = StdRng::seed_from_u64(seed);
        selected.extend(
            candidates
                .choose_multiple(&mut rng, per_consultant.min(candidates.len()))
                .map(|r| (*r).clone()),
        );
    }

    selected
}

/// Everything the DAS+ engine produces for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DasAnalysis {
    pub reference_year: i32,
    pub cutoff: Option<NaiveDate>,
    pub band: ReviewBand,
    pub scores: Vec<DasScoreRecord>,
    pub all_time: DasSummary,
    pub current_year: DasSummary,
    pub date_filtered: DasSummary,
    pub review_projects: Vec<DasScoreRecord>,
}

/// Run the engine over the merged, unwindowed dataset.
pub fn analyze(
    dataset: &Dataset,
    roster: &Roster,
    config: &DasPlusConfig,
    window: Option<DateWindow>,
    today: NaiveDate,
) -> DasAnalysis {
    let scores = score_projects(dataset, roster);
    let min_projects = config.min_projects_for_review as usize;
    let reference_year = today.year().saturating_add(config.current_year_offset);

    let (year_scores, windowed) = if dataset.fields.end_date {
        (
            current_year_slice(&scores, reference_year),
            date_window_slice(&scores, window),
        )
    } else {
        warn!("No end date field - DAS+ time slices cover all projects");
        (scores.clone(), scores.clone())
    };

    let date_filtered = summarize(&windowed, min_projects, DasPeriod::DateFiltered);
    let band = ReviewBand {
        min: config.review_das_min,
        max: config.review_das_max,
    };
    let review_projects = select_review_projects(
        &windowed,
        &date_filtered,
        band,
        config.sample_projects_per_consultant as usize,
        config.sample_seed,
    );

    let analysis = DasAnalysis {
        reference_year,
        cutoff: window.map(|w| w.cutoff),
        band,
        all_time: summarize(&scores, min_projects, DasPeriod::AllTime),
        current_year: summarize(&year_scores, min_projects, DasPeriod::CurrentYear),
        date_filtered,
        review_projects,
        scores,
    };

    info!(
        "DAS+: {} scores, {} consultants summarized, {} review projects",
        analysis.scores.len(),
        analysis.all_time.rows.len(),
        analysis.review_projects.len()
    );
    analysis
}

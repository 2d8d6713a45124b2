//! Field resolution.
//!
//! Source spreadsheets name their columns inconsistently ("Budget Hrs",
//! "Budgeted Hours", ...). Resolution runs once per table and maps each
//! logical field to a column index using case-insensitive substring rules.
//! A column is assigned to at most one field; fields are resolved in the
//! order listed in [`RULES`] and the first unassigned matching column wins.

use super::parse::{is_missing, parse_date, parse_number, parse_percent};
use crate::error::SchemaError;
use crate::models::{FieldPresence, ProjectRecord};

/// Logical fields of a project record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    JobId,
    JobStatus,
    ProjectStatus,
    Consultants,
    Architects,
    BudgetedHours,
    ActualHours,
    Completion,
    EndDate,
    Customer,
    AccountManager,
    Description,
}

impl Field {
    pub fn label(&self) -> &'static str {
        match self {
            Field::JobId => "job number",
            Field::JobStatus => "job status",
            Field::ProjectStatus => "project status",
            Field::Consultants => "resources engaged",
            Field::Architects => "solution architect",
            Field::BudgetedHours => "budget hours",
            Field::ActualHours => "actual hours",
            Field::Completion => "project complete %",
            Field::EndDate => "end date",
            Field::Customer => "customer",
            Field::AccountManager => "account manager",
            Field::Description => "description",
        }
    }
}

type Matcher = fn(&str) -> bool;

fn has_hours(col: &str) -> bool {
    col.contains("hour") || col.contains("hrs")
}

/// Resolution order and matching rule per field.
const RULES: &[(Field, Matcher)] = &[
    (Field::JobId, |c| c.contains("job") && c.contains("number")),
    (Field::JobStatus, |c| c.contains("job") && c.contains("status")),
    (Field::ProjectStatus, |c| c.contains("project") && c.contains("status")),
    (Field::ProjectStatus, |c| c.contains("status")),
    (Field::Consultants, |c| c.contains("resource") && c.contains("engaged")),
    (Field::Architects, |c| c.contains("solution") && c.contains("architect")),
    (Field::BudgetedHours, |c| c.contains("budget") && has_hours(c)),
    (Field::ActualHours, |c| {
        (c.contains("actual") || c.contains("total") || c.contains("posted")) && has_hours(c)
    }),
    (Field::Completion, |c| c.contains("complete")),
    (Field::EndDate, |c| c.contains("end") && c.contains("date")),
    (Field::Customer, |c| c.contains("customer")),
    (Field::AccountManager, |c| c.contains("account") && c.contains("manager")),
    (Field::Description, |c| c.contains("description")),
];

/// Column index per logical field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMap {
    pub job_id: usize,
    pub budgeted_hours: usize,
    pub actual_hours: Option<usize>,
    pub project_status: Option<usize>,
    pub job_status: Option<usize>,
    pub consultants: Option<usize>,
    pub architects: Option<usize>,
    pub completion: Option<usize>,
    pub end_date: Option<usize>,
    pub customer: Option<usize>,
    pub account_manager: Option<usize>,
    pub description: Option<usize>,
}

impl FieldMap {
    /// Map headers to fields. Job number and budget hours are required.
    pub fn resolve(headers: &[String]) -> Result<Self, SchemaError> {
        let lowered: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
        let mut assigned = vec![false; headers.len()];
        let mut found: Vec<(Field, usize)> = Vec::new();

        for (field, matches) in RULES {
            if found.iter().any(|(f, _)| f == field) {
                continue;
            }
            let hit = lowered
                .iter()
                .enumerate()
                .find(|(i, col)| !assigned[*i] && matches(col));
            if let Some((index, _)) = hit {
                assigned[index] = true;
                found.push((*field, index));
            }
        }

        let lookup = |field: Field| found.iter().find(|(f, _)| *f == field).map(|(_, i)| *i);
        let require = |field: Field| {
            lookup(field).ok_or_else(|| SchemaError::MissingField {
                field: field.label(),
                available: headers.to_vec(),
            })
        };

        Ok(Self {
            job_id: require(Field::JobId)?,
            budgeted_hours: require(Field::BudgetedHours)?,
            actual_hours: lookup(Field::ActualHours),
            project_status: lookup(Field::ProjectStatus),
            job_status: lookup(Field::JobStatus),
            consultants: lookup(Field::Consultants),
            architects: lookup(Field::Architects),
            completion: lookup(Field::Completion),
            end_date: lookup(Field::EndDate),
            customer: lookup(Field::Customer),
            account_manager: lookup(Field::AccountManager),
            description: lookup(Field::Description),
        })
    }

    pub fn presence(&self) -> FieldPresence {
        FieldPresence {
            consultants: self.consultants.is_some(),
            architects: self.architects.is_some(),
            status: self.project_status.is_some(),
            job_status: self.job_status.is_some(),
            end_date: self.end_date.is_some(),
            completion: self.completion.is_some(),
            customer: self.customer.is_some(),
        }
    }

    /// Build a typed record from one row. `index` names rows without a job number.
    pub fn record_from_row(&self, row: &[String], index: usize) -> ProjectRecord {
        let cell = |col: Option<usize>| -> String {
            col.and_then(|i| row.get(i))
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };
        let text = |col: Option<usize>| -> String {
            let value = cell(col);
            if is_missing(&value) {
                String::new()
            } else {
                value
            }
        };

        let job_id = match text(Some(self.job_id)) {
            id if id.is_empty() => format!("Project_{}", index),
            id => id,
        };
        let budget_raw = cell(Some(self.budgeted_hours));

        ProjectRecord {
            job_id,
            budgeted_hours: parse_number(&budget_raw),
            budget_raw,
            actual_hours: parse_number(&cell(self.actual_hours)).unwrap_or(0.0),
            status: text(self.project_status),
            job_status: text(self.job_status),
            completion_pct: parse_percent(&cell(self.completion)),
            end_date: parse_date(&cell(self.end_date)),
            customer: text(self.customer),
            account_manager: text(self.account_manager),
            consultants_raw: text(self.consultants),
            architects_raw: text(self.architects),
            description: text(self.description),
        }
    }
}

use chrono::NaiveDate;
use thiserror::Error;

use crate::calendar::DateRange;
use crate::datetime::parse_date_expr;

/// Input problems surfaced to the user as inline messages.
///
/// These travel inside `anyhow::Error`; callers that need to branch on the
/// kind of failure can `downcast_ref::<ValidationError>()`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("name cannot be empty")]
    EmptyName,

    #[error("Please select both start and end dates")]
    MissingDates,

    #[error("invalid {field} date: {input}")]
    InvalidDate { field: &'static str, input: String },

    #[error("End date must be after start date")]
    EndBeforeStart { start: NaiveDate, end: NaiveDate },

    #[error("invalid color {0}: expected #RRGGBB")]
    InvalidColor(String),

    #[error("no person matches {0}")]
    UnknownPerson(String),

    #[error("{0} matches more than one person")]
    AmbiguousPerson(String),

    #[error("no vacation numbered {0}")]
    UnknownVacation(usize),

    #[error("select a person first")]
    NoPersonSelected,

    #[error("nothing to confirm")]
    NoPendingRemoval,
}

pub fn validate_name(raw: &str) -> Result<String, ValidationError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    Ok(name.to_string())
}

/// Turns the two raw date inputs of a vacation form into a span.
///
/// Both inputs are required. Start and end may be the same day.
#[tracing::instrument(skip(today))]
pub fn validate_span(
    start: Option<&str>,
    end: Option<&str>,
    today: NaiveDate,
) -> Result<DateRange, ValidationError> {
    let (Some(start_raw), Some(end_raw)) = (
        start.filter(|s| !s.trim().is_empty()),
        end.filter(|s| !s.trim().is_empty()),
    ) else {
        return Err(ValidationError::MissingDates);
    };

    let start = parse_date_expr(start_raw, today).map_err(|_| ValidationError::InvalidDate {
        field: "start",
        input: start_raw.to_string(),
    })?;
    let end = parse_date_expr(end_raw, today).map_err(|_| ValidationError::InvalidDate {
        field: "end",
        input: end_raw.to_string(),
    })?;

    DateRange::new(start, end)
}

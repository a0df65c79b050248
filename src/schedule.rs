use chrono::{Duration, NaiveDate};

use crate::error::AppError;

/// Display cap on regular weekly sessions; later weeks are not shown.
pub const MAX_WEEKLY_SESSIONS: usize = 18;

pub fn parse_iso_date(value: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| AppError::InvalidDateRange(format!("`{value}` is not a YYYY-MM-DD date: {e}")))
}

/// Weekly session dates from `start` through `end` inclusive, capped at
/// [`MAX_WEEKLY_SESSIONS`]. Empty when `start` is after `end`.
pub fn session_dates(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut current = start;

    while current <= end && dates.len() < MAX_WEEKLY_SESSIONS {
        dates.push(current);
        match current.checked_add_signed(Duration::days(7)) {
            Some(next) => current = next,
            None => break,
        }
    }

    dates
}

/// Like [`session_dates`] but for raw form input. Unparseable dates and
/// ranges that run backwards are both rejected.
pub fn session_dates_checked(start: &str, end: &str) -> Result<Vec<NaiveDate>, AppError> {
    let start = parse_iso_date(start)?;
    let end = parse_iso_date(end)?;
    if start > end {
        return Err(AppError::InvalidDateRange(format!(
            "start {start} is after end {end}"
        )));
    }
    Ok(session_dates(start, end))
}

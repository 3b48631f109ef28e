//! Schedule status relative to a given day.

use serde::{Deserialize, Serialize};

use crate::condition::DATE_APPROX_DAYS;
use crate::error::ConfigError;
use crate::schedule::Schedule;
use crate::time::{Date, add_days};
use crate::transaction::Transaction;

/// Window, in days, within which an occurrence counts as upcoming.
pub const DEFAULT_UPCOMING_DAYS: u32 = 7;

/// Where a schedule stands on a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Upcoming,
    Due,
    Missed,
    Completed,
}

impl std::fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Upcoming => "upcoming",
            Self::Due => "due",
            Self::Missed => "missed",
            Self::Completed => "completed",
        })
    }
}

/// Status plus the dates it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub status: ScheduleStatus,
    /// First occurrence on or after today.
    pub next_date: Option<Date>,
    /// Past occurrence nothing was linked for, when the status is missed.
    pub missed_occurrence: Option<Date>,
}

impl Classification {
    fn completed() -> Self {
        Self {
            status: ScheduleStatus::Completed,
            next_date: None,
            missed_occurrence: None,
        }
    }
}

/// Classify `schedule` on `today` given the transactions linked to it.
///
/// - completed schedules stay completed
/// - an occurrence today is due
/// - the latest occurrence before today is missed unless a linked
///   transaction covers it, or the stored next date has already moved past it
/// - otherwise the schedule is upcoming while it has future occurrences
///
/// # Errors
///
/// Returns a [`ConfigError`] if the date condition holds a malformed rule.
pub fn evaluate(
    schedule: &Schedule,
    today: Date,
    linked: &[Transaction],
) -> Result<Classification, ConfigError> {
    if schedule.completed {
        return Ok(Classification::completed());
    }
    let Some(spec) = schedule.date() else {
        return Ok(Classification::completed());
    };
    let next_date = spec.next_date(today)?;
    if next_date == Some(today) {
        return Ok(Classification {
            status: ScheduleStatus::Due,
            next_date,
            missed_occurrence: None,
        });
    }
    let missed_occurrence = spec
        .previous_occurrence(today)?
        .filter(|previous| schedule.next_date.is_none_or(|stored| stored <= *previous))
        .filter(|previous| !is_covered(*previous, linked));
    let status = match (missed_occurrence, next_date) {
        (Some(_), _) => ScheduleStatus::Missed,
        (None, Some(_)) => ScheduleStatus::Upcoming,
        (None, None) => ScheduleStatus::Completed,
    };
    Ok(Classification {
        status,
        next_date,
        missed_occurrence,
    })
}

/// Status only; see [`evaluate`].
///
/// # Errors
///
/// Returns a [`ConfigError`] if the date condition holds a malformed rule.
pub fn classify(
    schedule: &Schedule,
    today: Date,
    linked: &[Transaction],
) -> Result<ScheduleStatus, ConfigError> {
    evaluate(schedule, today, linked).map(|classification| classification.status)
}

/// Whether a linked transaction accounts for `occurrence`: one dated no more
/// than two days before it, or any time after.
#[must_use]
pub fn is_covered(occurrence: Date, linked: &[Transaction]) -> bool {
    let earliest = add_days(occurrence, -DATE_APPROX_DAYS);
    linked.iter().any(|tx| tx.date >= earliest)
}

/// Whether `next_date` falls within `days` days from `today`.
#[must_use]
pub fn is_upcoming_within(next_date: Date, today: Date, days: u32) -> bool {
    next_date >= today && next_date <= add_days(today, i64::from(days))
}

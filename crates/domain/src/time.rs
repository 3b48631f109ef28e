//! Time and calendar-date helpers.

use chrono::{DateTime, Days, Local, NaiveDate, Utc};

/// UTC timestamp used for bookkeeping fields.
pub type Timestamp = DateTime<Utc>;

/// Calendar date with no time zone, the unit every schedule works in.
pub type Date = NaiveDate;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Return today's date in the local time zone.
///
/// Only the composition root should call this; everything below it takes
/// `today` as an explicit argument.
#[must_use]
pub fn today() -> Date {
    Local::now().date_naive()
}

/// Shift a date by a signed number of days, saturating at the calendar bounds.
#[must_use]
pub fn add_days(date: Date, days: i64) -> Date {
    let magnitude = Days::new(days.unsigned_abs());
    let shifted = if days >= 0 {
        date.checked_add_days(magnitude)
    } else {
        date.checked_sub_days(magnitude)
    };
    shifted.unwrap_or(if days >= 0 { Date::MAX } else { Date::MIN })
}

/// Format a date the way it is stored and exchanged (`YYYY-MM-DD`).
#[must_use]
pub fn format_date(date: Date) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parse a date written by [`format_date`].
///
/// # Errors
///
/// Returns a [`chrono::ParseError`] if `value` is not a valid `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> Result<Date, chrono::ParseError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
}

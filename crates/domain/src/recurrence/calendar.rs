//! Calendar arithmetic on plain dates: month lengths, clamping, weekdays.

use chrono::{Datelike, NaiveDate, Weekday};

use super::WeekendSolveMode;

/// Number of days in `month` (1-based) of `year`.
pub(crate) fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first_next| first_next.pred_opt())
        .map_or(28, |last| last.day())
}

/// Build a date, clamping `day` to the last day of the month.
pub(crate) fn clamped_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let day = day.clamp(1, days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Zero-based month counter since year 0, convenient for interval stepping.
pub(crate) fn month_index(date: NaiveDate) -> i64 {
    i64::from(date.year()) * 12 + i64::from(date.month0())
}

/// Inverse of [`month_index`]: `(year, month)` with a 1-based month.
pub(crate) fn year_month(index: i64) -> Option<(i32, u32)> {
    let year = i32::try_from(index.div_euclid(12)).ok()?;
    let month = u32::try_from(index.rem_euclid(12)).ok()? + 1;
    Some((year, month))
}

/// The `n`-th `weekday` of a month (`n` in `1..=5`), or the last one when
/// `n == -1`. `None` when the month has no such day (e.g. a fifth Monday).
pub(crate) fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: i32) -> Option<NaiveDate> {
    if n == -1 {
        let last = NaiveDate::from_ymd_opt(year, month, days_in_month(year, month))?;
        let back = (7 + last.weekday().num_days_from_monday() - weekday.num_days_from_monday()) % 7;
        return NaiveDate::from_ymd_opt(year, month, last.day() - back);
    }
    let n = u8::try_from(n).ok()?;
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
}

#[must_use]
pub(crate) fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Move a weekend date to the closest weekday in the given direction.
/// Weekdays are returned unchanged.
pub(crate) fn shift_off_weekend(date: NaiveDate, mode: WeekendSolveMode) -> NaiveDate {
    let step = match (date.weekday(), mode) {
        (Weekday::Sat, WeekendSolveMode::Before) => -1,
        (Weekday::Sun, WeekendSolveMode::Before) => -2,
        (Weekday::Sat, WeekendSolveMode::After) => 2,
        (Weekday::Sun, WeekendSolveMode::After) => 1,
        _ => 0,
    };
    crate::time::add_days(date, step)
}

//! Recurrence rules and their occurrence dates.
//!
//! A [`RecurConfig`] describes when a schedule expects a transaction: a
//! frequency, an anchor `start` date, an interval, optional day-of-month
//! patterns, a weekend policy and an end condition. [`DateSpec`] is what a
//! schedule's date condition actually holds: either one such rule or a single
//! non-repeating date.

mod calculator;
pub(crate) mod calendar;

pub use calculator::{MAX_PERIODS, Occurrences, next_dates};

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::time::Date;

/// Unit the `interval` of a [`RecurConfig`] counts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        })
    }
}

/// Direction an occurrence landing on a weekend is moved to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekendSolveMode {
    /// Previous Friday.
    Before,
    /// Next Monday.
    #[default]
    After,
}

/// How a recurrence terminates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndMode {
    #[default]
    Never,
    AfterNOccurrences,
    OnDate,
}

/// Which days of a month a [`RecurPattern`] selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatternKind {
    /// A day of the month; `value` is `1..=31` or `-1` for the last day.
    #[serde(rename = "day")]
    Day,
    #[serde(rename = "SU")]
    Sunday,
    #[serde(rename = "MO")]
    Monday,
    #[serde(rename = "TU")]
    Tuesday,
    #[serde(rename = "WE")]
    Wednesday,
    #[serde(rename = "TH")]
    Thursday,
    #[serde(rename = "FR")]
    Friday,
    #[serde(rename = "SA")]
    Saturday,
}

impl PatternKind {
    fn weekday(self) -> Option<Weekday> {
        match self {
            Self::Day => None,
            Self::Sunday => Some(Weekday::Sun),
            Self::Monday => Some(Weekday::Mon),
            Self::Tuesday => Some(Weekday::Tue),
            Self::Wednesday => Some(Weekday::Wed),
            Self::Thursday => Some(Weekday::Thu),
            Self::Friday => Some(Weekday::Fri),
            Self::Saturday => Some(Weekday::Sat),
        }
    }
}

/// A sub-rule of a monthly recurrence, e.g. "every 2nd Friday" or "the 15th".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecurPattern {
    #[serde(rename = "type")]
    pub kind: PatternKind,
    pub value: i32,
}

impl RecurPattern {
    #[must_use]
    pub fn day(value: i32) -> Self {
        Self {
            kind: PatternKind::Day,
            value,
        }
    }

    #[must_use]
    pub fn weekday(kind: PatternKind, value: i32) -> Self {
        Self { kind, value }
    }

    fn validate(self) -> Result<(), ConfigError> {
        let valid = match self.kind {
            PatternKind::Day => self.value == -1 || (1..=31).contains(&self.value),
            _ => self.value == -1 || (1..=5).contains(&self.value),
        };
        if valid {
            Ok(())
        } else {
            Err(ConfigError::InvalidPattern {
                kind: format!("{:?}", self.kind),
                value: self.value,
            })
        }
    }

    /// The date this pattern selects in the given month, if any.
    ///
    /// Day values past the end of the month clamp to its last day.
    fn resolve(self, year: i32, month: u32) -> Option<Date> {
        match self.kind.weekday() {
            None if self.value == -1 => {
                calendar::clamped_date(year, month, calendar::days_in_month(year, month))
            }
            None => calendar::clamped_date(year, month, self.value.unsigned_abs()),
            Some(weekday) => calendar::nth_weekday(year, month, weekday, self.value),
        }
    }
}

/// A recurrence rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurConfig {
    pub frequency: Frequency,
    pub start: Date,
    #[serde(default = "default_interval")]
    pub interval: u32,
    #[serde(default)]
    pub patterns: Vec<RecurPattern>,
    #[serde(default)]
    pub skip_weekend: bool,
    #[serde(default)]
    pub weekend_solve_mode: WeekendSolveMode,
    #[serde(default)]
    pub end_mode: EndMode,
    #[serde(default = "default_end_occurrences")]
    pub end_occurrences: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<Date>,
}

fn default_interval() -> u32 {
    1
}

fn default_end_occurrences() -> u32 {
    1
}

impl RecurConfig {
    /// A never-ending rule repeating every `frequency` unit from `start`.
    #[must_use]
    pub fn new(frequency: Frequency, start: Date) -> Self {
        Self {
            frequency,
            start,
            interval: 1,
            patterns: Vec::new(),
            skip_weekend: false,
            weekend_solve_mode: WeekendSolveMode::After,
            end_mode: EndMode::Never,
            end_occurrences: 1,
            end_date: None,
        }
    }

    /// Monthly rule on `start`'s day of month.
    #[must_use]
    pub fn monthly(start: Date) -> Self {
        Self::new(Frequency::Monthly, start)
    }

    #[must_use]
    pub fn every(mut self, interval: u32) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub fn pattern(mut self, pattern: RecurPattern) -> Self {
        self.patterns.push(pattern);
        self
    }

    #[must_use]
    pub fn skip_weekend(mut self, mode: WeekendSolveMode) -> Self {
        self.skip_weekend = true;
        self.weekend_solve_mode = mode;
        self
    }

    #[must_use]
    pub fn ends_after(mut self, occurrences: u32) -> Self {
        self.end_mode = EndMode::AfterNOccurrences;
        self.end_occurrences = occurrences;
        self
    }

    #[must_use]
    pub fn ends_on(mut self, date: Date) -> Self {
        self.end_mode = EndMode::OnDate;
        self.end_date = Some(date);
        self
    }

    /// Check the rule is well-formed.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when:
    /// - `interval` is zero
    /// - patterns are set on a non-monthly rule, or a pattern value is out of range
    /// - an `on_date` rule has no end date or ends before it starts
    /// - an `after_n_occurrences` rule allows zero occurrences
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if !self.patterns.is_empty() && self.frequency != Frequency::Monthly {
            return Err(ConfigError::PatternsRequireMonthly);
        }
        for pattern in &self.patterns {
            pattern.validate()?;
        }
        match self.end_mode {
            EndMode::Never => {}
            EndMode::AfterNOccurrences => {
                if self.end_occurrences == 0 {
                    return Err(ConfigError::ZeroOccurrences);
                }
            }
            EndMode::OnDate => {
                let end = self.end_date.ok_or(ConfigError::MissingEndDate)?;
                if end < self.start {
                    return Err(ConfigError::EndBeforeStart {
                        start: self.start,
                        end,
                    });
                }
            }
        }
        Ok(())
    }

    /// Every valid occurrence, from `start` onwards.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the rule is malformed.
    pub fn occurrences(&self) -> Result<Occurrences<'_>, ConfigError> {
        self.validate()?;
        Ok(Occurrences::new(self, 0))
    }

    /// The first `count` occurrences on or after `after`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the rule is malformed.
    pub fn next_dates(&self, after: Date, count: usize) -> Result<Vec<Date>, ConfigError> {
        next_dates(self, after, count)
    }

    /// The latest occurrence strictly before `before`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the rule is malformed.
    pub fn previous_occurrence(&self, before: Date) -> Result<Option<Date>, ConfigError> {
        self.validate()?;
        let skipped = Occurrences::periods_before(self, before, PREVIOUS_LOOKBACK_PERIODS);
        let found = Occurrences::new(self, skipped)
            .take_while(|date| *date < before)
            .last();
        if found.is_some() || skipped == 0 {
            return Ok(found);
        }
        Ok(Occurrences::new(self, 0)
            .take_while(|date| *date < before)
            .last())
    }

    /// Whether any occurrence falls within `low..=high`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the rule is malformed.
    pub fn occurs_between(&self, low: Date, high: Date) -> Result<bool, ConfigError> {
        Ok(self
            .next_dates(low, 1)?
            .first()
            .is_some_and(|date| *date <= high))
    }

    /// Day-of-month the rule anchors on when it has no patterns.
    #[must_use]
    pub fn anchor_day(&self) -> u32 {
        self.start.day()
    }
}

/// Periods scanned backwards when looking for the previous occurrence before
/// falling back to a scan from `start`.
const PREVIOUS_LOOKBACK_PERIODS: u32 = 24;

/// Value of a schedule's date condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DateSpec {
    /// A single, non-repeating date.
    Date(Date),
    /// A recurring rule.
    Recurring(RecurConfig),
}

impl DateSpec {
    #[must_use]
    pub fn is_recurring(&self) -> bool {
        matches!(self, Self::Recurring(_))
    }

    /// First date of the spec: the single date, or the rule's `start`.
    #[must_use]
    pub fn start(&self) -> Date {
        match self {
            Self::Date(date) => *date,
            Self::Recurring(config) => config.start,
        }
    }

    /// Validate the embedded rule, if any.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the rule is malformed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Date(_) => Ok(()),
            Self::Recurring(config) => config.validate(),
        }
    }

    /// Up to `count` dates on or after `after`.
    ///
    /// A single date yields itself when it is not before `after`, and nothing
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the rule is malformed.
    pub fn next_dates(&self, after: Date, count: usize) -> Result<Vec<Date>, ConfigError> {
        match self {
            Self::Date(date) if *date >= after && count > 0 => Ok(vec![*date]),
            Self::Date(_) => Ok(Vec::new()),
            Self::Recurring(config) => config.next_dates(after, count),
        }
    }

    /// The first date on or after `after`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the rule is malformed.
    pub fn next_date(&self, after: Date) -> Result<Option<Date>, ConfigError> {
        Ok(self.next_dates(after, 1)?.into_iter().next())
    }

    /// The latest date strictly before `before`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the rule is malformed.
    pub fn previous_occurrence(&self, before: Date) -> Result<Option<Date>, ConfigError> {
        match self {
            Self::Date(date) => Ok((*date < before).then_some(*date)),
            Self::Recurring(config) => config.previous_occurrence(before),
        }
    }

    /// Whether the spec yields a date within `low..=high`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the rule is malformed.
    pub fn occurs_between(&self, low: Date, high: Date) -> Result<bool, ConfigError> {
        match self {
            Self::Date(date) => Ok(low <= *date && *date <= high),
            Self::Recurring(config) => config.occurs_between(low, high),
        }
    }
}

impl From<NaiveDate> for DateSpec {
    fn from(date: NaiveDate) -> Self {
        Self::Date(date)
    }
}

impl From<RecurConfig> for DateSpec {
    fn from(config: RecurConfig) -> Self {
        Self::Recurring(config)
    }
}

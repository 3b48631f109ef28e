//! Occurrence generation for [`RecurConfig`].
//!
//! Occurrences are produced period by period: each period (one day, week,
//! month or year times `interval`) contributes its raw candidate dates, which
//! are then checked against the end condition, moved off weekends if asked,
//! and deduplicated so the output is strictly increasing.

use std::collections::VecDeque;

use chrono::{Datelike, Days, NaiveDate};

use super::{Frequency, RecurConfig, WeekendSolveMode, calendar};
use crate::error::ConfigError;
use crate::time::{Date, add_days};

/// Upper bound on the number of periods a single iteration walks through.
pub const MAX_PERIODS: u32 = 100_000;

/// Iterator over the occurrence dates of a [`RecurConfig`].
///
/// Built through [`RecurConfig::occurrences`]; the config is validated first.
#[derive(Debug)]
pub struct Occurrences<'a> {
    config: &'a RecurConfig,
    period: u32,
    first_visible_period: u32,
    pending: VecDeque<Date>,
    pending_period: u32,
    raw_count: u32,
    previous_raw: Option<Date>,
    last_emitted: Option<Date>,
    finished: bool,
}

impl<'a> Occurrences<'a> {
    /// Start iterating at period `skip`.
    ///
    /// When skipping, the period right before `skip` is still walked silently
    /// so that weekend shifts across the boundary deduplicate correctly.
    pub(super) fn new(config: &'a RecurConfig, skip: u32) -> Self {
        let period = skip.saturating_sub(1);
        Self {
            config,
            period,
            first_visible_period: skip,
            pending: VecDeque::new(),
            pending_period: period,
            raw_count: 0,
            previous_raw: None,
            last_emitted: None,
            finished: false,
        }
    }

    /// How many whole periods can be skipped while still starting at least
    /// `lookback` periods before `date`.
    ///
    /// Always zero for rules limited to a number of occurrences, since those
    /// must be counted from the start.
    pub(super) fn periods_before(config: &RecurConfig, date: Date, lookback: u32) -> u32 {
        if config.end_mode == super::EndMode::AfterNOccurrences || date <= config.start {
            return 0;
        }
        let interval = i64::from(config.interval);
        let elapsed = match config.frequency {
            Frequency::Daily => (date - config.start).num_days() / interval,
            Frequency::Weekly => (date - config.start).num_days() / (7 * interval),
            Frequency::Monthly => {
                (calendar::month_index(date) - calendar::month_index(config.start)) / interval
            }
            Frequency::Yearly => i64::from(date.year() - config.start.year()) / interval,
        };
        let skip = elapsed.saturating_sub(i64::from(lookback)).max(0);
        u32::try_from(skip).unwrap_or(u32::MAX)
    }

    fn raw_candidates(&self, period: u32) -> Option<Vec<Date>> {
        let config = self.config;
        let step = i64::from(period) * i64::from(config.interval);
        match config.frequency {
            Frequency::Daily => add_whole_days(config.start, step).map(|date| vec![date]),
            Frequency::Weekly => add_whole_days(config.start, step * 7).map(|date| vec![date]),
            Frequency::Monthly => {
                let (year, month) =
                    calendar::year_month(calendar::month_index(config.start) + step)?;
                if config.patterns.is_empty() {
                    return calendar::clamped_date(year, month, config.start.day())
                        .map(|date| vec![date]);
                }
                let mut dates: Vec<Date> = config
                    .patterns
                    .iter()
                    .filter_map(|pattern| pattern.resolve(year, month))
                    .filter(|date| *date >= config.start)
                    .collect();
                dates.sort_unstable();
                dates.dedup();
                Some(dates)
            }
            Frequency::Yearly => {
                let year = i32::try_from(i64::from(config.start.year()) + step).ok()?;
                calendar::clamped_date(year, config.start.month(), config.start.day())
                    .map(|date| vec![date])
            }
        }
    }

    fn fill_next_period(&mut self) {
        if self.period - self.first_visible_period.saturating_sub(1) >= MAX_PERIODS {
            self.finished = true;
            return;
        }
        match self.raw_candidates(self.period) {
            Some(dates) => {
                self.pending.extend(dates);
                self.pending_period = self.period;
                self.period += 1;
            }
            None => self.finished = true,
        }
    }

    fn past_end(&self, raw: Date) -> bool {
        match self.config.end_mode {
            super::EndMode::Never => false,
            super::EndMode::AfterNOccurrences => self.raw_count >= self.config.end_occurrences,
            super::EndMode::OnDate => self.config.end_date.is_some_and(|end| raw > end),
        }
    }

    /// First date the period holding `raw` covers. Daily and weekly periods
    /// begin the day after the previous raw candidate.
    fn period_start(&self, raw: Date) -> Date {
        let start = match self.config.frequency {
            Frequency::Monthly => raw.with_day(1),
            Frequency::Yearly => NaiveDate::from_ymd_opt(raw.year(), 1, 1),
            Frequency::Daily | Frequency::Weekly => self.previous_raw.map(|prev| add_days(prev, 1)),
        };
        start.unwrap_or(self.config.start)
    }

    /// Move `raw` off the weekend. A backward shift that would leave the
    /// period, precede `start` or reach the last emitted date goes forward
    /// instead.
    fn solve_weekend(&self, raw: Date) -> Date {
        if !self.config.skip_weekend || !calendar::is_weekend(raw) {
            return raw;
        }
        let after_last = self.last_emitted.map(|last| add_days(last, 1));
        let floor = self
            .period_start(raw)
            .max(self.config.start)
            .max(after_last.unwrap_or(self.config.start));
        let shifted = calendar::shift_off_weekend(raw, self.config.weekend_solve_mode);
        if shifted < floor {
            calendar::shift_off_weekend(raw, WeekendSolveMode::After)
        } else {
            shifted
        }
    }
}

impl Iterator for Occurrences<'_> {
    type Item = Date;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.finished {
                return None;
            }
            let Some(raw) = self.pending.pop_front() else {
                self.fill_next_period();
                continue;
            };
            if self.past_end(raw) {
                self.finished = true;
                return None;
            }
            self.raw_count += 1;
            let date = self.solve_weekend(raw);
            self.previous_raw = Some(raw);
            if self.last_emitted.is_some_and(|last| date <= last) {
                continue;
            }
            self.last_emitted = Some(date);
            if self.pending_period >= self.first_visible_period {
                return Some(date);
            }
        }
    }
}

fn add_whole_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    date.checked_add_days(Days::new(u64::try_from(days).ok()?))
}

/// The first `count` occurrences of `config` on or after `after`.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the rule is malformed.
pub fn next_dates(
    config: &RecurConfig,
    after: Date,
    count: usize,
) -> Result<Vec<Date>, ConfigError> {
    config.validate()?;
    if count == 0 {
        return Ok(Vec::new());
    }
    let skip = Occurrences::periods_before(config, after, 2);
    Ok(Occurrences::new(config, skip)
        .skip_while(|date| *date < after)
        .take(count)
        .collect())
}

//! Upcoming-dates port: the canonical occurrence calculator.

use std::future::Future;

use tally_domain::error::TallyError;
use tally_domain::recurrence::DateSpec;
use tally_domain::time::Date;

/// Computes the next occurrences of a date spec.
pub trait UpcomingDates {
    /// Up to `count` occurrences of `spec` on or after `today`.
    fn upcoming_dates(
        &self,
        spec: &DateSpec,
        today: Date,
        count: usize,
    ) -> impl Future<Output = Result<Vec<Date>, TallyError>> + Send;
}

/// [`UpcomingDates`] computed in-process with the domain calculator.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalUpcomingDates;

impl UpcomingDates for LocalUpcomingDates {
    fn upcoming_dates(
        &self,
        spec: &DateSpec,
        today: Date,
        count: usize,
    ) -> impl Future<Output = Result<Vec<Date>, TallyError>> + Send {
        let result = spec.next_dates(today, count).map_err(TallyError::from);
        async { result }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_domain::error::ConfigError;
    use tally_domain::recurrence::RecurConfig;

    fn date(y: i32, m: u32, d: u32) -> Date {
        chrono::NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn should_compute_dates_with_domain_calculator() {
        let spec = DateSpec::Recurring(RecurConfig::monthly(date(2024, 1, 31)));
        let dates = LocalUpcomingDates
            .upcoming_dates(&spec, date(2024, 1, 1), 3)
            .await
            .unwrap();
        assert_eq!(
            dates,
            vec![date(2024, 1, 31), date(2024, 2, 29), date(2024, 3, 31)]
        );
    }

    #[tokio::test]
    async fn should_surface_config_errors() {
        let spec = DateSpec::Recurring(RecurConfig::monthly(date(2024, 1, 31)).every(0));
        let result = LocalUpcomingDates.upcoming_dates(&spec, date(2024, 1, 1), 3).await;
        assert!(matches!(
            result,
            Err(TallyError::Config(ConfigError::ZeroInterval))
        ));
    }
}

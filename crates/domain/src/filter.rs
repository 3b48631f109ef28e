//! Transaction filter built from schedule conditions.

use serde::{Deserialize, Serialize};

use crate::condition::{Condition, DATE_APPROX_DAYS, DateMatch};
use crate::recurrence::{DateSpec, EndMode};
use crate::time::{Date, add_days};
use crate::transaction::Transaction;

/// Conjunction of conditions evaluated against transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFilter {
    conditions: Vec<Condition>,
}

/// Inclusive date bounds a matching transaction must fall within.
/// `None` leaves that side open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateWindow {
    pub from: Option<Date>,
    pub to: Option<Date>,
}

impl DateWindow {
    fn narrow(self, other: Self) -> Self {
        Self {
            from: max_option(self.from, other.from),
            to: min_option(self.to, other.to),
        }
    }

    #[must_use]
    pub fn contains(&self, date: Date) -> bool {
        self.from.is_none_or(|from| from <= date) && self.to.is_none_or(|to| date <= to)
    }
}

fn max_option(a: Option<Date>, b: Option<Date>) -> Option<Date> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

fn min_option(a: Option<Date>, b: Option<Date>) -> Option<Date> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

impl TransactionFilter {
    #[must_use]
    pub fn from_conditions(conditions: &[Condition]) -> Self {
        Self {
            conditions: conditions.to_vec(),
        }
    }

    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Whether every condition holds for `tx`. An empty filter matches all.
    #[must_use]
    pub fn matches(&self, tx: &Transaction) -> bool {
        self.conditions.iter().all(|condition| match condition {
            Condition::Payee(m) => m.contains(tx.payee.as_ref()),
            Condition::Account(m) => m.contains(Some(&tx.account)),
            Condition::Amount(m) => m.contains(tx.amount),
            Condition::Date(m) => m.contains(tx.date),
        })
    }

    /// Conservative date range implied by the date conditions.
    ///
    /// Every matching transaction lies inside it, so storage can use it to
    /// narrow a query before [`matches`](Self::matches) runs.
    #[must_use]
    pub fn date_window(&self) -> DateWindow {
        self.conditions
            .iter()
            .filter_map(|condition| match condition {
                Condition::Date(m) => Some(date_match_window(m)),
                _ => None,
            })
            .fold(DateWindow::default(), DateWindow::narrow)
    }
}

fn date_match_window(m: &DateMatch) -> DateWindow {
    match m {
        DateMatch::Is(spec) => spec_window(spec, 0),
        DateMatch::IsApprox(spec) => spec_window(spec, DATE_APPROX_DAYS),
        DateMatch::OneOf(dates) => DateWindow {
            from: dates.iter().min().copied(),
            to: dates.iter().max().copied(),
        },
    }
}

fn spec_window(spec: &DateSpec, slack: i64) -> DateWindow {
    match spec {
        DateSpec::Date(date) => DateWindow {
            from: Some(add_days(*date, -slack)),
            to: Some(add_days(*date, slack)),
        },
        DateSpec::Recurring(config) => DateWindow {
            from: Some(add_days(config.start, -slack)),
            to: match config.end_mode {
                // weekend shifts can move an occurrence up to two days past the end
                EndMode::OnDate => config.end_date.map(|end| add_days(end, slack + 2)),
                EndMode::Never | EndMode::AfterNOccurrences => None,
            },
        },
    }
}

/// Whether `tx` satisfies every condition.
#[must_use]
pub fn matches(tx: &Transaction, conditions: &[Condition]) -> bool {
    TransactionFilter::from_conditions(conditions).matches(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{AmountMatch, AmountRange, IdMatch};
    use crate::id::{AccountId, PayeeId};
    use crate::recurrence::RecurConfig;

    fn date(y: i32, m: u32, d: u32) -> Date {
        chrono::NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tx(payee: PayeeId, account: AccountId, amount: i64, on: Date) -> Transaction {
        Transaction::builder()
            .date(on)
            .account(account)
            .payee(payee)
            .amount(amount)
            .build()
            .unwrap()
    }

    #[test]
    fn should_require_every_condition_to_hold() {
        let payee = PayeeId::new();
        let account = AccountId::new();
        let conditions = vec![
            Condition::Payee(IdMatch::Is(payee)),
            Condition::Account(IdMatch::Is(account)),
            Condition::Amount(AmountMatch::IsApprox(-1000)),
            Condition::Date(DateMatch::IsApprox(RecurConfig::monthly(date(2024, 1, 1)).into())),
        ];
        assert!(matches(&tx(payee, account, -1050, date(2024, 3, 2)), &conditions));
        assert!(!matches(&tx(PayeeId::new(), account, -1050, date(2024, 3, 2)), &conditions));
        assert!(!matches(&tx(payee, account, -1300, date(2024, 3, 2)), &conditions));
        assert!(!matches(&tx(payee, account, -1050, date(2024, 3, 10)), &conditions));
    }

    #[test]
    fn should_match_everything_with_no_conditions() {
        let filter = TransactionFilter::default();
        assert!(filter.matches(&tx(PayeeId::new(), AccountId::new(), 5, date(2024, 1, 1))));
    }

    #[test]
    fn should_match_identical_sets_for_swapped_isbetween_bounds() {
        let account = AccountId::new();
        let payee = PayeeId::new();
        let a = [Condition::Amount(AmountMatch::IsBetween(AmountRange::new(100, 50)))];
        let b = [Condition::Amount(AmountMatch::IsBetween(AmountRange::new(50, 100)))];
        for amount in [0, 49, 50, 99, 100, 101] {
            let t = tx(payee, account, amount, date(2024, 1, 1));
            assert_eq!(matches(&t, &a), matches(&t, &b));
        }
    }

    #[test]
    fn should_bound_window_around_single_approx_date() {
        let filter = TransactionFilter::from_conditions(&[Condition::Date(DateMatch::IsApprox(
            DateSpec::Date(date(2024, 3, 10)),
        ))]);
        let window = filter.date_window();
        assert_eq!(window.from, Some(date(2024, 3, 8)));
        assert_eq!(window.to, Some(date(2024, 3, 12)));
        assert!(window.contains(date(2024, 3, 12)));
        assert!(!window.contains(date(2024, 3, 13)));
    }

    #[test]
    fn should_leave_window_open_for_never_ending_rule() {
        let filter = TransactionFilter::from_conditions(&[Condition::Date(DateMatch::Is(
            RecurConfig::monthly(date(2024, 1, 15)).into(),
        ))]);
        let window = filter.date_window();
        assert_eq!(window.from, Some(date(2024, 1, 15)));
        assert_eq!(window.to, None);
    }

    #[test]
    fn should_leave_window_unbounded_without_date_conditions() {
        let filter = TransactionFilter::from_conditions(&[Condition::Amount(AmountMatch::Is(5))]);
        assert_eq!(filter.date_window(), DateWindow::default());
    }
}

//! Schedule: a recurring expectation bound to transaction conditions.
//!
//! A schedule holds the conditions a transaction must meet to belong to it.
//! Its primary fields (payee, account, amount, date) are read straight from
//! those conditions: the first condition for each field is the primary one.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::condition::{AmountMatch, Condition, DateMatch, Field, IdMatch, Operator};
use crate::error::{ConfigError, TallyError, ValidationError};
use crate::id::{AccountId, PayeeId, RuleId, ScheduleId};
use crate::recurrence::{DateSpec, RecurConfig};
use crate::time::Date;
use crate::transaction::Transaction;

/// What a schedule does to the transactions it matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawAction", into = "RawAction")]
pub enum ScheduleAction {
    /// Link matched transactions to the schedule.
    LinkSchedule,
    /// Any other rule action, carried through untouched.
    Other { op: String, value: Value },
}

const LINK_SCHEDULE_OP: &str = "link-schedule";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawAction {
    op: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    value: Value,
}

impl From<RawAction> for ScheduleAction {
    fn from(raw: RawAction) -> Self {
        if raw.op == LINK_SCHEDULE_OP {
            Self::LinkSchedule
        } else {
            Self::Other {
                op: raw.op,
                value: raw.value,
            }
        }
    }
}

impl From<ScheduleAction> for RawAction {
    fn from(action: ScheduleAction) -> Self {
        match action {
            ScheduleAction::LinkSchedule => Self {
                op: LINK_SCHEDULE_OP.to_string(),
                value: Value::Null,
            },
            ScheduleAction::Other { op, value } => Self { op, value },
        }
    }
}

/// A recurring expectation of transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: ScheduleId,
    pub name: Option<String>,
    /// General rule backing this schedule.
    pub rule: Option<RuleId>,
    pub conditions: Vec<Condition>,
    pub actions: Vec<ScheduleAction>,
    /// Post a transaction automatically when an occurrence comes due.
    pub posts_transaction: bool,
    /// Terminal; completed schedules are never due or upcoming again.
    pub completed: bool,
    /// Next expected occurrence, moved forward as occurrences are paid.
    pub next_date: Option<Date>,
}

impl Schedule {
    /// Create a builder for constructing a [`Schedule`].
    #[must_use]
    pub fn builder() -> ScheduleBuilder {
        ScheduleBuilder::default()
    }

    /// Pre-fill a schedule from an existing transaction.
    ///
    /// The schedule expects the same payee, account and amount every month,
    /// starting on the transaction's date, and is named after the payee.
    #[must_use]
    pub fn from_transaction(tx: &Transaction, payee_name: Option<String>) -> Self {
        let mut conditions = Vec::with_capacity(4);
        if let Some(payee) = tx.payee {
            conditions.push(Condition::Payee(IdMatch::Is(payee)));
        }
        conditions.push(Condition::Account(IdMatch::Is(tx.account)));
        conditions.push(Condition::Amount(AmountMatch::Is(tx.amount)));
        conditions.push(Condition::Date(DateMatch::IsApprox(DateSpec::Recurring(
            RecurConfig::monthly(tx.date),
        ))));
        Self {
            id: ScheduleId::new(),
            name: payee_name,
            rule: None,
            conditions,
            actions: vec![ScheduleAction::LinkSchedule],
            posts_transaction: false,
            completed: false,
            next_date: Some(tx.date),
        }
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`TallyError::Validation`] when:
    /// - the name is set but blank ([`ValidationError::InvalidValue`])
    /// - there is no `is`/`isapprox` date condition ([`ValidationError::DateRequired`])
    ///
    /// Returns [`TallyError::Config`] when the date condition holds a malformed rule.
    pub fn validate(&self) -> Result<(), TallyError> {
        if self.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(ValidationError::InvalidValue {
                field: "name".to_string(),
                reason: "name cannot be blank".to_string(),
            }
            .into());
        }
        let spec = self.date().ok_or(ValidationError::DateRequired)?;
        spec.validate()?;
        Ok(())
    }

    fn first(&self, field: Field) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.field() == field)
    }

    #[must_use]
    pub fn payee(&self) -> Option<&IdMatch<PayeeId>> {
        match self.first(Field::Payee) {
            Some(Condition::Payee(m)) => Some(m),
            _ => None,
        }
    }

    #[must_use]
    pub fn account(&self) -> Option<&IdMatch<AccountId>> {
        match self.first(Field::Account) {
            Some(Condition::Account(m)) => Some(m),
            _ => None,
        }
    }

    #[must_use]
    pub fn amount(&self) -> Option<&AmountMatch> {
        match self.first(Field::Amount) {
            Some(Condition::Amount(m)) => Some(m),
            _ => None,
        }
    }

    #[must_use]
    pub fn amount_op(&self) -> Option<Operator> {
        self.amount().map(AmountMatch::op)
    }

    #[must_use]
    pub fn date_match(&self) -> Option<&DateMatch> {
        match self.first(Field::Date) {
            Some(Condition::Date(m)) => Some(m),
            _ => None,
        }
    }

    /// Date spec of the primary date condition.
    #[must_use]
    pub fn date(&self) -> Option<&DateSpec> {
        self.date_match().and_then(DateMatch::spec)
    }

    /// Single account the schedule posts into, if its account condition names one.
    #[must_use]
    pub fn posting_account(&self) -> Option<AccountId> {
        match self.account() {
            Some(IdMatch::Is(account)) => Some(*account),
            _ => None,
        }
    }

    #[must_use]
    pub fn posting_payee(&self) -> Option<PayeeId> {
        match self.payee() {
            Some(IdMatch::Is(payee)) => Some(*payee),
            _ => None,
        }
    }

    /// Amount a posted transaction carries.
    ///
    /// A range posts its rounded midpoint and a list posts its first entry.
    #[must_use]
    pub fn scheduled_amount(&self) -> Option<i64> {
        match self.amount()? {
            AmountMatch::Is(n) | AmountMatch::IsApprox(n) => Some(*n),
            AmountMatch::IsBetween(range) => Some(range.average()),
            AmountMatch::OneOf(ns) => ns.first().copied(),
        }
    }

    /// Whether the schedule carries more than its primary conditions or any
    /// action besides linking.
    #[must_use]
    pub fn is_custom(&self) -> bool {
        let extra_conditions = [Field::Payee, Field::Account, Field::Amount, Field::Date]
            .into_iter()
            .any(|field| self.conditions.iter().filter(|c| c.field() == field).count() > 1);
        let extra_actions = self
            .actions
            .iter()
            .any(|action| !matches!(action, ScheduleAction::LinkSchedule));
        extra_conditions || extra_actions
    }

    /// Merge `updates` into the conditions.
    ///
    /// Each update replaces the first condition with the same field and
    /// operator. Amount and date updates replace the primary amount or date
    /// condition whatever its operator. Updates with no counterpart are
    /// appended.
    pub fn update_conditions(&mut self, updates: impl IntoIterator<Item = Condition>) {
        for update in updates {
            let field = update.field();
            let op = update.op();
            let single_slot = matches!(field, Field::Amount | Field::Date);
            let existing = self
                .conditions
                .iter()
                .position(|c| c.field() == field && (single_slot || c.op() == op));
            match existing {
                Some(index) => self.conditions[index] = update,
                None => self.conditions.push(update),
            }
        }
    }

    /// First occurrence of the date condition on or after `today`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the date condition holds a malformed rule.
    pub fn next_occurrence(&self, today: Date) -> Result<Option<Date>, ConfigError> {
        match self.date() {
            Some(spec) => spec.next_date(today),
            None => Ok(None),
        }
    }
}

/// Step-by-step builder for [`Schedule`].
#[derive(Debug, Default)]
pub struct ScheduleBuilder {
    id: Option<ScheduleId>,
    name: Option<String>,
    rule: Option<RuleId>,
    conditions: Vec<Condition>,
    actions: Option<Vec<ScheduleAction>>,
    posts_transaction: bool,
    completed: bool,
    next_date: Option<Date>,
}

impl ScheduleBuilder {
    #[must_use]
    pub fn id(mut self, id: ScheduleId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn rule(mut self, rule: RuleId) -> Self {
        self.rule = Some(rule);
        self
    }

    #[must_use]
    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    #[must_use]
    pub fn action(mut self, action: ScheduleAction) -> Self {
        self.actions.get_or_insert_with(Vec::new).push(action);
        self
    }

    #[must_use]
    pub fn posts_transaction(mut self, posts: bool) -> Self {
        self.posts_transaction = posts;
        self
    }

    #[must_use]
    pub fn completed(mut self, completed: bool) -> Self {
        self.completed = completed;
        self
    }

    #[must_use]
    pub fn next_date(mut self, date: Date) -> Self {
        self.next_date = Some(date);
        self
    }

    /// Consume the builder, validate, and return a [`Schedule`].
    ///
    /// Without explicit actions the schedule links its matches. Without an
    /// explicit next date it starts at the date condition's first date.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Schedule::validate`].
    pub fn build(self) -> Result<Schedule, TallyError> {
        let mut schedule = Schedule {
            id: self.id.unwrap_or_default(),
            name: self.name,
            rule: self.rule,
            conditions: self.conditions,
            actions: self
                .actions
                .unwrap_or_else(|| vec![ScheduleAction::LinkSchedule]),
            posts_transaction: self.posts_transaction,
            completed: self.completed,
            next_date: self.next_date,
        };
        schedule.validate()?;
        if schedule.next_date.is_none() {
            schedule.next_date = schedule.date().map(DateSpec::start);
        }
        Ok(schedule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::AmountRange;
    use crate::transaction::Transaction;

    fn date(y: i32, m: u32, d: u32) -> Date {
        chrono::NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn monthly_rent() -> Schedule {
        Schedule::builder()
            .name("Rent")
            .condition(Condition::Account(IdMatch::Is(AccountId::new())))
            .condition(Condition::Amount(AmountMatch::IsApprox(-120_000)))
            .condition(Condition::Date(DateMatch::IsApprox(
                RecurConfig::monthly(date(2024, 1, 1)).into(),
            )))
            .build()
            .unwrap()
    }

    #[test]
    fn should_build_schedule_with_link_action_by_default() {
        let schedule = monthly_rent();
        assert_eq!(schedule.actions, vec![ScheduleAction::LinkSchedule]);
        assert_eq!(schedule.next_date, Some(date(2024, 1, 1)));
        assert!(!schedule.completed);
        assert!(!schedule.is_custom());
    }

    #[test]
    fn should_return_date_required_when_no_date_condition() {
        let result = Schedule::builder()
            .condition(Condition::Amount(AmountMatch::Is(5)))
            .build();
        assert!(matches!(
            result,
            Err(TallyError::Validation(ValidationError::DateRequired))
        ));
    }

    #[test]
    fn should_return_config_error_when_rule_is_malformed() {
        let result = Schedule::builder()
            .condition(Condition::Date(DateMatch::Is(
                RecurConfig::monthly(date(2024, 1, 1)).every(0).into(),
            )))
            .build();
        assert!(matches!(
            result,
            Err(TallyError::Config(ConfigError::ZeroInterval))
        ));
    }

    #[test]
    fn should_reject_blank_name() {
        let result = Schedule::builder()
            .name("  ")
            .condition(Condition::Date(DateMatch::Is(date(2024, 1, 1).into())))
            .build();
        assert!(matches!(
            result,
            Err(TallyError::Validation(ValidationError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn should_derive_primary_fields_from_conditions() {
        let schedule = monthly_rent();
        assert!(schedule.payee().is_none());
        assert!(schedule.posting_account().is_some());
        assert_eq!(schedule.amount_op(), Some(Operator::IsApprox));
        assert_eq!(schedule.scheduled_amount(), Some(-120_000));
        assert!(schedule.date().is_some_and(DateSpec::is_recurring));
    }

    #[test]
    fn should_post_rounded_average_of_range() {
        let mut schedule = monthly_rent();
        schedule.update_conditions([Condition::Amount(AmountMatch::IsBetween(AmountRange::new(
            -1000, -1501,
        )))]);
        assert_eq!(schedule.scheduled_amount(), Some(-1251));
    }

    #[test]
    fn should_replace_amount_whatever_its_operator() {
        let mut schedule = monthly_rent();
        let before = schedule.conditions.len();
        schedule.update_conditions([Condition::Amount(AmountMatch::Is(-99))]);
        assert_eq!(schedule.conditions.len(), before);
        assert_eq!(schedule.amount(), Some(&AmountMatch::Is(-99)));
    }

    #[test]
    fn should_append_conditions_without_counterpart() {
        let mut schedule = monthly_rent();
        let payee = PayeeId::new();
        schedule.update_conditions([
            Condition::Payee(IdMatch::Is(payee)),
            Condition::Account(IdMatch::OneOf(vec![AccountId::new()])),
        ]);
        assert_eq!(schedule.posting_payee(), Some(payee));
        assert!(schedule.is_custom());
        assert_eq!(schedule.conditions.len(), 5);
    }

    #[test]
    fn should_flag_schedule_with_extra_actions_as_custom() {
        let mut schedule = monthly_rent();
        schedule.actions.push(ScheduleAction::Other {
            op: "set".to_string(),
            value: serde_json::json!({ "field": "notes", "value": "rent" }),
        });
        assert!(schedule.is_custom());
    }

    #[test]
    fn should_prefill_schedule_from_transaction() {
        let payee = PayeeId::new();
        let tx = Transaction::builder()
            .date(date(2024, 3, 5))
            .account(AccountId::new())
            .payee(payee)
            .amount(-4_500)
            .build()
            .unwrap();
        let schedule = Schedule::from_transaction(&tx, Some("Gym".to_string()));
        assert_eq!(schedule.name.as_deref(), Some("Gym"));
        assert_eq!(schedule.posting_payee(), Some(payee));
        assert_eq!(schedule.posting_account(), Some(tx.account));
        assert_eq!(schedule.amount(), Some(&AmountMatch::Is(-4_500)));
        assert_eq!(schedule.date().map(DateSpec::start), Some(date(2024, 3, 5)));
        assert!(schedule.validate().is_ok());
    }

    #[test]
    fn should_serialize_actions_with_op_names() {
        let json = serde_json::to_value(ScheduleAction::LinkSchedule).unwrap();
        assert_eq!(json, serde_json::json!({ "op": "link-schedule" }));
        let parsed: ScheduleAction =
            serde_json::from_value(serde_json::json!({ "op": "set", "value": 1 })).unwrap();
        assert!(matches!(parsed, ScheduleAction::Other { op, .. } if op == "set"));
    }

    #[test]
    fn should_compute_next_occurrence_from_today() {
        let schedule = monthly_rent();
        assert_eq!(
            schedule.next_occurrence(date(2024, 3, 2)).unwrap(),
            Some(date(2024, 4, 1))
        );
    }
}

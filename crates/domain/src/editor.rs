//! Schedule editor: the editing state of one schedule.
//!
//! The editor holds the primary fields being edited, the transactions shown
//! next to them and which of those are selected. It never performs IO: the
//! app layer feeds it transactions and turns its output into saves.

use serde::{Deserialize, Serialize};

use crate::condition::{AmountMatch, AmountRange, Condition, DateMatch, Field, IdMatch, Operator};
use crate::error::{TallyError, ValidationError};
use crate::id::{AccountId, PayeeId, ScheduleId, TransactionId};
use crate::recurrence::{DateSpec, RecurConfig};
use crate::schedule::{Schedule, ScheduleAction};
use crate::time::Date;
use crate::transaction::Transaction;

/// Which transactions the editor lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationMode {
    /// Transactions matching the current fields.
    Matched,
    /// Transactions already linked to the schedule.
    Linked,
}

/// Amount field value; its shape follows the amount operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AmountValue {
    Single(i64),
    Range(AmountRange),
}

/// Editable primary fields of a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleFields {
    pub name: String,
    pub payee: Option<PayeeId>,
    pub account: Option<AccountId>,
    /// `None` when the amount was cleared.
    pub amount: Option<AmountValue>,
    pub amount_op: Operator,
    /// `None` when the date was cleared.
    pub date: Option<DateSpec>,
    pub posts_transaction: bool,
}

impl ScheduleFields {
    fn fresh(today: Date) -> Self {
        Self {
            name: String::new(),
            payee: None,
            account: None,
            amount: Some(AmountValue::Single(0)),
            amount_op: Operator::IsApprox,
            date: Some(DateSpec::Recurring(RecurConfig::monthly(today))),
            posts_transaction: false,
        }
    }

    /// Copy the primary fields of `schedule`.
    fn load(schedule: &Schedule) -> Self {
        let (amount_op, amount) = match schedule.amount() {
            Some(AmountMatch::Is(n)) => (Operator::Is, AmountValue::Single(*n)),
            Some(AmountMatch::IsApprox(n)) => (Operator::IsApprox, AmountValue::Single(*n)),
            Some(AmountMatch::IsBetween(range)) => (Operator::IsBetween, AmountValue::Range(*range)),
            Some(AmountMatch::OneOf(ns)) => (
                Operator::Is,
                AmountValue::Single(ns.first().copied().unwrap_or(0)),
            ),
            None => (Operator::IsApprox, AmountValue::Single(0)),
        };
        Self {
            name: schedule.name.clone().unwrap_or_default(),
            payee: schedule.posting_payee(),
            account: schedule.posting_account(),
            amount: Some(amount),
            amount_op,
            date: schedule.date().cloned(),
            posts_transaction: schedule.posts_transaction,
        }
    }
}

/// Editing state of one schedule.
#[derive(Debug, Clone)]
pub struct ScheduleEditor {
    schedule: Schedule,
    is_new: bool,
    fields: ScheduleFields,
    mode: AssociationMode,
    transactions: Vec<Transaction>,
    origin: Option<TransactionId>,
    selected: Vec<TransactionId>,
}

impl ScheduleEditor {
    /// Start a brand new schedule: monthly from `today`, nothing selected.
    #[must_use]
    pub fn new_schedule(today: Date) -> Self {
        let fields = ScheduleFields::fresh(today);
        let schedule = Schedule {
            id: ScheduleId::new(),
            name: None,
            rule: None,
            conditions: Vec::new(),
            actions: vec![ScheduleAction::LinkSchedule],
            posts_transaction: false,
            completed: false,
            next_date: None,
        };
        Self {
            schedule,
            is_new: true,
            fields,
            mode: AssociationMode::Matched,
            transactions: Vec::new(),
            origin: None,
            selected: Vec::new(),
        }
    }

    /// Start a new schedule pre-filled from `tx`, with `tx` selected for the
    /// initial link.
    #[must_use]
    pub fn from_transaction(tx: &Transaction, payee_name: Option<String>) -> Self {
        let schedule = Schedule::from_transaction(tx, payee_name);
        let fields = ScheduleFields::load(&schedule);
        Self {
            schedule,
            is_new: true,
            fields,
            mode: AssociationMode::Matched,
            transactions: vec![tx.clone()],
            origin: Some(tx.id),
            selected: vec![tx.id],
        }
    }

    /// Edit an existing schedule, listing its linked transactions.
    #[must_use]
    pub fn edit(schedule: Schedule) -> Self {
        let fields = ScheduleFields::load(&schedule);
        Self {
            schedule,
            is_new: false,
            fields,
            mode: AssociationMode::Linked,
            transactions: Vec::new(),
            origin: None,
            selected: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    #[must_use]
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    #[must_use]
    pub fn fields(&self) -> &ScheduleFields {
        &self.fields
    }

    #[must_use]
    pub fn mode(&self) -> AssociationMode {
        self.mode
    }

    #[must_use]
    pub fn origin(&self) -> Option<TransactionId> {
        self.origin
    }

    #[must_use]
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.fields.name = name.into();
    }

    pub fn set_payee(&mut self, payee: Option<PayeeId>) {
        self.fields.payee = payee;
    }

    pub fn set_account(&mut self, account: Option<AccountId>) {
        self.fields.account = account;
    }

    pub fn set_amount(&mut self, amount: Option<AmountValue>) {
        self.fields.amount = amount;
    }

    pub fn set_date(&mut self, date: Option<DateSpec>) {
        self.fields.date = date;
    }

    pub fn set_posts_transaction(&mut self, posts: bool) {
        self.fields.posts_transaction = posts;
    }

    /// Change the amount operator, converting the amount to the new shape:
    /// `n` becomes `{n, n}` for `isbetween`, and a range keeps `num1` otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidCondition`] for `oneOf`, which the
    /// editor cannot express.
    pub fn set_amount_op(&mut self, op: Operator) -> Result<(), ValidationError> {
        if op == Operator::OneOf {
            return Err(ValidationError::InvalidCondition {
                field: Field::Amount.to_string(),
                op: op.to_string(),
            });
        }
        self.fields.amount = match (op, self.fields.amount) {
            (Operator::IsBetween, Some(AmountValue::Single(n))) => {
                Some(AmountValue::Range(AmountRange::new(n, n)))
            }
            (Operator::Is | Operator::IsApprox, Some(AmountValue::Range(range))) => {
                Some(AmountValue::Single(range.num1))
            }
            (_, amount) => amount,
        };
        self.fields.amount_op = op;
        Ok(())
    }

    /// Toggle between a recurring rule and a single date, both from `today`.
    pub fn set_repeats(&mut self, repeats: bool, today: Date) {
        self.fields.date = Some(if repeats {
            DateSpec::Recurring(RecurConfig::monthly(today))
        } else {
            DateSpec::Date(today)
        });
    }

    /// Switch the listed transactions. The selection is always cleared.
    pub fn set_mode(&mut self, mode: AssociationMode) {
        self.mode = mode;
        self.selected.clear();
    }

    /// Replace the listed transactions, the originating one first.
    pub fn set_transactions(&mut self, mut transactions: Vec<Transaction>) {
        if let Some(origin) = self.origin {
            if let Some(index) = transactions.iter().position(|tx| tx.id == origin) {
                let tx = transactions.remove(index);
                transactions.insert(0, tx);
            }
        }
        self.transactions = transactions;
    }

    pub fn select(&mut self, id: TransactionId) {
        if !self.selected.contains(&id) {
            self.selected.push(id);
        }
    }

    pub fn deselect(&mut self, id: TransactionId) {
        self.selected.retain(|selected| *selected != id);
    }

    pub fn toggle(&mut self, id: TransactionId) {
        if self.selected.contains(&id) {
            self.deselect(id);
        } else {
            self.select(id);
        }
    }

    pub fn select_none(&mut self) {
        self.selected.clear();
    }

    #[must_use]
    pub fn selected(&self) -> &[TransactionId] {
        &self.selected
    }

    /// Transactions to link when a new schedule is first saved.
    #[must_use]
    pub fn initial_links(&self) -> Vec<TransactionId> {
        if self.is_new {
            self.selected.clone()
        } else {
            Vec::new()
        }
    }

    /// Conditions implied by the current fields alone, used to look up
    /// matching transactions while editing. Missing fields are left out.
    #[must_use]
    pub fn draft_conditions(&self) -> Vec<Condition> {
        let mut conditions = Vec::with_capacity(4);
        if let Some(payee) = self.fields.payee {
            conditions.push(Condition::Payee(IdMatch::Is(payee)));
        }
        if let Some(account) = self.fields.account {
            conditions.push(Condition::Account(IdMatch::Is(account)));
        }
        if let Some(amount) = self.amount_condition() {
            conditions.push(amount);
        }
        if let Some(date) = &self.fields.date {
            conditions.push(Condition::Date(DateMatch::IsApprox(date.clone())));
        }
        conditions
    }

    fn amount_condition(&self) -> Option<Condition> {
        let amount = match (self.fields.amount_op, self.fields.amount?) {
            (Operator::IsBetween, AmountValue::Range(range)) => AmountMatch::IsBetween(range),
            (Operator::IsBetween, AmountValue::Single(n)) => {
                AmountMatch::IsBetween(AmountRange::new(n, n))
            }
            (Operator::Is, AmountValue::Single(n)) => AmountMatch::Is(n),
            (Operator::Is, AmountValue::Range(range)) => AmountMatch::Is(range.num1),
            (_, AmountValue::Single(n)) => AmountMatch::IsApprox(n),
            (_, AmountValue::Range(range)) => AmountMatch::IsApprox(range.num1),
        };
        Some(Condition::Amount(amount))
    }

    /// Merge the fields into the schedule's conditions.
    ///
    /// Primary conditions are replaced in place, missing ones appended and
    /// the amount condition always overwritten. A cleared payee or account
    /// drops its `is` condition.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::DateRequired`] without a date and
    /// [`ValidationError::AmountRequired`] without an amount.
    pub fn to_conditions(&self) -> Result<Vec<Condition>, ValidationError> {
        let date = self.fields.date.clone().ok_or(ValidationError::DateRequired)?;
        let amount = self.amount_condition().ok_or(ValidationError::AmountRequired)?;

        let mut schedule = self.schedule.clone();
        if self.fields.payee.is_none() {
            schedule
                .conditions
                .retain(|c| !matches!(c, Condition::Payee(IdMatch::Is(_))));
        }
        if self.fields.account.is_none() {
            schedule
                .conditions
                .retain(|c| !matches!(c, Condition::Account(IdMatch::Is(_))));
        }

        let mut updates = Vec::with_capacity(4);
        if let Some(payee) = self.fields.payee {
            updates.push(Condition::Payee(IdMatch::Is(payee)));
        }
        if let Some(account) = self.fields.account {
            updates.push(Condition::Account(IdMatch::Is(account)));
        }
        updates.push(amount);
        updates.push(Condition::Date(DateMatch::IsApprox(date)));
        schedule.update_conditions(updates);
        Ok(schedule.conditions)
    }

    /// The schedule as it would be saved. `next_date` is left for the save
    /// flow to compute.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`to_conditions`](Self::to_conditions) and of
    /// [`Schedule::validate`].
    pub fn to_schedule(&self) -> Result<Schedule, TallyError> {
        let mut schedule = self.schedule.clone();
        schedule.conditions = self.to_conditions()?;
        let name = self.fields.name.trim();
        schedule.name = (!name.is_empty()).then(|| name.to_string());
        schedule.posts_transaction = self.fields.posts_transaction;
        schedule.validate()?;
        Ok(schedule)
    }
}

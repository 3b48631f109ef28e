//! Transaction: a ledger entry owned by the surrounding ledger.
//!
//! The engine reads transactions to match and classify schedules, and only
//! ever writes back the `schedule` link (plus inserting transactions it posts
//! on a schedule's behalf).

use serde::{Deserialize, Serialize};

use crate::error::{TallyError, ValidationError};
use crate::id::{AccountId, PayeeId, ScheduleId, TransactionId};
use crate::time::Date;

/// A ledger transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub date: Date,
    pub account: AccountId,
    pub payee: Option<PayeeId>,
    /// Minor units; negative is an outflow.
    pub amount: i64,
    pub notes: Option<String>,
    pub schedule: Option<ScheduleId>,
}

impl Transaction {
    /// Create a builder for constructing a [`Transaction`].
    #[must_use]
    pub fn builder() -> TransactionBuilder {
        TransactionBuilder::default()
    }

    #[must_use]
    pub fn is_linked_to(&self, schedule: ScheduleId) -> bool {
        self.schedule == Some(schedule)
    }
}

/// Step-by-step builder for [`Transaction`].
#[derive(Debug, Default)]
pub struct TransactionBuilder {
    id: Option<TransactionId>,
    date: Option<Date>,
    account: Option<AccountId>,
    payee: Option<PayeeId>,
    amount: i64,
    notes: Option<String>,
    schedule: Option<ScheduleId>,
}

impl TransactionBuilder {
    #[must_use]
    pub fn id(mut self, id: TransactionId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn date(mut self, date: Date) -> Self {
        self.date = Some(date);
        self
    }

    #[must_use]
    pub fn account(mut self, account: AccountId) -> Self {
        self.account = Some(account);
        self
    }

    #[must_use]
    pub fn payee(mut self, payee: PayeeId) -> Self {
        self.payee = Some(payee);
        self
    }

    #[must_use]
    pub fn amount(mut self, amount: i64) -> Self {
        self.amount = amount;
        self
    }

    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    #[must_use]
    pub fn schedule(mut self, schedule: ScheduleId) -> Self {
        self.schedule = Some(schedule);
        self
    }

    /// Consume the builder and return a [`Transaction`].
    ///
    /// # Errors
    ///
    /// Returns [`TallyError::Validation`] when the date or the account is missing.
    pub fn build(self) -> Result<Transaction, TallyError> {
        let date = self.date.ok_or(ValidationError::DateRequired)?;
        let account = self.account.ok_or_else(|| ValidationError::InvalidValue {
            field: "account".to_string(),
            reason: "an account is required".to_string(),
        })?;
        Ok(Transaction {
            id: self.id.unwrap_or_default(),
            date,
            account,
            payee: self.payee,
            amount: self.amount,
            notes: self.notes,
            schedule: self.schedule,
        })
    }
}

/// One entry of a batch update: set or clear a transaction's schedule link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScheduleLink {
    pub id: TransactionId,
    pub schedule: Option<ScheduleId>,
}

impl ScheduleLink {
    #[must_use]
    pub fn link(id: TransactionId, schedule: ScheduleId) -> Self {
        Self {
            id,
            schedule: Some(schedule),
        }
    }

    #[must_use]
    pub fn unlink(id: TransactionId) -> Self {
        Self { id, schedule: None }
    }
}

/// Changes sent to the ledger in one round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionBatch {
    #[serde(default)]
    pub added: Vec<Transaction>,
    #[serde(default)]
    pub updated: Vec<ScheduleLink>,
}

impl TransactionBatch {
    #[must_use]
    pub fn links(updated: Vec<ScheduleLink>) -> Self {
        Self {
            added: Vec::new(),
            updated,
        }
    }

    #[must_use]
    pub fn additions(added: Vec<Transaction>) -> Self {
        Self {
            added,
            updated: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty()
    }
}

/// A transaction a schedule is expected to produce, not yet in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewTransaction {
    /// `preview/<schedule>/<date>`.
    pub id: String,
    pub schedule: ScheduleId,
    pub date: Date,
    pub account: Option<AccountId>,
    pub payee: Option<PayeeId>,
    pub amount: i64,
}

impl PreviewTransaction {
    #[must_use]
    pub fn preview_id(schedule: ScheduleId, date: Date) -> String {
        format!("preview/{schedule}/{}", crate::time::format_date(date))
    }
}

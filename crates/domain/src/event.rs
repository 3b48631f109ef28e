//! Ledger events: notifications that stored data changed.
//!
//! Live views subscribe to these to know when to query again.

use serde::{Deserialize, Serialize};

use crate::id::{ScheduleId, TransactionId};
use crate::time::{Timestamp, now};

/// What changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerChange {
    /// Transactions were inserted or had their schedule link changed.
    TransactionsChanged { ids: Vec<TransactionId> },
    /// Schedules were created or updated.
    SchedulesChanged { ids: Vec<ScheduleId> },
}

/// A change together with when it was published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub change: LedgerChange,
    pub timestamp: Timestamp,
}

impl LedgerEvent {
    #[must_use]
    pub fn transactions_changed(ids: Vec<TransactionId>) -> Self {
        Self {
            change: LedgerChange::TransactionsChanged { ids },
            timestamp: now(),
        }
    }

    #[must_use]
    pub fn schedules_changed(ids: Vec<ScheduleId>) -> Self {
        Self {
            change: LedgerChange::SchedulesChanged { ids },
            timestamp: now(),
        }
    }

    #[must_use]
    pub fn touches_transactions(&self) -> bool {
        matches!(self.change, LedgerChange::TransactionsChanged { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_serialize_change_with_type_tag() {
        let event = LedgerEvent::schedules_changed(vec![]);
        let json = serde_json::to_value(&event.change).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "schedules_changed", "ids": [] }));
    }

    #[test]
    fn should_flag_transaction_changes() {
        assert!(LedgerEvent::transactions_changed(vec![TransactionId::new()]).touches_transactions());
        assert!(!LedgerEvent::schedules_changed(vec![]).touches_transactions());
    }
}

//! Transaction ports: the query layer and the batch-update transport.
//!
//! Transactions belong to the surrounding ledger. The engine reads them
//! through [`TransactionQuery`] and writes schedule links and posted
//! transactions through [`TransactionBatchUpdate`].

use std::future::Future;

use tally_domain::error::TallyError;
use tally_domain::filter::TransactionFilter;
use tally_domain::id::ScheduleId;
use tally_domain::transaction::{Transaction, TransactionBatch};

/// Read access to ledger transactions.
pub trait TransactionQuery {
    /// Every transaction the filter matches, ordered by date.
    fn find(
        &self,
        filter: &TransactionFilter,
    ) -> impl Future<Output = Result<Vec<Transaction>, TallyError>> + Send;

    /// Transactions linked to `schedule`, ordered by date.
    fn linked_to(
        &self,
        schedule: ScheduleId,
    ) -> impl Future<Output = Result<Vec<Transaction>, TallyError>> + Send;

    /// Transactions linked to any of `schedules`, ordered by date.
    fn linked_to_any(
        &self,
        schedules: &[ScheduleId],
    ) -> impl Future<Output = Result<Vec<Transaction>, TallyError>> + Send;
}

impl<T: TransactionQuery + Send + Sync> TransactionQuery for std::sync::Arc<T> {
    fn find(
        &self,
        filter: &TransactionFilter,
    ) -> impl Future<Output = Result<Vec<Transaction>, TallyError>> + Send {
        (**self).find(filter)
    }

    fn linked_to(
        &self,
        schedule: ScheduleId,
    ) -> impl Future<Output = Result<Vec<Transaction>, TallyError>> + Send {
        (**self).linked_to(schedule)
    }

    fn linked_to_any(
        &self,
        schedules: &[ScheduleId],
    ) -> impl Future<Output = Result<Vec<Transaction>, TallyError>> + Send {
        (**self).linked_to_any(schedules)
    }
}

/// Write access to ledger transactions, one round trip per batch.
pub trait TransactionBatchUpdate {
    /// Insert `batch.added` and apply every link change in `batch.updated`.
    ///
    /// Linking a transaction replaces whatever schedule it was linked to.
    /// Unknown transaction ids in `updated` are ignored.
    fn batch_update(
        &self,
        batch: TransactionBatch,
    ) -> impl Future<Output = Result<(), TallyError>> + Send;
}

impl<T: TransactionBatchUpdate + Send + Sync> TransactionBatchUpdate for std::sync::Arc<T> {
    fn batch_update(
        &self,
        batch: TransactionBatch,
    ) -> impl Future<Output = Result<(), TallyError>> + Send {
        (**self).batch_update(batch)
    }
}

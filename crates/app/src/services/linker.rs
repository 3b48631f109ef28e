//! Maintains which transactions belong to which schedule.

use std::sync::Arc;

use tally_domain::error::TallyError;
use tally_domain::event::LedgerEvent;
use tally_domain::id::{ScheduleId, TransactionId};
use tally_domain::transaction::{ScheduleLink, Transaction, TransactionBatch};

use crate::live_query::LiveQuery;
use crate::ports::{EventPublisher, EventSource, TransactionBatchUpdate, TransactionQuery};

/// Application service linking transactions to schedules.
///
/// Every successful batch is followed by a
/// [`TransactionsChanged`](tally_domain::event::LedgerChange::TransactionsChanged)
/// event so live views refresh.
pub struct ScheduleLinker<Q, B, P> {
    query: Arc<Q>,
    batch: B,
    publisher: P,
}

impl<Q, B, P> ScheduleLinker<Q, B, P>
where
    Q: TransactionQuery + Send + Sync + 'static,
    B: TransactionBatchUpdate,
    P: EventPublisher,
{
    /// Create a new linker.
    pub fn new(query: Arc<Q>, batch: B, publisher: P) -> Self {
        Self {
            query,
            batch,
            publisher,
        }
    }

    /// Link every transaction in `ids` to `schedule`, replacing any previous
    /// link. Linking again is a no-op success; an empty list sends nothing.
    ///
    /// # Errors
    ///
    /// Returns a transport error from the batch update.
    #[tracing::instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn link(&self, ids: &[TransactionId], schedule: ScheduleId) -> Result<(), TallyError> {
        let links = ids
            .iter()
            .map(|id| ScheduleLink::link(*id, schedule))
            .collect();
        self.apply(TransactionBatch::links(links)).await
    }

    /// Clear the schedule link of every transaction in `ids`.
    ///
    /// # Errors
    ///
    /// Returns a transport error from the batch update.
    #[tracing::instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn unlink(&self, ids: &[TransactionId]) -> Result<(), TallyError> {
        let links = ids.iter().map(|id| ScheduleLink::unlink(*id)).collect();
        self.apply(TransactionBatch::links(links)).await
    }

    /// Insert transactions posted on a schedule's behalf.
    ///
    /// # Errors
    ///
    /// Returns a transport error from the batch update.
    #[tracing::instrument(skip(self, transactions), fields(count = transactions.len()))]
    pub async fn add_transactions(&self, transactions: Vec<Transaction>) -> Result<(), TallyError> {
        self.apply(TransactionBatch::additions(transactions)).await
    }

    async fn apply(&self, batch: TransactionBatch) -> Result<(), TallyError> {
        if batch.is_empty() {
            return Ok(());
        }
        let ids: Vec<TransactionId> = batch
            .added
            .iter()
            .map(|tx| tx.id)
            .chain(batch.updated.iter().map(|link| link.id))
            .collect();
        self.batch.batch_update(batch).await?;
        self.publisher
            .publish(LedgerEvent::transactions_changed(ids))
            .await
    }

    /// Publish an arbitrary ledger event through the linker's publisher.
    pub(crate) async fn publish(&self, event: LedgerEvent) -> Result<(), TallyError> {
        self.publisher.publish(event).await
    }

    /// Transactions linked to `schedule`, with `origin` first when present.
    ///
    /// # Errors
    ///
    /// Returns an error from the query layer.
    pub async fn linked_transactions(
        &self,
        schedule: ScheduleId,
        origin: Option<TransactionId>,
    ) -> Result<Vec<Transaction>, TallyError> {
        let transactions = self.query.linked_to(schedule).await?;
        Ok(origin_first(transactions, origin))
    }

    /// Transactions linked to any of `schedules`.
    ///
    /// # Errors
    ///
    /// Returns an error from the query layer.
    pub async fn linked_to_any(
        &self,
        schedules: &[ScheduleId],
    ) -> Result<Vec<Transaction>, TallyError> {
        self.query.linked_to_any(schedules).await
    }

    /// Live view of [`linked_transactions`](Self::linked_transactions).
    pub fn watch_linked(
        &self,
        events: &impl EventSource,
        schedule: ScheduleId,
        origin: Option<TransactionId>,
    ) -> LiveQuery<Transaction> {
        let query = Arc::clone(&self.query);
        LiveQuery::spawn(events.subscribe(), move || {
            let query = Arc::clone(&query);
            async move {
                let transactions = query.linked_to(schedule).await?;
                Ok(origin_first(transactions, origin))
            }
        })
    }
}

/// Move `origin` to the front, keeping the order of the rest.
#[must_use]
pub fn origin_first(mut transactions: Vec<Transaction>, origin: Option<TransactionId>) -> Vec<Transaction> {
    if let Some(index) = origin.and_then(|id| transactions.iter().position(|tx| tx.id == id)) {
        let tx = transactions.remove(index);
        transactions.insert(0, tx);
    }
    transactions
}

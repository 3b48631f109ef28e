//! Transaction matcher: finds ledger transactions satisfying a set of
//! schedule conditions, once or continuously while the conditions are edited.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;

use tally_domain::condition::Condition;
use tally_domain::error::TallyError;
use tally_domain::event::LedgerEvent;
use tally_domain::transaction::Transaction;

use crate::live_query::wait_for_transaction_change;
use crate::ports::{EventSource, RuleEngine, TransactionQuery};

/// Default delay between the last condition change and the query it triggers.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

const UPDATE_BUFFER: usize = 16;

/// Application service matching transactions against conditions.
pub struct TransactionMatcher<Q, RE> {
    query: Arc<Q>,
    rules: RE,
}

impl<Q, RE> TransactionMatcher<Q, RE>
where
    Q: TransactionQuery + Send + Sync + 'static,
    RE: RuleEngine + Clone,
{
    /// Create a new matcher.
    pub fn new(query: Arc<Q>, rules: RE) -> Self {
        Self { query, rules }
    }

    /// Every transaction satisfying all `conditions`.
    ///
    /// # Errors
    ///
    /// Returns [`TallyError::Validation`] for conditions the rule engine
    /// rejects, or an error from the query layer.
    #[tracing::instrument(skip(self, conditions), fields(count = conditions.len()))]
    pub async fn find_matches(
        &self,
        conditions: &[Condition],
    ) -> Result<Vec<Transaction>, TallyError> {
        let filter = self.rules.conditions_to_filter(conditions)?;
        self.query.find(&filter).await
    }

    /// Open a live session that re-queries after each condition change and
    /// each ledger change.
    pub fn session(&self, events: &impl EventSource, debounce: Duration) -> MatchSession<Q, RE> {
        let (sender, updates) = mpsc::channel(UPDATE_BUFFER);
        MatchSession {
            query: Arc::clone(&self.query),
            rules: self.rules.clone(),
            events: events.subscribe(),
            debounce,
            generation: Arc::new(AtomicU64::new(0)),
            task: None,
            sender,
            updates,
        }
    }
}

struct MatchUpdate {
    generation: u64,
    result: Result<Vec<Transaction>, TallyError>,
}

/// Live, debounced match results for conditions that keep changing.
///
/// Every [`update`](Self::update) starts a new generation. Results computed
/// for an older generation are never returned by [`next`](Self::next), even
/// when they arrive after the newer ones were requested.
pub struct MatchSession<Q, RE> {
    query: Arc<Q>,
    rules: RE,
    events: broadcast::Receiver<LedgerEvent>,
    debounce: Duration,
    generation: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
    sender: mpsc::Sender<MatchUpdate>,
    updates: mpsc::Receiver<MatchUpdate>,
}

impl<Q, RE> MatchSession<Q, RE>
where
    Q: TransactionQuery + Send + Sync + 'static,
    RE: RuleEngine,
{
    /// Replace the conditions being matched.
    ///
    /// The query for the previous conditions is cancelled. The new query runs
    /// once the debounce delay has passed without another update.
    pub fn update(&mut self, conditions: &[Condition]) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(task) = self.task.take() {
            task.abort();
        }

        let filter = self.rules.conditions_to_filter(conditions);
        let query = Arc::clone(&self.query);
        let latest = Arc::clone(&self.generation);
        let sender = self.sender.clone();
        let debounce = self.debounce;
        let mut events = BroadcastStream::new(self.events.resubscribe());

        self.task = Some(tokio::spawn(async move {
            let filter = match filter {
                Ok(filter) => filter,
                Err(err) => {
                    let _ = sender.send(MatchUpdate { generation, result: Err(err) }).await;
                    return;
                }
            };
            tokio::time::sleep(debounce).await;
            loop {
                let result = query.find(&filter).await;
                if latest.load(Ordering::SeqCst) != generation {
                    tracing::debug!(generation, "discarding stale match response");
                    break;
                }
                if sender.send(MatchUpdate { generation, result }).await.is_err() {
                    break;
                }
                if !wait_for_transaction_change(&mut events).await {
                    break;
                }
            }
        }));
    }

    /// Next result for the current conditions.
    ///
    /// Waits until one is available; results of superseded conditions are
    /// skipped.
    pub async fn next(&mut self) -> Option<Result<Vec<Transaction>, TallyError>> {
        while let Some(update) = self.updates.recv().await {
            if update.generation == self.generation.load(Ordering::SeqCst) {
                return Some(update.result);
            }
            tracing::debug!(
                generation = update.generation,
                "discarding stale match response"
            );
        }
        None
    }

    /// Stop matching.
    pub fn unsubscribe(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl<Q, RE> Drop for MatchSession<Q, RE> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

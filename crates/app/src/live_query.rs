//! Live queries: query results kept current as the ledger changes.
//!
//! A [`LiveQuery`] runs its query once, then again after every ledger event
//! that touches transactions, pushing each result to the handle. The handle
//! owns the background task: [`LiveQuery::unsubscribe`] or dropping it tears
//! the task down so no result is delivered afterwards.

use std::future::Future;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use tally_domain::error::TallyError;
use tally_domain::event::LedgerEvent;

const UPDATE_BUFFER: usize = 16;

/// Handle to a query that re-runs whenever transactions change.
#[derive(Debug)]
pub struct LiveQuery<T> {
    updates: mpsc::Receiver<Result<Vec<T>, TallyError>>,
    task: JoinHandle<()>,
}

impl<T: Send + 'static> LiveQuery<T> {
    /// Start the query on the current tokio runtime.
    pub fn spawn<F, Fut>(events: broadcast::Receiver<LedgerEvent>, query: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Vec<T>, TallyError>> + Send + 'static,
    {
        let (sender, updates) = mpsc::channel(UPDATE_BUFFER);
        let task = tokio::spawn(async move {
            let mut events = BroadcastStream::new(events);
            loop {
                if sender.send(query().await).await.is_err() {
                    break;
                }
                if !wait_for_transaction_change(&mut events).await {
                    break;
                }
            }
        });
        Self { updates, task }
    }
}

impl<T> LiveQuery<T> {
    /// Next result, or `None` once the event bus is gone.
    pub async fn next(&mut self) -> Option<Result<Vec<T>, TallyError>> {
        self.updates.recv().await
    }

    /// Stop re-running the query.
    pub fn unsubscribe(self) {
        self.task.abort();
    }
}

impl<T> Drop for LiveQuery<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Wait for the next event touching transactions. A lagged receiver counts
/// as a change. Returns `false` when the bus is closed.
pub(crate) async fn wait_for_transaction_change(events: &mut BroadcastStream<LedgerEvent>) -> bool {
    while let Some(item) = events.next().await {
        match item {
            Ok(event) if event.touches_transactions() => return true,
            Ok(_) => {}
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "live query lagged, some ledger events were dropped");
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::event_bus::InProcessEventBus;
    use crate::ports::{EventPublisher, EventSource};

    fn counting_query(
        bus: &InProcessEventBus,
    ) -> (LiveQuery<usize>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let live = LiveQuery::spawn(bus.subscribe(), move || {
            let counter = Arc::clone(&counter);
            async move { Ok(vec![counter.fetch_add(1, Ordering::SeqCst) + 1]) }
        });
        (live, calls)
    }

    #[tokio::test]
    async fn should_deliver_initial_result() {
        let bus = InProcessEventBus::new(16);
        let (mut live, _) = counting_query(&bus);
        assert_eq!(live.next().await.unwrap().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn should_rerun_query_when_transactions_change() {
        let bus = InProcessEventBus::new(16);
        let (mut live, _) = counting_query(&bus);
        live.next().await.unwrap().unwrap();

        bus.publish(LedgerEvent::transactions_changed(Vec::new()))
            .await
            .unwrap();
        assert_eq!(live.next().await.unwrap().unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn should_ignore_schedule_changes() {
        let bus = InProcessEventBus::new(16);
        let (mut live, calls) = counting_query(&bus);
        live.next().await.unwrap().unwrap();

        bus.publish(LedgerEvent::schedules_changed(Vec::new()))
            .await
            .unwrap();
        bus.publish(LedgerEvent::transactions_changed(Vec::new()))
            .await
            .unwrap();
        assert_eq!(live.next().await.unwrap().unwrap(), vec![2]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn should_end_when_bus_is_dropped() {
        let bus = InProcessEventBus::new(16);
        let (mut live, _) = counting_query(&bus);
        live.next().await.unwrap().unwrap();
        drop(bus);
        assert!(live.next().await.is_none());
    }

    #[tokio::test]
    async fn should_stop_querying_after_unsubscribe() {
        let bus = InProcessEventBus::new(16);
        let (mut live, calls) = counting_query(&bus);
        live.next().await.unwrap().unwrap();
        live.unsubscribe();

        bus.publish(LedgerEvent::transactions_changed(Vec::new()))
            .await
            .unwrap();
        tokio::task::yield_now().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

//! In-process event bus backed by a tokio broadcast channel.

use std::future::Future;

use tokio::sync::broadcast;

use tally_domain::error::TallyError;
use tally_domain::event::LedgerEvent;

use crate::ports::{EventPublisher, EventSource};

/// In-process event bus using a tokio [`broadcast`] channel.
///
/// Publishing succeeds even when there are no active subscribers
/// (the event is simply dropped). Clones share the same channel.
#[derive(Debug, Clone)]
pub struct InProcessEventBus {
    sender: broadcast::Sender<LedgerEvent>,
}

impl InProcessEventBus {
    /// Create a new event bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }
}

impl EventSource for InProcessEventBus {
    /// Returns a receiver that will get all events published *after*
    /// the subscription is created.
    fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.sender.subscribe()
    }
}

impl EventPublisher for InProcessEventBus {
    fn publish(&self, event: LedgerEvent) -> impl Future<Output = Result<(), TallyError>> + Send {
        // send only fails without receivers
        let _ = self.sender.send(event);
        async { Ok(()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_domain::id::{ScheduleId, TransactionId};

    #[tokio::test]
    async fn should_deliver_event_to_subscriber() {
        let bus = InProcessEventBus::new(16);
        let mut rx = bus.subscribe();

        let id = TransactionId::new();
        bus.publish(LedgerEvent::transactions_changed(vec![id]))
            .await
            .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(
            received.change,
            tally_domain::event::LedgerChange::TransactionsChanged { ids: vec![id] }
        );
    }

    #[tokio::test]
    async fn should_deliver_event_to_clones_and_multiple_subscribers() {
        let bus = InProcessEventBus::new(16);
        let clone = bus.clone();
        let mut rx1 = bus.subscribe();
        let mut rx2 = clone.subscribe();

        let event = LedgerEvent::schedules_changed(vec![ScheduleId::new()]);
        clone.publish(event.clone()).await.unwrap();

        assert_eq!(rx1.recv().await.unwrap(), event);
        assert_eq!(rx2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn should_succeed_when_no_subscribers() {
        let bus = InProcessEventBus::new(16);
        let result = bus
            .publish(LedgerEvent::transactions_changed(Vec::new()))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn should_not_deliver_events_published_before_subscription() {
        let bus = InProcessEventBus::new(16);
        bus.publish(LedgerEvent::transactions_changed(Vec::new()))
            .await
            .unwrap();

        let mut rx = bus.subscribe();
        let later = LedgerEvent::schedules_changed(vec![ScheduleId::new()]);
        bus.publish(later.clone()).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), later);
    }
}

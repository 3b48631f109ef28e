//! Event bus ports: publish and subscribe to ledger events.

use std::future::Future;

use tokio::sync::broadcast;

use tally_domain::error::TallyError;
use tally_domain::event::LedgerEvent;

/// Publishes ledger events to interested subscribers.
pub trait EventPublisher {
    /// Publish an event to all current subscribers.
    fn publish(&self, event: LedgerEvent) -> impl Future<Output = Result<(), TallyError>> + Send;
}

impl<T: EventPublisher + Send + Sync> EventPublisher for std::sync::Arc<T> {
    fn publish(&self, event: LedgerEvent) -> impl Future<Output = Result<(), TallyError>> + Send {
        (**self).publish(event)
    }
}

/// Hands out receivers for ledger events published from now on.
pub trait EventSource {
    fn subscribe(&self) -> broadcast::Receiver<LedgerEvent>;
}

impl<T: EventSource> EventSource for std::sync::Arc<T> {
    fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        (**self).subscribe()
    }
}

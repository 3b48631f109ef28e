//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod event_bus;
pub mod rule_engine;
pub mod schedule_repo;
pub mod transactions;
pub mod upcoming_dates;

pub use event_bus::{EventPublisher, EventSource};
pub use rule_engine::{DefaultRuleEngine, RuleEngine};
pub use schedule_repo::ScheduleRepository;
pub use transactions::{TransactionBatchUpdate, TransactionQuery};
pub use upcoming_dates::{LocalUpcomingDates, UpcomingDates};

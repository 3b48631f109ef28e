//! # tally-app
//!
//! Application layer — use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `TransactionQuery` — read ledger transactions through a filter
//!   - `TransactionBatchUpdate` — insert transactions and change schedule links
//!   - `ScheduleRepository` — persistence for schedules
//!   - `UpcomingDates` — occurrence calculation
//!   - `RuleEngine` — conditions to query filter
//!   - `EventPublisher` / `EventSource` — ledger change notifications
//! - Define **driving/inbound ports** as use-case structs:
//!   - `ScheduleService` — save, statuses, skip, post, advance, preview
//!   - `ScheduleLinker` — link and unlink transactions
//!   - `TransactionMatcher` — one-shot and live, debounced matching
//! - Provide **in-process infrastructure** (event bus, live queries) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `tally-domain` only (plus `tokio` for channels and tasks).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod event_bus;
pub mod live_query;
pub mod ports;
pub mod services;

#[cfg(test)]
mod testing;

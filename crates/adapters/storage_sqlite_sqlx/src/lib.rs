//! # tally-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement `ScheduleRepository`, `TransactionQuery` and
//!   `TransactionBatchUpdate` from `tally-app::ports`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain types and database rows
//!
//! ## Dependency rule
//! Depends on `tally-app` (for port traits) and `tally-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

pub mod error;
pub mod pool;
pub mod schedule_repo;
pub mod transaction_store;

pub use error::StorageError;
pub use pool::{Config, Database};
pub use schedule_repo::SqliteScheduleRepository;
pub use transaction_store::SqliteTransactionStore;

fn decode_error(err: impl std::error::Error + Send + Sync + 'static) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(err))
}

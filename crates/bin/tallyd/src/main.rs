//! # tallyd — tally daemon
//!
//! Composition root that wires the storage adapter into the schedule services
//! and runs the schedule service periodically.
//!
//! ## Responsibilities
//! - Load configuration (`tally.toml`, env vars) and initialise logging
//! - Initialize the `SQLite` connection pool and run migrations
//! - Construct repository implementations (adapters)
//! - Construct application services, injecting repositories via port traits
//! - Advance schedules and post due transactions on every tick
//! - Handle graceful shutdown (Ctrl-C)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use tally_adapter_storage_sqlite_sqlx::{
    Config as StorageConfig, SqliteScheduleRepository, SqliteTransactionStore,
};
use tally_app::event_bus::InProcessEventBus;
use tally_app::ports::{
    EventPublisher, LocalUpcomingDates, ScheduleRepository, TransactionBatchUpdate,
    TransactionQuery, UpcomingDates,
};
use tally_app::services::linker::ScheduleLinker;
use tally_app::services::schedule_service::ScheduleService;
use tally_domain::status::ScheduleStatus;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    // Database
    let db = StorageConfig {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await
    .context("failed to open database")?;
    let pool = db.pool().clone();

    // Repositories
    let transactions = Arc::new(SqliteTransactionStore::new(pool.clone()));
    let schedules = SqliteScheduleRepository::new(pool);

    // Event bus
    let event_bus = InProcessEventBus::new(256);

    // Services
    let linker = ScheduleLinker::new(Arc::clone(&transactions), transactions, event_bus);
    let service = ScheduleService::new(schedules, linker, LocalUpcomingDates);

    tracing::info!(
        interval_secs = config.schedules.run_interval_secs,
        upcoming_days = config.schedules.upcoming_days,
        "tallyd started"
    );

    let mut ticker = tokio::time::interval(config.run_interval());
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => run_once(&service, config.schedules.upcoming_days).await,
            result = &mut shutdown => {
                result.context("failed to listen for shutdown signal")?;
                tracing::info!("shutting down");
                break;
            }
        }
    }

    Ok(())
}

/// One pass of the schedule service: advance, then report what needs attention.
async fn run_once<R, Q, B, P, U>(service: &ScheduleService<R, Q, B, P, U>, upcoming_days: u32)
where
    R: ScheduleRepository,
    Q: TransactionQuery + Send + Sync + 'static,
    B: TransactionBatchUpdate,
    P: EventPublisher,
    U: UpcomingDates,
{
    let today = tally_domain::time::today();

    if let Err(err) = service.advance(today).await {
        tracing::error!(error = %err, "advancing schedules failed");
    }

    match service.statuses(today).await {
        Ok(overview) => {
            for entry in &overview {
                let name = entry.schedule.name.as_deref().unwrap_or("unnamed");
                match entry.classification.status {
                    ScheduleStatus::Due => {
                        tracing::info!(schedule = name, "schedule is due today");
                    }
                    ScheduleStatus::Missed => tracing::warn!(
                        schedule = name,
                        missed = ?entry.classification.missed_occurrence,
                        "schedule missed an occurrence"
                    ),
                    ScheduleStatus::Upcoming | ScheduleStatus::Completed => {}
                }
            }
        }
        Err(err) => tracing::error!(error = %err, "classifying schedules failed"),
    }

    match service.preview(today, upcoming_days).await {
        Ok(previews) => tracing::info!(count = previews.len(), upcoming_days, "upcoming scheduled transactions"),
        Err(err) => tracing::error!(error = %err, "previewing schedules failed"),
    }
}

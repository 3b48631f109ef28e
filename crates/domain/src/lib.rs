//! # tally-domain
//!
//! Pure domain model for the tally schedule engine.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, dates
//! - Define **recurrence rules** and compute their occurrence dates
//! - Define **conditions** (payee, account, amount, date) and evaluate them
//!   against **transactions**
//! - Define **schedules** and classify their status relative to today
//! - Model the **schedule editor** state machine (fields, association mode, selection)
//! - Describe **ledger events** published when stored data changes
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod condition;
pub mod editor;
pub mod event;
pub mod filter;
pub mod recurrence;
pub mod schedule;
pub mod status;
pub mod transaction;

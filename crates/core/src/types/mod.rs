//! Core types for TillSync.
//!
//! Everything here serializes to the JSON wire format shared between the
//! durable store, the audit log, and the dashboard reads, so field renames
//! are part of the contract and must not drift.

pub mod attempt;
pub mod credential;

pub use attempt::{MAX_RETRIES, OrderedProduct, SaleLine, SyncAttempt, SyncStatus};
pub use credential::TokenPair;

//! TillSync Core - Shared types library.
//!
//! This crate provides the common types used across all TillSync components:
//! - `bridge` - The webhook-to-POS sync service
//! - `cli` - Command-line tools for migrations and management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Sync attempt records, statuses, and credential pairs
//! - [`pricing`] - Fulfillment price and sale total computation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod pricing;
pub mod types;

pub use pricing::{SaleTotals, fulfillment_price, sale_totals};
pub use types::*;

//! Order-sync services.
//!
//! [`sync`] drives webhook intake (dedup, readiness gate, line mapping,
//! submission, classification) and [`retry`] drives the queue sweeps (drain
//! and manual resync). Both sit entirely behind the storage traits and the
//! Lightspeed client, so they run identically against Postgres or the
//! in-memory stores.

pub mod retry;
pub mod sync;

pub use retry::{ResyncOutcome, RetryService, SweepReport};
pub use sync::{ProcessedOrders, SyncOutcome, SyncService};

//! Sync status command.
//!
//! Read-only snapshot of the credential store, audit log, and retry queue
//! for operators without dashboard access.

use tillsync_bridge::db::{
    AuditLog, CredentialStore, PgAuditLog, PgCredentialStore, PgRetryQueue, RetryQueue,
};
use tillsync_core::SyncStatus;

use super::CliError;

/// Print credential, audit log, and retry queue status.
///
/// # Errors
///
/// Returns `CliError` if the database is unreachable.
#[allow(clippy::print_stdout)]
pub async fn run() -> Result<(), CliError> {
    let pool = super::connect().await?;

    let credentials = PgCredentialStore::new(pool.clone());
    let audit = PgAuditLog::new(pool.clone());
    let queue = PgRetryQueue::new(pool);

    let token = credentials.load().await?;
    let history = audit.list().await?;
    let queued = queue.list().await?;

    println!(
        "POS credential: {}",
        if token.is_some() { "present" } else { "absent" }
    );
    println!("Audit log: {} attempt(s)", history.len());

    let mut by_status: Vec<(SyncStatus, usize)> = Vec::new();
    for attempt in &history {
        match by_status.iter_mut().find(|(s, _)| *s == attempt.status) {
            Some((_, count)) => *count += 1,
            None => by_status.push((attempt.status, 1)),
        }
    }
    for (status, count) in by_status {
        println!("  {status}: {count}");
    }

    println!("Retry queue: {} attempt(s)", queued.len());
    for entry in &queued {
        println!(
            "  {} ({}, retry {})",
            entry.attempt.order_id, entry.attempt.shop_domain, entry.attempt.retry_count
        );
    }

    Ok(())
}

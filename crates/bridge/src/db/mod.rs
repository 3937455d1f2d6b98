//! Durable storage for the sync bridge.
//!
//! # Tables
//!
//! - `pos_credentials` - the single current OAuth token pair (fixed key)
//! - `sync_history` - append-only audit log of every processed order
//! - `retry_queue` - failed/skipped attempts awaiting a retry sweep
//!
//! Records are stored as serialized JSON (`tillsync_core` wire format) so
//! the audit trail reads back exactly what was processed. All storage is
//! reached through the [`CredentialStore`], [`AuditLog`], and [`RetryQueue`]
//! traits; the service layer never touches the pool directly, which keeps
//! it testable against the in-memory implementations in [`memory`].
//!
//! # Migrations
//!
//! Migrations are stored in `crates/bridge/migrations/` and run via:
//! ```bash
//! cargo run -p tillsync-cli -- migrate
//! ```

pub mod credentials;
pub mod history;
pub mod memory;
pub mod queue;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use uuid::Uuid;

use tillsync_core::{SyncAttempt, SyncStatus, TokenPair};

pub use credentials::PgCredentialStore;
pub use history::PgAuditLog;
pub use memory::{MemoryAuditLog, MemoryCredentialStore, MemoryRetryQueue};
pub use queue::PgRetryQueue;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Storage for the single current OAuth token pair.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load the persisted pair, if any.
    ///
    /// A malformed persisted record is deleted and reported as absent
    /// rather than trusted.
    ///
    /// # Errors
    ///
    /// Returns an error if storage is unreachable.
    async fn load(&self) -> Result<Option<TokenPair>, RepositoryError>;

    /// Persist the full pair, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if storage is unreachable.
    async fn save(&self, pair: &TokenPair) -> Result<(), RepositoryError>;

    /// Delete the persisted pair.
    ///
    /// # Errors
    ///
    /// Returns an error if storage is unreachable.
    async fn clear(&self) -> Result<(), RepositoryError>;
}

/// Append-only history of processed orders.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Append one attempt record.
    ///
    /// # Errors
    ///
    /// Returns an error if storage is unreachable or the record cannot be
    /// serialized.
    async fn append(&self, attempt: &SyncAttempt) -> Result<(), RepositoryError>;

    /// All records, newest first. Corrupt records are deleted and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if storage is unreachable.
    async fn list(&self) -> Result<Vec<SyncAttempt>, RepositoryError>;

    /// Rewrite the status fields of the latest record for `order_id`,
    /// leaving every other field untouched. Returns `false` when no record
    /// for the order exists.
    ///
    /// # Errors
    ///
    /// Returns an error if storage is unreachable.
    async fn update_status(
        &self,
        order_id: &str,
        status: SyncStatus,
        sale_id: Option<&str>,
        retry_count: u32,
    ) -> Result<bool, RepositoryError>;
}

/// A queued attempt together with its storage key.
///
/// Sweeps address records by this generated id, never by position or by
/// "first matching order", so removing one attempt can never drop a
/// different in-flight attempt for the same order.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedAttempt {
    pub id: Uuid,
    pub attempt: SyncAttempt,
}

/// Keyed, durable queue of attempts awaiting retry.
#[async_trait]
pub trait RetryQueue: Send + Sync {
    /// Insert an attempt under a freshly generated key.
    ///
    /// # Errors
    ///
    /// Returns an error if storage is unreachable or the record cannot be
    /// serialized.
    async fn enqueue(&self, attempt: &SyncAttempt) -> Result<Uuid, RepositoryError>;

    /// Up to `max` pending attempts, oldest first, without removing them.
    /// Corrupt records are deleted and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if storage is unreachable.
    async fn take(&self, max: i64) -> Result<Vec<QueuedAttempt>, RepositoryError>;

    /// The oldest queued attempt for an order, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if storage is unreachable.
    async fn find_by_order(&self, order_id: &str) -> Result<Option<QueuedAttempt>, RepositoryError>;

    /// Rewrite the record stored under `id` (used to bump `retry_count`).
    ///
    /// # Errors
    ///
    /// Returns an error if storage is unreachable or the record cannot be
    /// serialized.
    async fn replace(&self, id: Uuid, attempt: &SyncAttempt) -> Result<(), RepositoryError>;

    /// Remove the record stored under `id`. Returns `false` when it was
    /// already gone.
    ///
    /// # Errors
    ///
    /// Returns an error if storage is unreachable.
    async fn remove(&self, id: Uuid) -> Result<bool, RepositoryError>;

    /// All queued attempts, oldest first. Corrupt records are deleted and
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if storage is unreachable.
    async fn list(&self) -> Result<Vec<QueuedAttempt>, RepositoryError>;
}

/// Serialize a record for storage.
pub(crate) fn to_record_text(attempt: &SyncAttempt) -> Result<String, RepositoryError> {
    serde_json::to_string(attempt).map_err(|e| RepositoryError::DataCorruption(e.to_string()))
}

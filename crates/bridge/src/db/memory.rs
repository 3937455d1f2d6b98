//! In-memory storage implementations.
//!
//! Behavioral twins of the Postgres stores, used by the test suites and
//! handy for local development without a database. Not durable: everything
//! is lost when the process exits.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use uuid::Uuid;

use tillsync_core::{SyncAttempt, SyncStatus, TokenPair};

use super::{AuditLog, CredentialStore, QueuedAttempt, RepositoryError, RetryQueue};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory credential store.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    pair: Mutex<Option<TokenPair>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-load a pair, as if a previous process had persisted it.
    #[must_use]
    pub fn with_pair(pair: TokenPair) -> Self {
        Self {
            pair: Mutex::new(Some(pair)),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<Option<TokenPair>, RepositoryError> {
        Ok(lock(&self.pair).clone())
    }

    async fn save(&self, pair: &TokenPair) -> Result<(), RepositoryError> {
        *lock(&self.pair) = Some(pair.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), RepositoryError> {
        *lock(&self.pair) = None;
        Ok(())
    }
}

/// In-memory audit log.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    records: Mutex<Vec<SyncAttempt>>,
}

impl MemoryAuditLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn append(&self, attempt: &SyncAttempt) -> Result<(), RepositoryError> {
        lock(&self.records).push(attempt.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SyncAttempt>, RepositoryError> {
        let mut records = lock(&self.records).clone();
        records.reverse();
        Ok(records)
    }

    async fn update_status(
        &self,
        order_id: &str,
        status: SyncStatus,
        sale_id: Option<&str>,
        retry_count: u32,
    ) -> Result<bool, RepositoryError> {
        let mut records = lock(&self.records);
        let Some(attempt) = records
            .iter_mut()
            .rev()
            .find(|attempt| attempt.order_id == order_id)
        else {
            return Ok(false);
        };

        attempt.status = status;
        attempt.retry_count = retry_count;
        if let Some(sale_id) = sale_id {
            attempt.sale_id = Some(sale_id.to_string());
        }

        Ok(true)
    }
}

/// In-memory retry queue.
#[derive(Debug, Default)]
pub struct MemoryRetryQueue {
    records: Mutex<Vec<QueuedAttempt>>,
}

impl MemoryRetryQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RetryQueue for MemoryRetryQueue {
    async fn enqueue(&self, attempt: &SyncAttempt) -> Result<Uuid, RepositoryError> {
        let id = Uuid::new_v4();
        lock(&self.records).push(QueuedAttempt {
            id,
            attempt: attempt.clone(),
        });
        Ok(id)
    }

    async fn take(&self, max: i64) -> Result<Vec<QueuedAttempt>, RepositoryError> {
        let records = lock(&self.records);
        let max = usize::try_from(max).unwrap_or(0);
        Ok(records.iter().take(max).cloned().collect())
    }

    async fn find_by_order(&self, order_id: &str) -> Result<Option<QueuedAttempt>, RepositoryError> {
        Ok(lock(&self.records)
            .iter()
            .find(|queued| queued.attempt.order_id == order_id)
            .cloned())
    }

    async fn replace(&self, id: Uuid, attempt: &SyncAttempt) -> Result<(), RepositoryError> {
        let mut records = lock(&self.records);
        if let Some(queued) = records.iter_mut().find(|queued| queued.id == id) {
            queued.attempt = attempt.clone();
        }
        Ok(())
    }

    async fn remove(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let mut records = lock(&self.records);
        let before = records.len();
        records.retain(|queued| queued.id != id);
        Ok(records.len() < before)
    }

    async fn list(&self) -> Result<Vec<QueuedAttempt>, RepositoryError> {
        Ok(lock(&self.records).clone())
    }
}

//! Database operations for the durable retry queue.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use tillsync_core::SyncAttempt;

use super::{QueuedAttempt, RepositoryError, RetryQueue, to_record_text};

/// Postgres-backed retry queue, keyed by generated attempt id.
#[derive(Debug, Clone)]
pub struct PgRetryQueue {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct QueueRow {
    attempt_id: Uuid,
    record: String,
}

impl PgRetryQueue {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn delete_row(&self, id: Uuid) -> Result<(), RepositoryError> {
        sqlx::query(r"DELETE FROM retry_queue WHERE attempt_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Parse rows, deleting any that no longer deserialize.
    async fn decode_rows(&self, rows: Vec<QueueRow>) -> Result<Vec<QueuedAttempt>, RepositoryError> {
        let mut attempts = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_str::<SyncAttempt>(&row.record) {
                Ok(attempt) => attempts.push(QueuedAttempt {
                    id: row.attempt_id,
                    attempt,
                }),
                Err(e) => {
                    // A poison record must not block the sweep forever.
                    tracing::warn!(
                        attempt_id = %row.attempt_id,
                        error = %e,
                        "deleting malformed queue record"
                    );
                    self.delete_row(row.attempt_id).await?;
                }
            }
        }

        Ok(attempts)
    }
}

#[async_trait]
impl RetryQueue for PgRetryQueue {
    async fn enqueue(&self, attempt: &SyncAttempt) -> Result<Uuid, RepositoryError> {
        let id = Uuid::new_v4();
        let record = to_record_text(attempt)?;

        sqlx::query(
            r"
            INSERT INTO retry_queue (attempt_id, order_id, retry_count, record)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(id)
        .bind(&attempt.order_id)
        .bind(i64::from(attempt.retry_count))
        .bind(record)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn take(&self, max: i64) -> Result<Vec<QueuedAttempt>, RepositoryError> {
        let rows = sqlx::query_as::<_, QueueRow>(
            r"
            SELECT attempt_id, record FROM retry_queue
            ORDER BY enqueued_at ASC, attempt_id ASC
            LIMIT $1
            ",
        )
        .bind(max)
        .fetch_all(&self.pool)
        .await?;

        self.decode_rows(rows).await
    }

    async fn find_by_order(&self, order_id: &str) -> Result<Option<QueuedAttempt>, RepositoryError> {
        let rows = sqlx::query_as::<_, QueueRow>(
            r"
            SELECT attempt_id, record FROM retry_queue
            WHERE order_id = $1
            ORDER BY enqueued_at ASC, attempt_id ASC
            LIMIT 1
            ",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(self.decode_rows(rows).await?.into_iter().next())
    }

    async fn replace(&self, id: Uuid, attempt: &SyncAttempt) -> Result<(), RepositoryError> {
        let record = to_record_text(attempt)?;

        sqlx::query(
            r"UPDATE retry_queue SET record = $2, retry_count = $3 WHERE attempt_id = $1",
        )
        .bind(id)
        .bind(record)
        .bind(i64::from(attempt.retry_count))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query(r"DELETE FROM retry_queue WHERE attempt_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> Result<Vec<QueuedAttempt>, RepositoryError> {
        let rows = sqlx::query_as::<_, QueueRow>(
            r"
            SELECT attempt_id, record FROM retry_queue
            ORDER BY enqueued_at ASC, attempt_id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        self.decode_rows(rows).await
    }
}

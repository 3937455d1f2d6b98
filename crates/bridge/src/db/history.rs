//! Database operations for the order sync audit log.

use async_trait::async_trait;
use sqlx::PgPool;

use tillsync_core::{SyncAttempt, SyncStatus};

use super::{AuditLog, RepositoryError, to_record_text};

/// Postgres-backed append-only audit log.
#[derive(Debug, Clone)]
pub struct PgAuditLog {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    id: i64,
    record: String,
}

impl PgAuditLog {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn delete_row(&self, id: i64) -> Result<(), RepositoryError> {
        sqlx::query(r"DELETE FROM sync_history WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl AuditLog for PgAuditLog {
    async fn append(&self, attempt: &SyncAttempt) -> Result<(), RepositoryError> {
        let record = to_record_text(attempt)?;

        sqlx::query(r"INSERT INTO sync_history (order_id, record) VALUES ($1, $2)")
            .bind(&attempt.order_id)
            .bind(record)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn list(&self) -> Result<Vec<SyncAttempt>, RepositoryError> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r"SELECT id, record FROM sync_history ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut attempts = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_str::<SyncAttempt>(&row.record) {
                Ok(attempt) => attempts.push(attempt),
                Err(e) => {
                    // A poison record must not block reads forever.
                    tracing::warn!(row_id = row.id, error = %e, "deleting malformed history record");
                    self.delete_row(row.id).await?;
                }
            }
        }

        Ok(attempts)
    }

    async fn update_status(
        &self,
        order_id: &str,
        status: SyncStatus,
        sale_id: Option<&str>,
        retry_count: u32,
    ) -> Result<bool, RepositoryError> {
        let row = sqlx::query_as::<_, HistoryRow>(
            r"
            SELECT id, record FROM sync_history
            WHERE order_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            ",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(false);
        };

        let mut attempt = match serde_json::from_str::<SyncAttempt>(&row.record) {
            Ok(attempt) => attempt,
            Err(e) => {
                tracing::warn!(row_id = row.id, error = %e, "deleting malformed history record");
                self.delete_row(row.id).await?;
                return Ok(false);
            }
        };

        attempt.status = status;
        attempt.retry_count = retry_count;
        if let Some(sale_id) = sale_id {
            attempt.sale_id = Some(sale_id.to_string());
        }

        let record = to_record_text(&attempt)?;
        sqlx::query(r"UPDATE sync_history SET record = $2 WHERE id = $1")
            .bind(row.id)
            .bind(record)
            .execute(&self.pool)
            .await?;

        Ok(true)
    }
}

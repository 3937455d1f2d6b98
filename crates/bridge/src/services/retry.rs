//! Retry sweeps over the durable queue.
//!
//! The sweep has no in-process timer: an external scheduler hits the cron
//! route, which calls [`RetryService::drain`]. The sweep is idempotent but
//! not reentrant-safe; operators must not run overlapping sweeps.

use std::sync::Arc;

use serde::Serialize;
use tracing::instrument;

use tillsync_core::SyncStatus;

use crate::db::{AuditLog, QueuedAttempt, RepositoryError, RetryQueue};
use crate::lightspeed::LightspeedClient;

use super::sync::resolve_sale_lines;

/// Default batch size for one drain sweep.
pub const DEFAULT_DRAIN_BATCH: i64 = 10;

/// Counts from one drain sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    /// Attempts pulled from the queue.
    pub processed: usize,
    /// Submitted successfully and evicted.
    pub succeeded: usize,
    /// Failed again; re-queued with a bumped count.
    pub retried: usize,
    /// At the ceiling; evicted and marked permanently failed.
    pub evicted: usize,
}

/// Result of a manual resync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResyncOutcome {
    /// No queued attempt for the order id.
    NotFound,
    /// The attempt had reached the retry ceiling; evicted, not retried.
    Evicted,
    /// Re-submission succeeded; the attempt is evicted.
    Succeeded { sale_id: String },
    /// Re-submission failed again; the attempt stays queued.
    Failed { message: String, retry_count: u32 },
}

/// Outcome of re-processing one queued attempt.
enum AttemptOutcome {
    Evicted,
    Succeeded { sale_id: String },
    Retried { message: String, retry_count: u32 },
}

/// Queue sweep service.
#[derive(Clone)]
pub struct RetryService {
    audit: Arc<dyn AuditLog>,
    queue: Arc<dyn RetryQueue>,
    client: LightspeedClient,
}

impl RetryService {
    #[must_use]
    pub fn new(
        audit: Arc<dyn AuditLog>,
        queue: Arc<dyn RetryQueue>,
        client: LightspeedClient,
    ) -> Self {
        Self {
            audit,
            queue,
            client,
        }
    }

    /// Re-process up to `max` queued attempts, oldest first.
    ///
    /// Each attempt is handled independently; a per-attempt storage error
    /// is logged and the sweep moves on, so one bad record never stalls the
    /// batch.
    ///
    /// # Errors
    ///
    /// Returns an error only when the queue itself is unreachable.
    #[instrument(skip(self))]
    pub async fn drain(&self, max: i64) -> Result<SweepReport, RepositoryError> {
        let pending = self.queue.take(max).await?;
        let mut report = SweepReport {
            processed: pending.len(),
            ..SweepReport::default()
        };

        for queued in pending {
            let order_id = queued.attempt.order_id.clone();
            match self.handle_attempt(queued).await {
                Ok(AttemptOutcome::Succeeded { sale_id }) => {
                    tracing::info!(order_id, sale_id, "queued attempt synced");
                    report.succeeded += 1;
                }
                Ok(AttemptOutcome::Retried {
                    message,
                    retry_count,
                }) => {
                    tracing::warn!(order_id, retry_count, error = %message, "retry failed again");
                    report.retried += 1;
                }
                Ok(AttemptOutcome::Evicted) => {
                    tracing::warn!(order_id, "retry ceiling reached, attempt evicted");
                    report.evicted += 1;
                }
                Err(e) => {
                    tracing::error!(order_id, error = %e, "storage error while retrying attempt");
                }
            }
        }

        tracing::info!(
            processed = report.processed,
            succeeded = report.succeeded,
            retried = report.retried,
            evicted = report.evicted,
            "drain sweep complete"
        );
        Ok(report)
    }

    /// Manually re-process the queued attempt for one order.
    ///
    /// Looks the attempt up in the durable queue, never only in memory, so
    /// it works after a restart. Follows the same handling as the drain
    /// sweep, including the ceiling check.
    ///
    /// # Errors
    ///
    /// Returns an error when the queue or audit log is unreachable.
    #[instrument(skip(self))]
    pub async fn resync(&self, order_id: &str) -> Result<ResyncOutcome, RepositoryError> {
        let Some(queued) = self.queue.find_by_order(order_id).await? else {
            return Ok(ResyncOutcome::NotFound);
        };

        Ok(match self.handle_attempt(queued).await? {
            AttemptOutcome::Evicted => ResyncOutcome::Evicted,
            AttemptOutcome::Succeeded { sale_id } => ResyncOutcome::Succeeded { sale_id },
            AttemptOutcome::Retried {
                message,
                retry_count,
            } => ResyncOutcome::Failed {
                message,
                retry_count,
            },
        })
    }

    /// Re-process one queued attempt.
    async fn handle_attempt(
        &self,
        queued: QueuedAttempt,
    ) -> Result<AttemptOutcome, RepositoryError> {
        let QueuedAttempt { id, mut attempt } = queued;

        if attempt.is_exhausted() {
            self.queue.remove(id).await?;
            self.audit
                .update_status(
                    &attempt.order_id,
                    SyncStatus::PermanentFail,
                    None,
                    attempt.retry_count,
                )
                .await?;
            return Ok(AttemptOutcome::Evicted);
        }

        // A record queued before line mapping ran (skipped for a missing
        // credential) has products but no sale lines; resolve them now.
        let sale_lines = if attempt.sale_lines.is_empty() {
            resolve_sale_lines(&self.client, &attempt.products).await
        } else {
            attempt.sale_lines.clone()
        };

        let submission = if sale_lines.is_empty() {
            Err("no line items resolved".to_string())
        } else {
            match self
                .client
                .create_sale(&sale_lines, &attempt.customer_id)
                .await
            {
                Ok(sale) => Ok(sale),
                Err(e) => {
                    attempt.error_details = e.details();
                    Err(e.to_string())
                }
            }
        };

        match submission {
            Ok(sale) => {
                // Evict first under the attempt's own key; a crash between
                // the two writes leaves the audit row one sweep stale at
                // worst.
                self.queue.remove(id).await?;
                self.audit
                    .update_status(
                        &attempt.order_id,
                        SyncStatus::Success,
                        Some(&sale.sale_id),
                        attempt.retry_count,
                    )
                    .await?;
                Ok(AttemptOutcome::Succeeded {
                    sale_id: sale.sale_id,
                })
            }
            Err(message) => {
                attempt.retry_count += 1;
                attempt.status = SyncStatus::Retrying;
                attempt.error_message = Some(message.clone());
                attempt.sale_lines = sale_lines;
                self.queue.replace(id, &attempt).await?;
                self.audit
                    .update_status(
                        &attempt.order_id,
                        SyncStatus::Retrying,
                        None,
                        attempt.retry_count,
                    )
                    .await?;
                Ok(AttemptOutcome::Retried {
                    message,
                    retry_count: attempt.retry_count,
                })
            }
        }
    }
}

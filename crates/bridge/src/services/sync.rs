//! Webhook intake service.
//!
//! Per-delivery state machine: received → authenticated (in the route
//! layer) → deduplicated → {skipped | synced | failed}. The service never
//! sees an unauthenticated request.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::instrument;

use tillsync_core::{OrderedProduct, SaleLine, SyncAttempt, SyncStatus};

use crate::db::{AuditLog, RepositoryError, RetryQueue};
use crate::lightspeed::LightspeedClient;
use crate::shopify::OrderPayload;

/// Order identifiers already accepted in this process lifetime.
///
/// Deliberately not durable: a restart clears the set, so a redelivery that
/// straddles a restart can process the same order twice. The system is
/// at-least-once, not exactly-once.
#[derive(Debug, Default)]
pub struct ProcessedOrders {
    seen: Mutex<HashSet<String>>,
}

impl ProcessedOrders {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim an order id. Returns `false` when it was already claimed.
    ///
    /// The claim happens before processing, so a redelivery arriving while
    /// the first delivery is still in flight also dedupes.
    pub fn claim(&self, order_id: &str) -> bool {
        self.lock().insert(order_id.to_string())
    }

    #[must_use]
    pub fn contains(&self, order_id: &str) -> bool {
        self.lock().contains(order_id)
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// How one webhook delivery was classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The order id was already claimed this process lifetime; no-op.
    Duplicate,
    /// No credential was cached, or it could not be refreshed mid-flight;
    /// the order is recorded and queued.
    Skipped,
    /// No line resolved to a catalog item; recorded, not submitted.
    NothingToSync,
    /// Sale submitted and accepted.
    Synced { sale_id: String },
    /// Sale submission failed; the attempt is durably queued.
    SubmissionFailed { message: String },
}

/// Order intake service.
#[derive(Clone)]
pub struct SyncService {
    audit: Arc<dyn AuditLog>,
    queue: Arc<dyn RetryQueue>,
    client: LightspeedClient,
    processed: Arc<ProcessedOrders>,
}

impl SyncService {
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
            processed: Arc::new(ProcessedOrders::new()),
        }
    }

    /// Process one authenticated order webhook.
    ///
    /// Every non-duplicate path writes an audit record; failed and skipped
    /// paths also enqueue for retry. Lookup failures drop the offending
    /// line and the order proceeds with the resolved remainder.
    ///
    /// # Errors
    ///
    /// Returns an error only when the audit log or retry queue is
    /// unreachable; submission failures are classified, not raised.
    #[instrument(skip(self, payload), fields(order_id = %payload.order_id(), shop = %shop_domain))]
    pub async fn process_order(
        &self,
        shop_domain: &str,
        customer_id: &str,
        payload: &OrderPayload,
    ) -> Result<SyncOutcome, RepositoryError> {
        let order_id = payload.order_id();

        if !self.processed.claim(&order_id) {
            tracing::info!("duplicate delivery, ignoring");
            return Ok(SyncOutcome::Duplicate);
        }

        let products = payload.to_products();

        // Readiness gate: with no credential cached, no remote call was
        // attempted, so this is a skip rather than a failure.
        if !self.client.has_token().await {
            tracing::warn!("no POS credential cached, deferring order");
            let attempt = SyncAttempt::new(
                &order_id,
                shop_domain,
                customer_id,
                SyncStatus::Skipped,
                products,
            )
            .with_error("no access token available at delivery time", None);
            self.audit.append(&attempt).await?;
            self.queue.enqueue(&attempt).await?;
            return Ok(SyncOutcome::Skipped);
        }

        let sale_lines = resolve_sale_lines(&self.client, &products).await;
        if sale_lines.is_empty() {
            tracing::info!("no line resolved to a catalog item, nothing to submit");
            let attempt = SyncAttempt::new(
                &order_id,
                shop_domain,
                customer_id,
                SyncStatus::Skipped,
                products,
            )
            .with_error("no syncable line items", None);
            self.audit.append(&attempt).await?;
            return Ok(SyncOutcome::NothingToSync);
        }

        match self.client.create_sale(&sale_lines, customer_id).await {
            Ok(sale) => {
                tracing::info!(sale_id = %sale.sale_id, "order synced");
                let attempt = SyncAttempt::new(
                    &order_id,
                    shop_domain,
                    customer_id,
                    SyncStatus::Success,
                    products,
                )
                .with_sale_lines(sale_lines)
                .with_sale_id(&sale.sale_id);
                self.audit.append(&attempt).await?;
                Ok(SyncOutcome::Synced {
                    sale_id: sale.sale_id,
                })
            }
            Err(e) => {
                let message = e.to_string();
                // A refresh that fails mid-submission is a credential
                // problem, not a sale problem: the record stays skipped so
                // a sweep re-submits it once the credential is repaired.
                let (status, outcome) = if e.is_credential_failure() {
                    tracing::warn!(error = %message, "credential refresh failed, deferring order");
                    (SyncStatus::Skipped, SyncOutcome::Skipped)
                } else {
                    tracing::error!(error = %message, "sale submission failed, queueing for retry");
                    (
                        SyncStatus::Failed,
                        SyncOutcome::SubmissionFailed {
                            message: message.clone(),
                        },
                    )
                };
                let attempt =
                    SyncAttempt::new(&order_id, shop_domain, customer_id, status, products)
                        .with_sale_lines(sale_lines)
                        .with_error(&message, e.details());
                self.audit.append(&attempt).await?;
                self.queue.enqueue(&attempt).await?;
                Ok(outcome)
            }
        }
    }
}

/// Map order lines to catalog items, sequentially.
///
/// Lines without a SKU are skipped; a failed lookup drops that line with a
/// warning. The resulting lines preserve order.
pub(crate) async fn resolve_sale_lines(
    client: &LightspeedClient,
    products: &[OrderedProduct],
) -> Vec<SaleLine> {
    let mut lines = Vec::with_capacity(products.len());
    for product in products {
        if product.sku.is_empty() {
            tracing::debug!(title = ?product.title, "line has no SKU, skipping");
            continue;
        }
        match client.find_item_by_sku(&product.sku).await {
            Ok(item) => {
                let Some(item_id) = item.item_id else {
                    // Filtered out by the lookup already, but stay safe.
                    continue;
                };
                lines.push(SaleLine {
                    item_id,
                    quantity: product.quantity,
                    unit_price: product.price.unwrap_or_default(),
                });
            }
            Err(e) => {
                tracing::warn!(sku = %product.sku, error = %e, "dropping unresolvable line");
            }
        }
    }
    lines
}

//! Order webhook intake route.
//!
//! Authentication happens here, against the exact raw body bytes, before
//! anything is parsed: unknown store and bad signature are rejected with a
//! 401 and are never recorded or queued. Everything after authentication is
//! the intake service's job.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::services::SyncOutcome;
use crate::shopify::{HMAC_HEADER, OrderPayload, SHOP_DOMAIN_HEADER, verify_signature};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WebhookQuery {
    /// Manual-test signature bypass. Honored only when the deployment
    /// explicitly enables unverified webhooks; the flag alone never
    /// bypasses verification in production.
    #[serde(default)]
    manual_test: bool,
}

/// Acknowledgement body returned to the webhook sender. Deliberately
/// generic: failure detail lives in the audit log, not in this response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookAck {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ls_sale_id: Option<String>,
}

impl WebhookAck {
    const fn new(status: &'static str) -> Self {
        Self {
            status,
            ls_sale_id: None,
        }
    }
}

/// POST /webhooks/orders-create - order webhook intake.
#[instrument(skip(state, headers, body))]
pub async fn orders_create(
    State(state): State<AppState>,
    Query(query): Query<WebhookQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let shop_domain = headers
        .get(SHOP_DOMAIN_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("missing shop domain header".to_string()))?
        .to_string();

    // Unknown domain is rejected before the body is touched.
    let store = state
        .config()
        .stores
        .get(&shop_domain)
        .ok_or_else(|| AppError::Unauthorized("unknown store".to_string()))?;

    if query.manual_test && state.config().allow_unverified_webhooks {
        tracing::warn!(shop = %shop_domain, "signature verification bypassed (manual test)");
    } else {
        let signature = headers
            .get(HMAC_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("missing webhook signature".to_string()))?;

        if !verify_signature(store.webhook_secret.expose_secret(), &body, signature) {
            return Err(AppError::Unauthorized(
                "invalid webhook signature".to_string(),
            ));
        }
    }

    // A signed but unparseable body cannot be processed and must not be
    // retried by the sender.
    let payload: OrderPayload = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("invalid order payload: {e}")))?;

    let customer_id = store.customer_id.clone();
    let outcome = state
        .sync()
        .process_order(&shop_domain, &customer_id, &payload)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let response = match outcome {
        SyncOutcome::Duplicate => (StatusCode::OK, axum::Json(WebhookAck::new("duplicate"))),
        SyncOutcome::Skipped => (StatusCode::OK, axum::Json(WebhookAck::new("skipped"))),
        SyncOutcome::NothingToSync => (
            StatusCode::OK,
            axum::Json(WebhookAck::new("no-syncable-items")),
        ),
        SyncOutcome::Synced { sale_id } => (
            StatusCode::OK,
            axum::Json(WebhookAck {
                status: "synced",
                ls_sale_id: Some(sale_id),
            }),
        ),
        // The attempt is durably queued; the 500 tells the sender this
        // delivery did not complete without inviting a useful retry.
        SyncOutcome::SubmissionFailed { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            axum::Json(WebhookAck::new("failed")),
        ),
    };

    Ok(response.into_response())
}

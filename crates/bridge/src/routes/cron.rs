//! Retry-queue triggers: the scheduled drain sweep and manual resync.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::services::{ResyncOutcome, SweepReport, retry::DEFAULT_DRAIN_BATCH};
use crate::state::AppState;

/// GET /cron/retry-failed - run one drain sweep.
///
/// Returns the sweep counts; a 503 means the durable store was
/// unreachable and the scheduler should simply try again next tick.
#[instrument(skip(state))]
pub async fn retry_failed(State(state): State<AppState>) -> Result<Json<SweepReport>> {
    let report = state.retry().drain(DEFAULT_DRAIN_BATCH).await?;
    Ok(Json(report))
}

/// Operator-facing resync result. Unlike the webhook acknowledgement this
/// carries error detail; the caller is an operator, not the storefront.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResyncResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ls_sale_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_count: Option<u32>,
}

/// POST /resync/{order_id} - manually re-process one queued attempt.
#[instrument(skip(state))]
pub async fn resync(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Response> {
    let outcome = state.retry().resync(&order_id).await?;

    let response = match outcome {
        ResyncOutcome::NotFound => {
            return Err(AppError::NotFound(format!(
                "no queued attempt for order {order_id}"
            )));
        }
        ResyncOutcome::Succeeded { sale_id } => (
            StatusCode::OK,
            Json(ResyncResponse {
                status: "success",
                ls_sale_id: Some(sale_id),
                message: None,
                retry_count: None,
            }),
        ),
        ResyncOutcome::Evicted => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ResyncResponse {
                status: "permanent-fail",
                ls_sale_id: None,
                message: Some("retry ceiling reached; attempt evicted".to_string()),
                retry_count: None,
            }),
        ),
        ResyncOutcome::Failed {
            message,
            retry_count,
        } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ResyncResponse {
                status: "failed",
                ls_sale_id: None,
                message: Some(message),
                retry_count: Some(retry_count),
            }),
        ),
    };

    Ok(response.into_response())
}

//! Read-only operator views over the audit log and retry queue.
//!
//! These pages are the only place failure detail (error messages, remote
//! bodies, retry counts) is surfaced; webhook responses stay generic.

use askama::Template;
use askama_web::WebTemplate;
use axum::{Router, extract::State, routing::get};
use tracing::instrument;

use tillsync_core::SyncAttempt;

use crate::db::QueuedAttempt;
use crate::error::Result;
use crate::state::AppState;

/// Build the dashboard router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(overview))
        .route("/orders", get(orders))
        .route("/failed", get(failed))
}

/// One attempt row, formatted for rendering.
pub struct AttemptView {
    pub order_id: String,
    pub shop_domain: String,
    pub status: String,
    pub timestamp: String,
    pub sale_id: String,
    pub error_message: String,
    pub retry_count: u32,
}

impl From<&SyncAttempt> for AttemptView {
    fn from(attempt: &SyncAttempt) -> Self {
        Self {
            order_id: attempt.order_id.clone(),
            shop_domain: attempt.shop_domain.clone(),
            status: attempt.status.to_string(),
            timestamp: attempt.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            sale_id: attempt.sale_id.clone().unwrap_or_default(),
            error_message: attempt.error_message.clone().unwrap_or_default(),
            retry_count: attempt.retry_count,
        }
    }
}

/// Dashboard overview template.
#[derive(Template, WebTemplate)]
#[template(path = "dashboard.html")]
pub struct OverviewTemplate {
    pub token_present: bool,
    pub store_count: usize,
    pub history_count: usize,
    pub queue_depth: usize,
    pub recent: Vec<AttemptView>,
}

/// Order history template.
#[derive(Template, WebTemplate)]
#[template(path = "dashboard_orders.html")]
pub struct OrdersTemplate {
    pub orders: Vec<AttemptView>,
}

/// Retry queue template.
#[derive(Template, WebTemplate)]
#[template(path = "dashboard_failed.html")]
pub struct FailedTemplate {
    pub failed: Vec<AttemptView>,
}

/// How many history rows the overview shows.
const RECENT_LIMIT: usize = 10;

/// GET /dashboard - connection status and recent activity.
#[instrument(skip(state))]
pub async fn overview(State(state): State<AppState>) -> Result<OverviewTemplate> {
    let history = state.audit().list().await?;
    let queued = state.queue().list().await?;

    Ok(OverviewTemplate {
        token_present: state.tokens().has_token().await,
        store_count: state.config().stores.len(),
        history_count: history.len(),
        queue_depth: queued.len(),
        recent: history.iter().take(RECENT_LIMIT).map(AttemptView::from).collect(),
    })
}

/// GET /dashboard/orders - full order history, newest first.
#[instrument(skip(state))]
pub async fn orders(State(state): State<AppState>) -> Result<OrdersTemplate> {
    let history = state.audit().list().await?;
    Ok(OrdersTemplate {
        orders: history.iter().map(AttemptView::from).collect(),
    })
}

/// GET /dashboard/failed - current retry queue contents, oldest first.
#[instrument(skip(state))]
pub async fn failed(State(state): State<AppState>) -> Result<FailedTemplate> {
    let queued = state.queue().list().await?;
    Ok(FailedTemplate {
        failed: queued
            .iter()
            .map(|QueuedAttempt { attempt, .. }| AttemptView::from(attempt))
            .collect(),
    })
}

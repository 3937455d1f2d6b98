//! HTTP route handlers for the bridge.
//!
//! # Route Structure
//!
//! ```text
//! POST /webhooks/orders-create - Shopify order webhook intake
//!
//! # OAuth / credentials
//! GET  /auth                   - Redirect to the Lightspeed consent page
//! GET  /callback               - Authorization-code exchange
//! GET  /refresh-token          - Force a refresh if no token is cached
//!
//! # Retry queue
//! GET  /cron/retry-failed      - Drain sweep (hit by an external scheduler)
//! POST /resync/{order_id}      - Manual resync of one queued attempt
//!
//! # Operator views
//! GET  /dashboard              - Connection status and recent activity
//! GET  /dashboard/orders       - Full order history
//! GET  /dashboard/failed       - Retry queue contents
//!
//! # Health
//! GET  /health                 - Liveness (always 200)
//! GET  /health/ready           - Readiness (503 until the pool answers)
//! ```

pub mod auth;
pub mod cron;
pub mod dashboard;
pub mod health;
pub mod webhooks;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create the full bridge router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route("/webhooks/orders-create", post(webhooks::orders_create))
        .route("/auth", get(auth::authorize))
        .route("/callback", get(auth::callback))
        .route("/refresh-token", get(auth::refresh_token))
        .route("/cron/retry-failed", get(cron::retry_failed))
        .route("/resync/{order_id}", post(cron::resync))
        .nest("/dashboard", dashboard::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

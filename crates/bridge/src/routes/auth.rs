//! Lightspeed OAuth routes and the manual refresh trigger.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Scope requested from the consent page.
const OAUTH_SCOPE: &str = "employee:all";

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
}

/// GET /auth - redirect to the Lightspeed consent page.
#[instrument(skip(state))]
pub async fn authorize(State(state): State<AppState>) -> Result<Response> {
    let config = state.config();
    let mut url = url::Url::parse(&config.lightspeed.authorize_url)
        .map_err(|e| AppError::Internal(format!("invalid authorize URL: {e}")))?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &config.lightspeed.client_id)
        .append_pair("redirect_uri", &config.oauth_redirect_uri())
        .append_pair("scope", OAUTH_SCOPE);

    tracing::info!("redirecting to Lightspeed consent page");
    Ok(Redirect::to(url.as_str()).into_response())
}

/// GET /callback - exchange the authorization code for a token pair.
#[instrument(skip(state, params))]
pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Response> {
    let code = params
        .code
        .ok_or_else(|| AppError::BadRequest("missing authorization code".to_string()))?;

    state.tokens().exchange_code(&code).await?;

    tracing::info!("Lightspeed connected");
    Ok(Redirect::to("/dashboard").into_response())
}

/// GET /refresh-token - force a refresh when no token is cached.
#[instrument(skip(state))]
pub async fn refresh_token(State(state): State<AppState>) -> Result<&'static str> {
    if state.tokens().has_token().await {
        return Ok("token already cached");
    }

    state.tokens().refresh().await?;
    Ok("token refreshed")
}

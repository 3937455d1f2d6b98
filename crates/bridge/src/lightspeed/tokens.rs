//! OAuth token lifecycle for the Lightspeed API.
//!
//! Owns the in-memory credential cache and its durable mirror. Exchange and
//! refresh both write the full pair, so a concurrent refresh race converges
//! on a valid credential; the race is wasteful but benign and is deliberately
//! not serialized with a lock.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::instrument;

use tillsync_core::TokenPair;

use crate::config::LightspeedConfig;
use crate::db::CredentialStore;

use super::LightspeedError;

/// Token lifecycle manager.
///
/// `has_token` is a presence check only; token invalidity is discovered
/// reactively through a 401 from the REST client and repaired with
/// [`TokenManager::refresh`].
#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<TokenManagerInner>,
}

struct TokenManagerInner {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: SecretString,
    redirect_uri: String,
    store: Arc<dyn CredentialStore>,
    cached: RwLock<Option<TokenPair>>,
}

/// Response from the OAuth token endpoint. A rotated refresh token is
/// optional server-side behavior.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl TokenManager {
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        config: &LightspeedConfig,
        redirect_uri: String,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            inner: Arc::new(TokenManagerInner {
                http,
                token_url: config.token_url.clone(),
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
                redirect_uri,
                store,
                cached: RwLock::new(None),
            }),
        }
    }

    /// Load the last-persisted pair into the in-memory cache.
    ///
    /// Called once at process start; a malformed persisted record has
    /// already been deleted by the store's load path.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential store is unreachable.
    pub async fn load_persisted(&self) -> Result<(), LightspeedError> {
        let pair = self.inner.store.load().await?;
        if let Some(pair) = pair {
            tracing::info!("loaded persisted POS credential");
            *self.inner.cached.write().await = Some(pair);
        }
        Ok(())
    }

    /// Exchange an authorization code for a token pair.
    ///
    /// On success the full pair is cached in memory and persisted durably;
    /// the access token is returned.
    ///
    /// # Errors
    ///
    /// Returns [`LightspeedError::Exchange`] when the token endpoint rejects
    /// the grant, or a transport/storage error.
    #[instrument(skip(self, code))]
    pub async fn exchange_code(&self, code: &str) -> Result<String, LightspeedError> {
        let response = self
            .inner
            .http
            .post(&self.inner.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("client_id", self.inner.client_id.as_str()),
                ("client_secret", self.inner.client_secret.expose_secret()),
                ("code", code),
                ("redirect_uri", self.inner.redirect_uri.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LightspeedError::Exchange {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response.json().await?;
        let pair = TokenPair::new(token.access_token, token.refresh_token.unwrap_or_default());
        self.install(pair.clone()).await?;

        tracing::info!("authorization code exchanged");
        Ok(pair.access_token)
    }

    /// Refresh the access token.
    ///
    /// If nothing is cached in memory, the last-persisted pair is loaded
    /// first. The refresh token is replaced only when the response rotates
    /// it; otherwise the old one is retained.
    ///
    /// # Errors
    ///
    /// Returns [`LightspeedError::NoRefreshToken`] when no refresh token is
    /// cached or persisted, [`LightspeedError::Exchange`] when the endpoint
    /// rejects the grant, or a transport/storage error.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<String, LightspeedError> {
        let cached = self.inner.cached.read().await.clone();
        let pair = match cached {
            Some(pair) => Some(pair),
            None => self.inner.store.load().await?,
        };

        let refresh_token = pair
            .map(|pair| pair.refresh_token)
            .filter(|token| !token.is_empty())
            .ok_or(LightspeedError::NoRefreshToken)?;

        let response = self
            .inner
            .http
            .post(&self.inner.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.inner.client_id.as_str()),
                ("client_secret", self.inner.client_secret.expose_secret()),
                ("refresh_token", refresh_token.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LightspeedError::Exchange {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response.json().await?;
        let pair = TokenPair::new(
            token.access_token,
            token.refresh_token.unwrap_or(refresh_token),
        );
        self.install(pair.clone()).await?;

        tracing::info!("access token refreshed");
        Ok(pair.access_token)
    }

    /// Whether an access token is currently cached in memory.
    pub async fn has_token(&self) -> bool {
        self.inner
            .cached
            .read()
            .await
            .as_ref()
            .is_some_and(|pair| !pair.access_token.is_empty())
    }

    /// The cached access token, for the `Authorization: Bearer` header.
    ///
    /// # Errors
    ///
    /// Returns [`LightspeedError::MissingToken`] when nothing is cached.
    pub async fn bearer_token(&self) -> Result<String, LightspeedError> {
        self.inner
            .cached
            .read()
            .await
            .as_ref()
            .map(|pair| pair.access_token.clone())
            .filter(|token| !token.is_empty())
            .ok_or(LightspeedError::MissingToken)
    }

    /// Cache the pair in memory and mirror it durably.
    async fn install(&self, pair: TokenPair) -> Result<(), LightspeedError> {
        self.inner.store.save(&pair).await?;
        *self.inner.cached.write().await = Some(pair);
        Ok(())
    }
}

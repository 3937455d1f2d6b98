//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use crate::config::BridgeConfig;
use crate::db::{
    AuditLog, CredentialStore, PgAuditLog, PgCredentialStore, PgRetryQueue, RetryQueue,
};
use crate::lightspeed::{LightspeedClient, TokenManager};
use crate::services::{RetryService, SyncService};

/// Explicit per-call timeout for all outbound HTTP.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`; exposes the config, storage handles, and
/// services through accessor methods.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: BridgeConfig,
    pool: Option<PgPool>,
    audit: Arc<dyn AuditLog>,
    queue: Arc<dyn RetryQueue>,
    tokens: TokenManager,
    lightspeed: LightspeedClient,
    sync: SyncService,
    retry: RetryService,
}

impl AppState {
    /// Production state: Postgres-backed stores over the given pool.
    #[must_use]
    pub fn new(config: BridgeConfig, pool: PgPool) -> Self {
        let credentials = Arc::new(PgCredentialStore::new(pool.clone()));
        let audit = Arc::new(PgAuditLog::new(pool.clone()));
        let queue = Arc::new(PgRetryQueue::new(pool.clone()));
        Self::build(config, Some(pool), credentials, audit, queue)
    }

    /// State over caller-supplied stores; used by the test suites and for
    /// running without a database. The readiness probe reports ready when
    /// no pool is configured.
    #[must_use]
    pub fn with_stores(
        config: BridgeConfig,
        credentials: Arc<dyn CredentialStore>,
        audit: Arc<dyn AuditLog>,
        queue: Arc<dyn RetryQueue>,
    ) -> Self {
        Self::build(config, None, credentials, audit, queue)
    }

    fn build(
        config: BridgeConfig,
        pool: Option<PgPool>,
        credentials: Arc<dyn CredentialStore>,
        audit: Arc<dyn AuditLog>,
        queue: Arc<dyn RetryQueue>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        let tokens = TokenManager::new(
            http.clone(),
            &config.lightspeed,
            config.oauth_redirect_uri(),
            credentials,
        );
        let lightspeed = LightspeedClient::new(
            http,
            tokens.clone(),
            config.lightspeed.clone(),
            config.pricing,
        );
        let sync = SyncService::new(audit.clone(), queue.clone(), lightspeed.clone());
        let retry = RetryService::new(audit.clone(), queue.clone(), lightspeed.clone());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                audit,
                queue,
                tokens,
                lightspeed,
                sync,
                retry,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }

    #[must_use]
    pub fn audit(&self) -> &Arc<dyn AuditLog> {
        &self.inner.audit
    }

    #[must_use]
    pub fn queue(&self) -> &Arc<dyn RetryQueue> {
        &self.inner.queue
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenManager {
        &self.inner.tokens
    }

    #[must_use]
    pub fn lightspeed(&self) -> &LightspeedClient {
        &self.inner.lightspeed
    }

    #[must_use]
    pub fn sync(&self) -> &SyncService {
        &self.inner.sync
    }

    #[must_use]
    pub fn retry(&self) -> &RetryService {
        &self.inner.retry
    }
}

//! Test harness for the bridge.
//!
//! Builds a full [`AppState`] over the in-memory stores with every remote
//! URL pointed at a caller-supplied mock server, so the test suites drive
//! the real router, services, and REST client end to end without Postgres
//! or the real POS API.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::Request;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use http_body_util::BodyExt;
use secrecy::SecretString;

use tillsync_bridge::config::{
    BridgeConfig, LightspeedConfig, PricingConfig, StoreConfig, StoreDirectory,
};
use tillsync_bridge::db::{
    CredentialStore, MemoryAuditLog, MemoryCredentialStore, MemoryRetryQueue,
};
use tillsync_bridge::routes;
use tillsync_bridge::shopify::{HMAC_HEADER, SHOP_DOMAIN_HEADER};
use tillsync_bridge::state::AppState;
use tillsync_core::TokenPair;

/// Account scope baked into the test configuration.
pub const ACCOUNT_ID: &str = "12345";
/// The one store registered in the test configuration.
pub const STORE_DOMAIN: &str = "store-a.example";
/// Webhook secret for [`STORE_DOMAIN`].
pub const WEBHOOK_SECRET: &str = "s3cr3t";
/// POS customer the test store's orders are billed to.
pub const CUSTOMER_ID: &str = "42";

/// A bridge configuration whose remote endpoints all live on `api_base`
/// (the mock server). Pricing uses the default 20% margin and 7% tax.
#[must_use]
pub fn bridge_config(api_base: &str) -> BridgeConfig {
    BridgeConfig {
        database_url: SecretString::from("postgres://unused.invalid/test"),
        host: "127.0.0.1".parse().expect("loopback address"),
        port: 0,
        base_url: "http://localhost:3000".to_string(),
        stores: StoreDirectory::from_entries([(
            STORE_DOMAIN.to_string(),
            StoreConfig {
                webhook_secret: SecretString::from(WEBHOOK_SECRET),
                customer_id: CUSTOMER_ID.to_string(),
            },
        )]),
        lightspeed: LightspeedConfig {
            client_id: "test-client".to_string(),
            client_secret: SecretString::from("test-client-secret"),
            account_id: ACCOUNT_ID.to_string(),
            employee_id: "1".to_string(),
            register_id: "1".to_string(),
            shop_id: "1".to_string(),
            payment_type_id: "1".to_string(),
            api_base: api_base.to_string(),
            token_url: format!("{api_base}/auth/oauth/token"),
            authorize_url: format!("{api_base}/auth/oauth/authorize"),
        },
        pricing: PricingConfig::default(),
        allow_unverified_webhooks: false,
        sentry_dsn: None,
    }
}

/// A fully wired application over in-memory stores, with direct handles to
/// those stores for seeding and assertions.
pub struct TestApp {
    pub state: AppState,
    pub credentials: Arc<MemoryCredentialStore>,
    pub audit: Arc<MemoryAuditLog>,
    pub queue: Arc<MemoryRetryQueue>,
}

impl TestApp {
    #[must_use]
    pub fn new(config: BridgeConfig) -> Self {
        let credentials = Arc::new(MemoryCredentialStore::new());
        let audit = Arc::new(MemoryAuditLog::new());
        let queue = Arc::new(MemoryRetryQueue::new());
        let state = AppState::with_stores(
            config,
            credentials.clone(),
            audit.clone(),
            queue.clone(),
        );
        Self {
            state,
            credentials,
            audit,
            queue,
        }
    }

    /// A fresh router over the shared state. Each `oneshot` consumes a
    /// router, so tests call this per request.
    #[must_use]
    pub fn router(&self) -> Router {
        routes::router(self.state.clone())
    }

    /// Persist a token pair and load it into the manager's cache, as if the
    /// OAuth round-trip had already happened.
    pub async fn seed_token(&self, access_token: &str, refresh_token: &str) {
        self.credentials
            .save(&TokenPair::new(access_token, refresh_token))
            .await
            .expect("memory store never fails");
        self.state
            .tokens()
            .load_persisted()
            .await
            .expect("memory store never fails");
    }
}

/// Sign a body the way the storefront does: base64 HMAC-SHA256 over the
/// raw bytes.
#[must_use]
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac =
        Hmac::<sha2::Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key");
    mac.update(body);
    BASE64.encode(mac.finalize().into_bytes())
}

/// A correctly signed webhook request from the registered test store.
#[must_use]
pub fn webhook_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhooks/orders-create")
        .header("content-type", "application/json")
        .header(SHOP_DOMAIN_HEADER, STORE_DOMAIN)
        .header(HMAC_HEADER, sign(WEBHOOK_SECRET, body.as_bytes()))
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collects")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body is JSON")
}

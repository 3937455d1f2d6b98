//! Bridge configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BRIDGE_DATABASE_URL` - `PostgreSQL` connection string
//! - `SHOPIFY_STORES` - JSON object mapping shop domains to webhook secret
//!   and POS customer id, e.g.
//!   `{"store-a.example": {"webhookSecret": "...", "customerId": "42"}}`
//! - `LIGHTSPEED_CLIENT_ID` - OAuth client ID
//! - `LIGHTSPEED_CLIENT_SECRET` - OAuth client secret
//! - `LIGHTSPEED_ACCOUNT_ID` - API account scope for catalog/sale calls
//! - `LIGHTSPEED_EMPLOYEE_ID` - Employee recorded on submitted sales
//! - `LIGHTSPEED_REGISTER_ID` - Register recorded on submitted sales
//! - `LIGHTSPEED_SHOP_ID` - Shop recorded on submitted sales
//!
//! ## Optional
//! - `BRIDGE_HOST` - Bind address (default: 0.0.0.0)
//! - `BRIDGE_PORT` - Listen port (default: 3000)
//! - `BRIDGE_BASE_URL` - Public URL, used to derive the OAuth redirect URI
//!   (default: <http://localhost:3000>)
//! - `LIGHTSPEED_PAYMENT_TYPE_ID` - Payment type on submitted sales (default: 1)
//! - `LIGHTSPEED_API_BASE` - REST API base (default: <https://api.lightspeedapp.com>)
//! - `LIGHTSPEED_TOKEN_URL` - OAuth token endpoint
//! - `LIGHTSPEED_AUTHORIZE_URL` - OAuth consent endpoint
//! - `SYNC_MARGIN_RATE` - Fulfillment margin rate (default: 0.20)
//! - `SYNC_TAX_RATE` - Flat sale tax rate (default: 0.07)
//! - `SHOPIFY_ALLOW_UNVERIFIED` - Allow the manual-test signature bypass
//!   (default: false; never enable in production)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

const MIN_SECRET_LENGTH: usize = 8;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example-secret",
    "put-your",
    "add-your",
    "insert",
    "todo",
    "fixme",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Bridge application configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for this service
    pub base_url: String,
    /// Storefronts allowed to deliver webhooks
    pub stores: StoreDirectory,
    /// Lightspeed API configuration
    pub lightspeed: LightspeedConfig,
    /// Fulfillment pricing rates
    pub pricing: PricingConfig,
    /// Allow the `manual_test` query flag to skip signature verification
    pub allow_unverified_webhooks: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// Lightspeed Retail API configuration.
///
/// Implements `Debug` manually to redact the client secret.
#[derive(Clone)]
pub struct LightspeedConfig {
    /// OAuth client ID
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: SecretString,
    /// Account scope for catalog/sale endpoints
    pub account_id: String,
    /// Employee recorded on submitted sales
    pub employee_id: String,
    /// Register recorded on submitted sales
    pub register_id: String,
    /// Shop recorded on submitted sales
    pub shop_id: String,
    /// Payment type for the single full-total payment record
    pub payment_type_id: String,
    /// REST API base URL
    pub api_base: String,
    /// OAuth token endpoint
    pub token_url: String,
    /// OAuth consent endpoint
    pub authorize_url: String,
}

impl std::fmt::Debug for LightspeedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LightspeedConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("account_id", &self.account_id)
            .field("employee_id", &self.employee_id)
            .field("register_id", &self.register_id)
            .field("shop_id", &self.shop_id)
            .field("payment_type_id", &self.payment_type_id)
            .field("api_base", &self.api_base)
            .field("token_url", &self.token_url)
            .field("authorize_url", &self.authorize_url)
            .finish()
    }
}

/// Fulfillment pricing rates.
#[derive(Debug, Clone, Copy)]
pub struct PricingConfig {
    /// Margin rate `m`: item cost is grossed up to `cost / (1 - m)`
    pub margin_rate: Decimal,
    /// Flat tax rate applied to the sale subtotal
    pub tax_rate: Decimal,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            margin_rate: Decimal::new(20, 2),
            tax_rate: Decimal::new(7, 2),
        }
    }
}

/// Per-store webhook secret and POS customer mapping.
///
/// Implements `Debug` manually to redact the webhook secret.
#[derive(Clone)]
pub struct StoreConfig {
    /// Shared secret for webhook HMAC verification
    pub webhook_secret: SecretString,
    /// POS customer the store's orders are billed to
    pub customer_id: String,
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("webhook_secret", &"[REDACTED]")
            .field("customer_id", &self.customer_id)
            .finish()
    }
}

/// Directory of storefronts allowed to deliver webhooks, keyed by shop
/// domain (lowercase).
///
/// Loaded and validated once at startup; request handling only ever does a
/// lookup here, never an environment scan.
#[derive(Debug, Clone, Default)]
pub struct StoreDirectory {
    stores: HashMap<String, StoreConfig>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStoreConfig {
    webhook_secret: String,
    customer_id: String,
}

impl StoreDirectory {
    /// Parse and validate the `SHOPIFY_STORES` JSON object.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the JSON is malformed, the directory is
    /// empty, a customer id is blank, or a webhook secret fails validation.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let raw: HashMap<String, RawStoreConfig> = serde_json::from_str(json)
            .map_err(|e| ConfigError::InvalidEnvVar("SHOPIFY_STORES".to_string(), e.to_string()))?;

        if raw.is_empty() {
            return Err(ConfigError::InvalidEnvVar(
                "SHOPIFY_STORES".to_string(),
                "no stores configured".to_string(),
            ));
        }

        let mut stores = HashMap::with_capacity(raw.len());
        for (domain, config) in raw {
            let var_name = format!("SHOPIFY_STORES[{domain}].webhookSecret");
            validate_secret_strength(&config.webhook_secret, &var_name)?;
            if config.customer_id.trim().is_empty() {
                return Err(ConfigError::InvalidEnvVar(
                    format!("SHOPIFY_STORES[{domain}].customerId"),
                    "must not be empty".to_string(),
                ));
            }
            stores.insert(
                domain.to_lowercase(),
                StoreConfig {
                    webhook_secret: SecretString::from(config.webhook_secret),
                    customer_id: config.customer_id,
                },
            );
        }

        Ok(Self { stores })
    }

    /// Build a directory from already-validated entries.
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = (String, StoreConfig)>) -> Self {
        Self {
            stores: entries
                .into_iter()
                .map(|(domain, config)| (domain.to_lowercase(), config))
                .collect(),
        }
    }

    /// Look up a store by shop domain (case-insensitive).
    #[must_use]
    pub fn get(&self, shop_domain: &str) -> Option<&StoreConfig> {
        self.stores.get(&shop_domain.to_lowercase())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stores.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

impl BridgeConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, minimum length).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("BRIDGE_DATABASE_URL")?;
        let host = get_env_or_default("BRIDGE_HOST", "0.0.0.0")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("BRIDGE_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("BRIDGE_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("BRIDGE_PORT".to_string(), e.to_string()))?;
        let base_url = get_env_or_default("BRIDGE_BASE_URL", "http://localhost:3000")
            .trim_end_matches('/')
            .to_string();

        let stores = StoreDirectory::from_json(&get_required_env("SHOPIFY_STORES")?)?;
        let lightspeed = LightspeedConfig::from_env()?;
        let pricing = PricingConfig::from_env()?;
        let allow_unverified_webhooks = get_env_or_default("SHOPIFY_ALLOW_UNVERIFIED", "false")
            .parse::<bool>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("SHOPIFY_ALLOW_UNVERIFIED".to_string(), e.to_string())
            })?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            stores,
            lightspeed,
            pricing,
            allow_unverified_webhooks,
            sentry_dsn,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// The redirect URI registered with the OAuth client.
    #[must_use]
    pub fn oauth_redirect_uri(&self) -> String {
        format!("{}/callback", self.base_url)
    }
}

impl LightspeedConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            client_id: get_required_env("LIGHTSPEED_CLIENT_ID")?,
            client_secret: get_validated_secret("LIGHTSPEED_CLIENT_SECRET")?,
            account_id: get_required_env("LIGHTSPEED_ACCOUNT_ID")?,
            employee_id: get_required_env("LIGHTSPEED_EMPLOYEE_ID")?,
            register_id: get_required_env("LIGHTSPEED_REGISTER_ID")?,
            shop_id: get_required_env("LIGHTSPEED_SHOP_ID")?,
            payment_type_id: get_env_or_default("LIGHTSPEED_PAYMENT_TYPE_ID", "1"),
            api_base: get_env_or_default("LIGHTSPEED_API_BASE", "https://api.lightspeedapp.com"),
            token_url: get_env_or_default(
                "LIGHTSPEED_TOKEN_URL",
                "https://cloud.lightspeedapp.com/auth/oauth/token",
            ),
            authorize_url: get_env_or_default(
                "LIGHTSPEED_AUTHORIZE_URL",
                "https://cloud.lightspeedapp.com/auth/oauth/authorize",
            ),
        })
    }
}

impl PricingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let margin_rate = get_env_or_default("SYNC_MARGIN_RATE", "0.20")
            .parse::<Decimal>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("SYNC_MARGIN_RATE".to_string(), e.to_string())
            })?;
        if margin_rate < Decimal::ZERO || margin_rate >= Decimal::ONE {
            return Err(ConfigError::InvalidEnvVar(
                "SYNC_MARGIN_RATE".to_string(),
                format!("must be in [0, 1), got {margin_rate}"),
            ));
        }

        let tax_rate = get_env_or_default("SYNC_TAX_RATE", "0.07")
            .parse::<Decimal>()
            .map_err(|e| ConfigError::InvalidEnvVar("SYNC_TAX_RATE".to_string(), e.to_string()))?;
        if tax_rate < Decimal::ZERO {
            return Err(ConfigError::InvalidEnvVar(
                "SYNC_TAX_RATE".to_string(),
                format!("must be non-negative, got {tax_rate}"),
            ));
        }

        Ok(Self {
            margin_rate,
            tax_rate,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Validate that a secret is not a placeholder and is not trivially short.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    if secret.len() < MIN_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {MIN_SECRET_LENGTH} characters (got {})",
                secret.len()
            ),
        ));
    }

    let lower = secret.to_lowercase();
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

//! Lightspeed Retail API client.
//!
//! Outbound side of the bridge: OAuth token lifecycle ([`tokens`]) and the
//! catalog/sale REST client ([`client`]). Both share one [`reqwest::Client`]
//! with an explicit timeout, and both recover from a stale access token with
//! a single bounded refresh-and-retry.

pub mod client;
pub mod tokens;

use thiserror::Error;

use crate::db::RepositoryError;

pub use client::{Item, LightspeedClient, Sale};
pub use tokens::TokenManager;

/// Errors from the Lightspeed token lifecycle and REST client.
#[derive(Debug, Error)]
pub enum LightspeedError {
    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The authorization-code exchange was rejected.
    #[error("token exchange failed: HTTP {status}: {body}")]
    Exchange { status: u16, body: String },

    /// A refresh was requested but no refresh token is cached or persisted.
    #[error("no refresh token available")]
    NoRefreshToken,

    /// An authenticated call was requested but no access token is cached.
    #[error("no access token cached")]
    MissingToken,

    /// The POS rejected the access token even after the bounded
    /// refresh-and-retry.
    #[error("authorization rejected by POS")]
    Unauthorized,

    /// No catalog item matches the SKU, or the match has no identifier.
    #[error("no catalog item matches SKU {0:?}")]
    ItemNotFound(String),

    /// A sale was submitted without a customer id.
    #[error("sale submission requires a customer id")]
    MissingCustomer,

    /// Any other non-2xx from the POS, with the remote body attached for
    /// diagnostics.
    #[error("POS API error: HTTP {status}: {body}")]
    Api { status: u16, body: String },

    /// Credential persistence failed.
    #[error("credential storage error: {0}")]
    Storage(#[from] RepositoryError),
}

impl LightspeedError {
    /// Whether the failure happened in the credential lifecycle (no token,
    /// no refresh token, or a rejected token grant) rather than in the
    /// operation itself. Intake records these as skipped, not failed: the
    /// sale was never meaningfully attempted.
    #[must_use]
    pub const fn is_credential_failure(&self) -> bool {
        matches!(
            self,
            Self::MissingToken | Self::NoRefreshToken | Self::Exchange { .. }
        )
    }

    /// Remote error context for audit-log records, when the variant carries
    /// any. Bodies that parse as JSON are attached structurally.
    #[must_use]
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Api { status, body } | Self::Exchange { status, body } => {
                let body = serde_json::from_str::<serde_json::Value>(body)
                    .unwrap_or_else(|_| serde_json::Value::String(body.clone()));
                Some(serde_json::json!({ "httpCode": status, "body": body }))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_details_attach_json_bodies_structurally() {
        let err = LightspeedError::Api {
            status: 422,
            body: r#"{"message":"invalid sale"}"#.to_string(),
        };
        let details = err.details().unwrap();
        assert_eq!(details["httpCode"], 422);
        assert_eq!(details["body"]["message"], "invalid sale");
    }

    #[test]
    fn api_details_keep_non_json_bodies_as_text() {
        let err = LightspeedError::Api {
            status: 502,
            body: "<html>bad gateway</html>".to_string(),
        };
        let details = err.details().unwrap();
        assert_eq!(details["body"], "<html>bad gateway</html>");
    }

    #[test]
    fn credential_lifecycle_failures_are_classified() {
        assert!(LightspeedError::MissingToken.is_credential_failure());
        assert!(LightspeedError::NoRefreshToken.is_credential_failure());
        assert!(
            LightspeedError::Exchange {
                status: 400,
                body: "invalid_grant".to_string(),
            }
            .is_credential_failure()
        );
        // A 401 that survives the bounded retry reached the POS; so did any
        // other API error. Neither is a credential-lifecycle failure.
        assert!(!LightspeedError::Unauthorized.is_credential_failure());
        assert!(
            !LightspeedError::Api {
                status: 500,
                body: String::new(),
            }
            .is_credential_failure()
        );
    }

    #[test]
    fn credential_errors_carry_no_remote_details() {
        assert!(LightspeedError::NoRefreshToken.details().is_none());
        assert!(LightspeedError::MissingToken.details().is_none());
        assert!(LightspeedError::Unauthorized.details().is_none());
    }
}

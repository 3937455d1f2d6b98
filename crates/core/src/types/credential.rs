//! POS credential pair.

use serde::{Deserialize, Serialize};

/// The current OAuth access/refresh token pair.
///
/// There is exactly one live pair at a time: it is cached in memory by the
/// token manager and mirrored to durable storage under a fixed key so it
/// survives a restart. Both fields are bearer secrets, so `Debug` redacts
/// them.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_never_prints_token_material() {
        let pair = TokenPair::new("atk-secret-value", "rtk-secret-value");
        let debug = format!("{pair:?}");
        assert!(!debug.contains("atk-secret-value"));
        assert!(!debug.contains("rtk-secret-value"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let pair = TokenPair::new("atk", "rtk");
        let value = serde_json::to_value(&pair).unwrap();
        assert_eq!(value["accessToken"], "atk");
        assert_eq!(value["refreshToken"], "rtk");
    }

    #[test]
    fn round_trips() {
        let pair = TokenPair::new("atk", "rtk");
        let json = serde_json::to_string(&pair).unwrap();
        assert_eq!(serde_json::from_str::<TokenPair>(&json).unwrap(), pair);
    }
}

//! Webhook signature verification.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Header identifying which storefront sent the webhook.
pub const SHOP_DOMAIN_HEADER: &str = "x-shopify-shop-domain";

/// Header carrying the base64-encoded HMAC-SHA256 signature of the raw
/// request body.
pub const HMAC_HEADER: &str = "x-shopify-hmac-sha256";

type HmacSha256 = Hmac<Sha256>;

/// Verify a webhook signature against the exact raw request bytes.
///
/// The comparison is constant-time; malformed signatures simply fail
/// verification.
#[must_use]
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(provided) = BASE64.decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&provided).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sign a body the way the storefront does.
    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        BASE64.encode(mac.finalize().into_bytes())
    }

    #[test]
    fn accepts_a_valid_signature() {
        let body = br#"{"id":1001,"line_items":[]}"#;
        let signature = sign("s3cr3t", body);
        assert!(verify_signature("s3cr3t", body, &signature));
    }

    #[test]
    fn rejects_a_signature_from_the_wrong_secret() {
        let body = br#"{"id":1001}"#;
        let signature = sign("other-secret", body);
        assert!(!verify_signature("s3cr3t", body, &signature));
    }

    #[test]
    fn rejects_a_modified_body() {
        let signature = sign("s3cr3t", br#"{"id":1001}"#);
        assert!(!verify_signature("s3cr3t", br#"{"id":1002}"#, &signature));
    }

    #[test]
    fn rejects_garbage_signatures() {
        let body = br#"{"id":1001}"#;
        assert!(!verify_signature("s3cr3t", body, "not base64!!!"));
        assert!(!verify_signature("s3cr3t", body, ""));
    }

    #[test]
    fn tolerates_surrounding_whitespace_in_the_header_value() {
        let body = br#"{"id":1001}"#;
        let signature = format!(" {} ", sign("s3cr3t", body));
        assert!(verify_signature("s3cr3t", body, &signature));
    }
}

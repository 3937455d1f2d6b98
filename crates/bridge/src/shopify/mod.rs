//! Inbound Shopify wire format.
//!
//! Webhook authenticity checks and the order payload shapes the bridge
//! consumes. This module never calls Shopify; orders only ever flow in.

pub mod order;
pub mod webhook;

pub use order::{OrderLine, OrderPayload};
pub use webhook::{HMAC_HEADER, SHOP_DOMAIN_HEADER, verify_signature};

//! Sync attempt records.
//!
//! A [`SyncAttempt`] is the unit stored in both the retry queue and the
//! audit log: one record per order delivery, carrying enough context to
//! re-submit the sale later without re-reading the original webhook.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Retry ceiling: an attempt whose `retry_count` reaches this value is
/// evicted from the queue and marked permanently failed instead of being
/// submitted again.
pub const MAX_RETRIES: u32 = 5;

/// Outcome classification for a processed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncStatus {
    /// Sale submitted and accepted by the POS.
    Success,
    /// Sale submission raised an error; the attempt is queued for retry.
    Failed,
    /// Processing was deferred before any remote call (no credential
    /// cached, or no line resolved); skipped-for-credential records are
    /// queued for retry.
    Skipped,
    /// A retry sweep re-submitted the attempt and it failed again; the
    /// current count lives in `retry_count`.
    Retrying,
    /// The retry ceiling was reached; manual intervention required.
    PermanentFail,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
            Self::Retrying => write!(f, "retrying"),
            Self::PermanentFail => write!(f, "permanent-fail"),
        }
    }
}

/// A line item as it arrived from the storefront, before catalog
/// resolution. Kept on the attempt so a skipped record can still be
/// resolved and submitted by a later retry sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderedProduct {
    pub sku: String,
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Storefront unit price, used as the fallback when the POS item has
    /// no usable cost.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
}

/// A catalog-resolved sale line ready for submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleLine {
    #[serde(rename = "itemID")]
    pub item_id: String,
    pub quantity: u32,
    #[serde(rename = "unitPrice")]
    pub unit_price: Decimal,
}

/// One order-sync attempt, as persisted to the audit log and retry queue.
///
/// Field names follow the stored JSON contract (`shopifyOrderId`,
/// `lsCustomerID`, `lsSaleID`, ...), so records written by earlier
/// deployments read back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncAttempt {
    #[serde(rename = "shopifyOrderId")]
    pub order_id: String,
    pub shop_domain: String,
    #[serde(rename = "lsCustomerID")]
    pub customer_id: String,
    pub timestamp: DateTime<Utc>,
    pub status: SyncStatus,
    #[serde(default)]
    pub products: Vec<OrderedProduct>,
    #[serde(default)]
    pub sale_lines: Vec<SaleLine>,
    #[serde(rename = "lsSaleID", skip_serializing_if = "Option::is_none")]
    pub sale_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<serde_json::Value>,
    #[serde(default)]
    pub retry_count: u32,
}

impl SyncAttempt {
    /// Create a fresh attempt with `retry_count = 0` and the current time.
    #[must_use]
    pub fn new(
        order_id: impl Into<String>,
        shop_domain: impl Into<String>,
        customer_id: impl Into<String>,
        status: SyncStatus,
        products: Vec<OrderedProduct>,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            shop_domain: shop_domain.into(),
            customer_id: customer_id.into(),
            timestamp: Utc::now(),
            status,
            products,
            sale_lines: Vec::new(),
            sale_id: None,
            error_message: None,
            error_details: None,
            retry_count: 0,
        }
    }

    /// Attach resolved sale lines.
    #[must_use]
    pub fn with_sale_lines(mut self, sale_lines: Vec<SaleLine>) -> Self {
        self.sale_lines = sale_lines;
        self
    }

    /// Attach the POS sale identifier after a successful submission.
    #[must_use]
    pub fn with_sale_id(mut self, sale_id: impl Into<String>) -> Self {
        self.sale_id = Some(sale_id.into());
        self
    }

    /// Attach error context from a failed submission.
    #[must_use]
    pub fn with_error(
        mut self,
        message: impl Into<String>,
        details: Option<serde_json::Value>,
    ) -> Self {
        self.error_message = Some(message.into());
        self.error_details = details;
        self
    }

    /// Whether the retry ceiling has been reached.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.retry_count >= MAX_RETRIES
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_attempt() -> SyncAttempt {
        SyncAttempt::new(
            "1001",
            "store-a.example",
            "42",
            SyncStatus::Failed,
            vec![OrderedProduct {
                sku: "ABC".to_string(),
                quantity: 2,
                title: Some("Widget".to_string()),
                price: Some(Decimal::new(1000, 2)),
            }],
        )
        .with_sale_lines(vec![SaleLine {
            item_id: "55".to_string(),
            quantity: 2,
            unit_price: Decimal::new(500, 2),
        }])
        .with_error("sale submission failed", Some(serde_json::json!({"httpCode": 422})))
    }

    #[test]
    fn status_serializes_to_wire_names() {
        let json = |s: SyncStatus| serde_json::to_string(&s).unwrap();
        assert_eq!(json(SyncStatus::Success), "\"success\"");
        assert_eq!(json(SyncStatus::Failed), "\"failed\"");
        assert_eq!(json(SyncStatus::Skipped), "\"skipped\"");
        assert_eq!(json(SyncStatus::Retrying), "\"retrying\"");
        assert_eq!(json(SyncStatus::PermanentFail), "\"permanent-fail\"");
    }

    #[test]
    fn status_display_matches_serde() {
        for status in [
            SyncStatus::Success,
            SyncStatus::Failed,
            SyncStatus::Skipped,
            SyncStatus::Retrying,
            SyncStatus::PermanentFail,
        ] {
            let wire = serde_json::to_string(&status).unwrap();
            assert_eq!(wire.trim_matches('"'), status.to_string());
        }
    }

    #[test]
    fn attempt_uses_contract_field_names() {
        let value = serde_json::to_value(sample_attempt()).unwrap();
        let object = value.as_object().unwrap();
        assert!(object.contains_key("shopifyOrderId"));
        assert!(object.contains_key("shopDomain"));
        assert!(object.contains_key("lsCustomerID"));
        assert!(object.contains_key("saleLines"));
        assert!(object.contains_key("errorMessage"));
        assert!(object.contains_key("retryCount"));
        let line = &value["saleLines"][0];
        assert_eq!(line["itemID"], "55");
        assert_eq!(line["unitPrice"], "5.00");
    }

    #[test]
    fn attempt_round_trips_field_for_field() {
        let attempt = sample_attempt();
        let json = serde_json::to_string(&attempt).unwrap();
        let back: SyncAttempt = serde_json::from_str(&json).unwrap();
        assert_eq!(back, attempt);
    }

    #[test]
    fn absent_optional_fields_are_omitted() {
        let attempt = SyncAttempt::new("1", "s.example", "7", SyncStatus::Skipped, Vec::new());
        let value = serde_json::to_value(attempt).unwrap();
        let object = value.as_object().unwrap();
        assert!(!object.contains_key("lsSaleID"));
        assert!(!object.contains_key("errorMessage"));
        assert!(!object.contains_key("errorDetails"));
    }

    #[test]
    fn exhaustion_tracks_the_ceiling() {
        let mut attempt = sample_attempt();
        assert!(!attempt.is_exhausted());
        attempt.retry_count = MAX_RETRIES - 1;
        assert!(!attempt.is_exhausted());
        attempt.retry_count = MAX_RETRIES;
        assert!(attempt.is_exhausted());
    }
}

//! Order webhook payloads.

use rust_decimal::Decimal;
use serde::Deserialize;

use tillsync_core::OrderedProduct;

/// The subset of the `orders/create` webhook body the bridge consumes.
/// Unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderPayload {
    pub id: i64,
    /// Human-facing order name (e.g. `#1001`), logged for traceability.
    #[serde(default)]
    pub name: Option<String>,
    /// Storefront total, logged for traceability; the POS total is always
    /// recomputed.
    #[serde(default)]
    pub total_price: Option<Decimal>,
    #[serde(default)]
    pub line_items: Vec<OrderLine>,
}

/// One webhook line item.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderLine {
    /// May be absent or null for custom/non-catalog items.
    #[serde(default)]
    pub sku: Option<String>,
    pub quantity: u32,
    /// Storefront unit price; used as the fallback when the POS item has
    /// no usable cost.
    pub price: Decimal,
    #[serde(default)]
    pub title: Option<String>,
}

impl OrderPayload {
    /// The order identifier as stored on attempt records.
    #[must_use]
    pub fn order_id(&self) -> String {
        self.id.to_string()
    }

    /// Every line as an [`OrderedProduct`], SKUs trimmed. Lines without a
    /// SKU are kept (with an empty SKU) so the audit record mirrors the
    /// order; catalog resolution skips them.
    #[must_use]
    pub fn to_products(&self) -> Vec<OrderedProduct> {
        self.line_items
            .iter()
            .map(|line| OrderedProduct {
                sku: line
                    .sku
                    .as_deref()
                    .map(str::trim)
                    .unwrap_or_default()
                    .to_string(),
                quantity: line.quantity,
                title: line.title.clone(),
                price: Some(line.price),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_a_storefront_payload() {
        let payload: OrderPayload = serde_json::from_str(
            r##"{
                "id": 1001,
                "name": "#1001",
                "total_price": "10.00",
                "currency": "USD",
                "line_items": [
                    {"sku": "ABC", "quantity": 2, "price": "10.00", "title": "Widget"},
                    {"sku": null, "quantity": 1, "price": "3.50"}
                ]
            }"##,
        )
        .unwrap();

        assert_eq!(payload.order_id(), "1001");
        assert_eq!(payload.name.as_deref(), Some("#1001"));
        assert_eq!(payload.total_price, Some(Decimal::new(1000, 2)));
        assert_eq!(payload.line_items.len(), 2);
        assert_eq!(payload.line_items[0].price, Decimal::new(1000, 2));
        assert!(payload.line_items[1].sku.is_none());
    }

    #[test]
    fn to_products_trims_skus_and_keeps_skuless_lines() {
        let payload: OrderPayload = serde_json::from_str(
            r#"{
                "id": 7,
                "line_items": [
                    {"sku": "  ABC ", "quantity": 2, "price": "1.00", "title": "Widget"},
                    {"quantity": 1, "price": "2.00"}
                ]
            }"#,
        )
        .unwrap();

        let products = payload.to_products();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].sku, "ABC");
        assert_eq!(products[0].title.as_deref(), Some("Widget"));
        assert_eq!(products[0].price, Some(Decimal::new(100, 2)));
        assert_eq!(products[1].sku, "");
    }
}

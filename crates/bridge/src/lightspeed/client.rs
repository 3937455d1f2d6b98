//! Lightspeed Retail REST client: catalog lookups and sale submission.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use tracing::instrument;

use tillsync_core::{SaleLine, fulfillment_price, sale_totals};

use crate::config::{LightspeedConfig, PricingConfig};

use super::{LightspeedError, TokenManager};

/// Catalog/sale client for the Lightspeed Retail API.
///
/// Every authenticated call tolerates one stale access token: on a 401 the
/// client performs exactly one [`TokenManager::refresh`] and retries the
/// whole operation exactly once, expressed as an explicit loop so it can
/// never recurse or spin.
#[derive(Clone)]
pub struct LightspeedClient {
    http: reqwest::Client,
    tokens: TokenManager,
    config: LightspeedConfig,
    pricing: PricingConfig,
}

/// A catalog item, reduced to the fields the bridge reads.
#[derive(Debug, Clone, Deserialize)]
pub struct Item {
    #[serde(rename = "itemID", default)]
    pub item_id: Option<String>,
    #[serde(rename = "customSku", default)]
    pub custom_sku: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "avgCost", default, deserialize_with = "lenient_decimal")]
    pub avg_cost: Option<Decimal>,
    #[serde(rename = "defaultCost", default, deserialize_with = "lenient_decimal")]
    pub default_cost: Option<Decimal>,
}

impl Item {
    /// The cost used for fulfillment pricing: average cost when it is
    /// usable, otherwise the default cost. A non-positive value is left for
    /// the pricing fallback to reject.
    #[must_use]
    pub fn cost(&self) -> Option<Decimal> {
        match self.avg_cost {
            Some(cost) if cost > Decimal::ZERO => Some(cost),
            _ => self.default_cost,
        }
    }
}

/// A created sale, reduced to the fields the bridge records.
#[derive(Debug, Clone, Deserialize)]
pub struct Sale {
    #[serde(rename = "saleID")]
    pub sale_id: String,
    #[serde(rename = "calcTotal", default, deserialize_with = "lenient_decimal")]
    pub total: Option<Decimal>,
}

/// The item filter endpoint answers with a single object for one match and
/// an array for several.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_first(self) -> Option<T> {
        match self {
            Self::One(item) => Some(item),
            Self::Many(items) => items.into_iter().next(),
        }
    }
}

#[derive(Deserialize)]
struct ItemEnvelope {
    #[serde(rename = "Item", default)]
    item: Option<OneOrMany<Item>>,
}

#[derive(Deserialize)]
struct SaleEnvelope {
    #[serde(rename = "Sale")]
    sale: Sale,
}

/// Accept decimals serialized as strings or numbers; anything unparseable
/// reads as absent so a malformed cost degrades to the price fallback
/// instead of failing the whole item.
fn lenient_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| match value {
        serde_json::Value::String(s) => s.trim().parse().ok(),
        serde_json::Value::Number(n) => n.to_string().parse().ok(),
        _ => None,
    }))
}

impl LightspeedClient {
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        tokens: TokenManager,
        config: LightspeedConfig,
        pricing: PricingConfig,
    ) -> Self {
        Self {
            http,
            tokens,
            config,
            pricing,
        }
    }

    /// The token manager this client authenticates with.
    #[must_use]
    pub const fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Whether an access token is cached (readiness gate for intake).
    pub async fn has_token(&self) -> bool {
        self.tokens.has_token().await
    }

    fn account_url(&self, path: &str) -> String {
        format!(
            "{}/API/V3/Account/{}/{path}",
            self.config.api_base, self.config.account_id
        )
    }

    /// Look up a catalog item by its custom SKU.
    ///
    /// The SKU is trimmed before querying; a multi-match answer normalizes
    /// to the first match.
    ///
    /// # Errors
    ///
    /// Returns [`LightspeedError::ItemNotFound`] when nothing matches or the
    /// match has no identifier, [`LightspeedError::Unauthorized`] when a 401
    /// persists through the bounded retry, or an API/transport error.
    #[instrument(skip(self))]
    pub async fn find_item_by_sku(&self, sku: &str) -> Result<Item, LightspeedError> {
        let sku = sku.trim();
        let url = format!(
            "{}?customSku={}",
            self.account_url("Item.json"),
            urlencoding::encode(sku)
        );

        let mut refreshed = false;
        loop {
            let token = self.tokens.bearer_token().await?;
            let response = self.http.get(&url).bearer_auth(&token).send().await?;
            let status = response.status();

            if status == reqwest::StatusCode::UNAUTHORIZED {
                if refreshed {
                    return Err(LightspeedError::Unauthorized);
                }
                refreshed = true;
                tracing::debug!(sku, "item lookup got 401, refreshing token once");
                self.tokens.refresh().await?;
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(LightspeedError::Api {
                    status: status.as_u16(),
                    body,
                });
            }

            let envelope: ItemEnvelope = response.json().await?;
            let item = envelope
                .item
                .and_then(OneOrMany::into_first)
                .filter(|item| item.item_id.is_some())
                .ok_or_else(|| LightspeedError::ItemNotFound(sku.to_string()))?;

            return Ok(item);
        }
    }

    /// Fetch the authoritative item record by id.
    ///
    /// # Errors
    ///
    /// Returns [`LightspeedError::ItemNotFound`] for an unknown id, or an
    /// API/transport error. A 401 here propagates as
    /// [`LightspeedError::Unauthorized`] so the caller's bounded retry can
    /// handle it; this method never refreshes on its own.
    #[instrument(skip(self))]
    pub async fn fetch_item(&self, item_id: &str) -> Result<Item, LightspeedError> {
        let url = self.account_url(&format!("Item/{item_id}.json"));
        let token = self.tokens.bearer_token().await?;
        let response = self.http.get(&url).bearer_auth(&token).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(LightspeedError::Unauthorized);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(LightspeedError::ItemNotFound(item_id.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LightspeedError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: ItemEnvelope = response.json().await?;
        envelope
            .item
            .and_then(OneOrMany::into_first)
            .ok_or_else(|| LightspeedError::ItemNotFound(item_id.to_string()))
    }

    /// Submit one completed sale for the given lines.
    ///
    /// For every line the authoritative item record is re-fetched and the
    /// unit price recomputed from its cost at the configured margin; an item
    /// without usable cost keeps the caller-supplied unit price. The sale is
    /// submitted completed, with promotions disabled and a single payment
    /// record for the taxed total.
    ///
    /// # Errors
    ///
    /// Returns [`LightspeedError::MissingCustomer`] for an empty customer
    /// id, [`LightspeedError::Unauthorized`] when a 401 persists through the
    /// bounded retry, or an API/transport error with the remote body
    /// attached.
    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn create_sale(
        &self,
        lines: &[SaleLine],
        customer_id: &str,
    ) -> Result<Sale, LightspeedError> {
        if customer_id.trim().is_empty() {
            return Err(LightspeedError::MissingCustomer);
        }

        let mut refreshed = false;
        loop {
            match self.submit_sale(lines, customer_id).await {
                Err(LightspeedError::Unauthorized) if !refreshed => {
                    refreshed = true;
                    tracing::debug!("sale submission got 401, refreshing token once");
                    self.tokens.refresh().await?;
                }
                result => return result,
            }
        }
    }

    /// One submission pass: price the lines, post the sale.
    async fn submit_sale(
        &self,
        lines: &[SaleLine],
        customer_id: &str,
    ) -> Result<Sale, LightspeedError> {
        // Sequential on purpose: keeps log correlation simple and stays
        // inside the remote rate limits.
        let mut priced = Vec::with_capacity(lines.len());
        for line in lines {
            let item = self.fetch_item(&line.item_id).await?;
            let unit_price =
                fulfillment_price(item.cost(), line.unit_price, self.pricing.margin_rate);
            priced.push(SaleLine {
                item_id: line.item_id.clone(),
                quantity: line.quantity,
                unit_price,
            });
        }

        let totals = sale_totals(&priced, self.pricing.tax_rate);
        let sale_lines: Vec<serde_json::Value> = priced
            .iter()
            .map(|line| {
                serde_json::json!({
                    "itemID": line.item_id,
                    "unitQuantity": line.quantity,
                    "unitPrice": line.unit_price,
                })
            })
            .collect();

        let payload = serde_json::json!({
            "customerID": customer_id,
            "employeeID": self.config.employee_id,
            "registerID": self.config.register_id,
            "shopID": self.config.shop_id,
            "completed": true,
            "enablePromotions": false,
            "calcTotal": totals.total,
            "SaleLines": { "SaleLine": sale_lines },
            "SalePayments": {
                "SalePayment": {
                    "amount": totals.total,
                    "paymentTypeID": self.config.payment_type_id,
                }
            },
        });

        let token = self.tokens.bearer_token().await?;
        let response = self
            .http
            .post(self.account_url("Sale.json"))
            .bearer_auth(&token)
            .json(&payload)
            .send()
            .await?;
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(LightspeedError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LightspeedError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: SaleEnvelope = response.json().await?;
        tracing::info!(
            sale_id = %envelope.sale.sale_id,
            total = %totals.total,
            "sale created"
        );
        Ok(envelope.sale)
    }
}

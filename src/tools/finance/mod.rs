use crate::tools::base::{Adapter, optional_str};
use crate::tools::{Tool, ToolResult};
use crate::utils::http::{default_http_client, send_json};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, RequestBuilder};
use serde_json::{Value, json};
use std::sync::Arc;

pub const ADAPTER_NAME: &str = "finance-apis";

const EXCHANGE_RATE_API: &str = "https://api.exchangerate-api.com";
const COINGECKO_API: &str = "https://api.coingecko.com";
const DEFAULT_COINS: &str = "bitcoin,ethereum,dogecoin";

pub fn adapter() -> Adapter {
    adapter_with_base_urls(EXCHANGE_RATE_API, COINGECKO_API)
}

pub(crate) fn adapter_with_base_urls(exchange_base: &str, coingecko_base: &str) -> Adapter {
    let client = default_http_client();
    let coingecko_base = coingecko_base.trim_end_matches('/').to_string();
    Adapter::new(
        ADAPTER_NAME,
        "Financial data APIs including crypto prices and exchange rates",
    )
    .with_tool(Arc::new(ExchangeRatesTool {
        client: client.clone(),
        base_url: exchange_base.trim_end_matches('/').to_string(),
    }))
    .with_tool(Arc::new(CoinGeckoPricesTool {
        client: client.clone(),
        base_url: coingecko_base.clone(),
    }))
    .with_tool(Arc::new(CoinGeckoTrendingTool {
        client,
        base_url: coingecko_base,
    }))
}

/// GET returning JSON; a non-2xx status becomes `HTTP <code>: <reason>`.
async fn fetch(req: RequestBuilder) -> Result<Value> {
    let (status, data) = send_json(req).await?;
    if !status.is_success() {
        anyhow::bail!(
            "HTTP {}: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown")
        );
    }
    Ok(data)
}

struct ExchangeRatesTool {
    client: Client,
    base_url: String,
}

impl ExchangeRatesTool {
    async fn rates(&self, base: &str, target: Option<&str>) -> Result<ToolResult> {
        let data = fetch(
            self.client
                .get(format!("{}/v4/latest/{}", self.base_url, base)),
        )
        .await?;
        let rates = data["rates"].as_object().cloned().unwrap_or_default();

        let Some(target) = target else {
            return Ok(ToolResult::json(json!({
                "source": "ExchangeRate-API.com",
                "base_currency": data["base"],
                "total_rates": rates.len(),
                "rates": rates,
                "date": data["date"],
                "fetched_at": Utc::now().to_rfc3339(),
            })));
        };

        let target = target.to_uppercase();
        match rates.get(&target) {
            Some(rate) => Ok(ToolResult::json(json!({
                "source": "ExchangeRate-API.com",
                "base_currency": data["base"],
                "target_currency": target,
                "exchange_rate": rate,
                "date": data["date"],
                "fetched_at": Utc::now().to_rfc3339(),
            }))),
            None => {
                let available: Vec<&str> = rates.keys().map(String::as_str).collect();
                Ok(ToolResult::error(format!(
                    "Currency \"{}\" not found. Available currencies: {}",
                    target,
                    available.join(", ")
                )))
            }
        }
    }
}

#[async_trait]
impl Tool for ExchangeRatesTool {
    fn name(&self) -> &'static str {
        "exchange_rates"
    }

    fn description(&self) -> &'static str {
        "Get current exchange rates from exchangerate-api.com"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "base": {
                    "type": "string",
                    "default": "USD",
                    "description": "Base currency (e.g., USD, EUR, GBP)"
                },
                "target": {
                    "type": "string",
                    "description": "Target currency; all rates are returned when omitted"
                }
            }
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let base = optional_str(&params, "base")
            .unwrap_or("USD")
            .to_uppercase();
        let target = optional_str(&params, "target");
        Ok(self
            .rates(&base, target)
            .await
            .unwrap_or_else(|e| ToolResult::error(format!("Error fetching exchange rates: {e}"))))
    }
}

struct CoinGeckoPricesTool {
    client: Client,
    base_url: String,
}

#[async_trait]
impl Tool for CoinGeckoPricesTool {
    fn name(&self) -> &'static str {
        "coingecko_prices"
    }

    fn description(&self) -> &'static str {
        "Get cryptocurrency prices from CoinGecko API"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "coins": {
                    "type": "string",
                    "default": DEFAULT_COINS,
                    "description": "Comma-separated list of coin IDs"
                },
                "vs_currency": {
                    "type": "string",
                    "default": "usd",
                    "description": "Target currency (e.g., usd, eur, gbp)"
                },
                "include_market_cap": {
                    "type": "boolean",
                    "default": true,
                    "description": "Include market cap data"
                },
                "include_24hr_change": {
                    "type": "boolean",
                    "default": true,
                    "description": "Include 24h change data"
                }
            }
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let coins = optional_str(&params, "coins").unwrap_or(DEFAULT_COINS);
        let vs_currency = optional_str(&params, "vs_currency").unwrap_or("usd");
        let market_cap = params["include_market_cap"].as_bool().unwrap_or(true);
        let change = params["include_24hr_change"].as_bool().unwrap_or(true);

        let req = self
            .client
            .get(format!("{}/api/v3/simple/price", self.base_url))
            .query(&[
                ("ids", coins),
                ("vs_currencies", vs_currency),
                ("include_market_cap", if market_cap { "true" } else { "false" }),
                ("include_24hr_change", if change { "true" } else { "false" }),
            ]);
        let result = fetch(req).await.map(|prices| {
            json!({
                "source": "CoinGecko API",
                "target_currency": vs_currency.to_uppercase(),
                "coins_requested": coins.split(',').filter(|c| !c.trim().is_empty()).count(),
                "coins_returned": prices.as_object().map_or(0, serde_json::Map::len),
                "prices": prices,
                "fetched_at": Utc::now().to_rfc3339(),
            })
        });
        Ok(ToolResult::from_json_result(result, "fetching crypto prices"))
    }
}

struct CoinGeckoTrendingTool {
    client: Client,
    base_url: String,
}

#[async_trait]
impl Tool for CoinGeckoTrendingTool {
    fn name(&self) -> &'static str {
        "coingecko_trending"
    }

    fn description(&self) -> &'static str {
        "Get trending cryptocurrencies from CoinGecko"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _params: Value) -> Result<ToolResult> {
        let req = self
            .client
            .get(format!("{}/api/v3/search/trending", self.base_url));
        let result = fetch(req).await.map(|data| {
            let coins: Vec<Value> = data["coins"]
                .as_array()
                .map(|a| a.as_slice())
                .unwrap_or_default()
                .iter()
                .map(|coin| {
                    let item = &coin["item"];
                    json!({
                        "rank": item["market_cap_rank"],
                        "name": item["name"],
                        "symbol": item["symbol"],
                        "price_btc": item["price_btc"],
                        "market_cap_rank": item["market_cap_rank"],
                        "id": item["id"],
                    })
                })
                .collect();
            json!({
                "source": "CoinGecko API",
                "trending_coins": coins,
                "fetched_at": Utc::now().to_rfc3339(),
            })
        });
        Ok(ToolResult::from_json_result(result, "fetching trending coins"))
    }
}

#[cfg(test)]
mod tests;

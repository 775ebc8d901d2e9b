use super::*;
use crate::tools::ToolContent;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn tool<'a>(adapter: &'a Adapter, name: &str) -> &'a Arc<dyn Tool> {
    adapter
        .tools
        .iter()
        .find(|t| t.name() == name)
        .unwrap_or_else(|| panic!("missing tool {name}"))
}

fn body(result: &ToolResult) -> &Value {
    match result.content.first() {
        Some(ToolContent::Json(v)) => v,
        other => panic!("expected json content, got {other:?}"),
    }
}

async fn rates_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v4/latest/EUR"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "base": "EUR",
            "date": "2026-01-02",
            "rates": {"EUR": 1, "GBP": 0.86, "USD": 1.09}
        })))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_exchange_rates_all() {
    let server = rates_server().await;
    let adapter = adapter_with_base_urls(&server.uri(), &server.uri());
    let result = tool(&adapter, "exchange_rates")
        .execute(json!({"base": "eur"}))
        .await
        .unwrap();
    assert!(!result.is_error);
    let body = body(&result);
    assert_eq!(body["base_currency"], "EUR");
    assert_eq!(body["total_rates"], 3);
    assert_eq!(body["rates"]["USD"], 1.09);
    assert_eq!(body["date"], "2026-01-02");
}

#[tokio::test]
async fn test_exchange_rates_single_target() {
    let server = rates_server().await;
    let adapter = adapter_with_base_urls(&server.uri(), &server.uri());
    let result = tool(&adapter, "exchange_rates")
        .execute(json!({"base": "EUR", "target": "gbp"}))
        .await
        .unwrap();
    assert!(!result.is_error);
    let body = body(&result);
    assert_eq!(body["target_currency"], "GBP");
    assert_eq!(body["exchange_rate"], 0.86);
    assert!(body.get("rates").is_none());
}

#[tokio::test]
async fn test_exchange_rates_unknown_target_lists_currencies() {
    let server = rates_server().await;
    let adapter = adapter_with_base_urls(&server.uri(), &server.uri());
    let result = tool(&adapter, "exchange_rates")
        .execute(json!({"base": "EUR", "target": "XYZ"}))
        .await
        .unwrap();
    assert!(result.is_error);
    assert_eq!(
        result.text(),
        "Currency \"XYZ\" not found. Available currencies: EUR, GBP, USD"
    );
}

#[tokio::test]
async fn test_exchange_rates_default_base_and_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v4/latest/USD"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    let adapter = adapter_with_base_urls(&server.uri(), &server.uri());
    let result = tool(&adapter, "exchange_rates")
        .execute(json!({}))
        .await
        .unwrap();
    assert!(result.is_error);
    assert_eq!(
        result.text(),
        "Error fetching exchange rates: HTTP 404: Not Found"
    );
}

#[tokio::test]
async fn test_coingecko_prices() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/simple/price"))
        .and(query_param("ids", "bitcoin,ethereum"))
        .and(query_param("vs_currencies", "eur"))
        .and(query_param("include_market_cap", "false"))
        .and(query_param("include_24hr_change", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bitcoin": {"eur": 60000.0, "eur_24h_change": 1.5}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter_with_base_urls(&server.uri(), &server.uri());
    let result = tool(&adapter, "coingecko_prices")
        .execute(json!({
            "coins": "bitcoin,ethereum",
            "vs_currency": "eur",
            "include_market_cap": false
        }))
        .await
        .unwrap();
    assert!(!result.is_error);
    let body = body(&result);
    assert_eq!(body["target_currency"], "EUR");
    assert_eq!(body["coins_requested"], 2);
    assert_eq!(body["coins_returned"], 1);
    assert_eq!(body["prices"]["bitcoin"]["eur"], 60000.0);
}

#[tokio::test]
async fn test_coingecko_prices_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/simple/price"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let adapter = adapter_with_base_urls(&server.uri(), &server.uri());
    let result = tool(&adapter, "coingecko_prices")
        .execute(json!({}))
        .await
        .unwrap();
    assert!(result.is_error);
    assert_eq!(
        result.text(),
        "Error fetching crypto prices: HTTP 429: Too Many Requests"
    );
}

#[tokio::test]
async fn test_coingecko_trending() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/search/trending"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "coins": [
                {"item": {"id": "pepe", "name": "Pepe", "symbol": "PEPE", "market_cap_rank": 30, "price_btc": 1.2e-10}},
                {"item": {"id": "sui", "name": "Sui", "symbol": "SUI", "market_cap_rank": 12, "price_btc": 3.1e-5}}
            ]
        })))
        .mount(&server)
        .await;

    let adapter = adapter_with_base_urls(&server.uri(), &server.uri());
    let result = tool(&adapter, "coingecko_trending")
        .execute(json!({}))
        .await
        .unwrap();
    assert!(!result.is_error);
    let coins = body(&result)["trending_coins"].as_array().unwrap().clone();
    assert_eq!(coins.len(), 2);
    assert_eq!(coins[0]["id"], "pepe");
    assert_eq!(coins[0]["rank"], 30);
    assert_eq!(coins[1]["symbol"], "SUI");
}

#[test]
fn test_adapter_tools() {
    let adapter = adapter();
    assert_eq!(adapter.name, ADAPTER_NAME);
    assert_eq!(
        adapter.tool_names(),
        vec!["exchange_rates", "coingecko_prices", "coingecko_trending"]
    );
}

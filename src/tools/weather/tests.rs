use super::*;
use crate::tools::ToolContent;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(openweather: &str, weatherapi: &str) -> WeatherConfig {
    WeatherConfig {
        openweather_api_key: openweather.to_string(),
        weatherapi_key: weatherapi.to_string(),
        ..WeatherConfig::default()
    }
}

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

#[test]
fn test_aqi_description() {
    assert_eq!(aqi_description(1), "Good");
    assert_eq!(aqi_description(3), "Moderate");
    assert_eq!(aqi_description(5), "Very Poor");
    assert_eq!(aqi_description(0), "Unknown");
    assert_eq!(aqi_description(9), "Unknown");
}

#[test]
fn test_resolve_key_precedence() {
    assert_eq!(resolve_key(&json!({"api_key": "arg"}), "cfg"), "arg");
    assert_eq!(resolve_key(&json!({"api_key": " "}), "cfg"), "cfg");
    assert_eq!(resolve_key(&json!({}), "cfg"), "cfg");
    assert_eq!(resolve_key(&json!({}), ""), "demo");
}

#[test]
fn test_adapter_tools() {
    let adapter = adapter(&WeatherConfig::default());
    assert_eq!(adapter.name, ADAPTER_NAME);
    assert_eq!(
        adapter.tool_names(),
        vec![
            "openweather_current",
            "weatherapi_current",
            "openweather_air_pollution",
            "weatherapi_forecast"
        ]
    );
}

#[tokio::test]
async fn test_openweather_current_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("q", "London"))
        .and(query_param("appid", "cfg_key"))
        .and(query_param("units", "metric"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "London",
            "coord": {"lat": 51.51, "lon": -0.13},
            "weather": [{"main": "Rain", "description": "light rain", "icon": "10d"}],
            "main": {"temp": 15.0, "feels_like": 13.5, "temp_min": 14.0, "temp_max": 16.0, "humidity": 72, "pressure": 1012},
            "visibility": 10000,
            "wind": {"speed": 5.2, "deg": 240},
            "clouds": {"all": 75},
            "sys": {"sunrise": 1700000000, "sunset": 1700030000}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter_with_base_urls(&config("cfg_key", ""), &server.uri(), &server.uri());
    let result = tool(&adapter, "openweather_current")
        .execute(json!({"location": "London"}))
        .await
        .unwrap();
    assert!(!result.is_error);
    let body = body(&result);
    assert_eq!(body["source"], "OpenWeatherMap API");
    assert_eq!(body["location"], "London");
    assert_eq!(body["weather"]["description"], "light rain");
    assert_eq!(body["temperature"]["current"], 15.0);
    assert_eq!(body["temperature"]["units"], "metric");
    assert_eq!(body["conditions"]["humidity"], 72);
    assert_eq!(body["conditions"]["clouds"], 75);
    assert!(body["fetched_at"].is_string());
}

#[tokio::test]
async fn test_openweather_invalid_key_hint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("appid", "demo"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"cod": 401})))
        .mount(&server)
        .await;

    let adapter = adapter_with_base_urls(&config("", ""), &server.uri(), &server.uri());
    let result = tool(&adapter, "openweather_current")
        .execute(json!({"location": "Paris", "units": "imperial"}))
        .await
        .unwrap();
    assert!(result.is_error);
    assert_eq!(result.text(), OPENWEATHER_KEY_HINT);
}

#[tokio::test]
async fn test_openweather_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let adapter = adapter_with_base_urls(&config("k", ""), &server.uri(), &server.uri());
    let result = tool(&adapter, "openweather_current")
        .execute(json!({"location": "Paris"}))
        .await
        .unwrap();
    assert!(result.is_error);
    assert_eq!(
        result.text(),
        "Error fetching weather: HTTP 500: Internal Server Error"
    );
}

#[tokio::test]
async fn test_air_pollution_geocodes_then_fetches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/geo/1.0/direct"))
        .and(query_param("q", "Berlin"))
        .and(query_param("limit", "1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"name": "Berlin", "lat": 52.5, "lon": 13.4}])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/air_pollution"))
        .and(query_param("lat", "52.5"))
        .and(query_param("lon", "13.4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "coord": {"lat": 52.5, "lon": 13.4},
            "list": [{"dt": 1700000000, "main": {"aqi": 2}, "components": {"pm2_5": 4.1}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter_with_base_urls(&config("k", ""), &server.uri(), &server.uri());
    let result = tool(&adapter, "openweather_air_pollution")
        .execute(json!({"location": "Berlin"}))
        .await
        .unwrap();
    assert!(!result.is_error);
    let body = body(&result);
    assert_eq!(body["aqi_description"], "Fair");
    assert_eq!(body["location"]["name"], "Berlin");
    assert_eq!(body["location"]["coordinates"], json!({"lat": 52.5, "lon": 13.4}));
    assert_eq!(body["air_quality"]["components"]["pm2_5"], 4.1);
}

#[tokio::test]
async fn test_air_pollution_unknown_location() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/geo/1.0/direct"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let adapter = adapter_with_base_urls(&config("k", ""), &server.uri(), &server.uri());
    let result = tool(&adapter, "openweather_air_pollution")
        .execute(json!({"location": "Atlantis"}))
        .await
        .unwrap();
    assert!(!result.is_error);
    assert_eq!(result.text(), "Location \"Atlantis\" not found");
}

#[tokio::test]
async fn test_air_pollution_geocoding_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/geo/1.0/direct"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let adapter = adapter_with_base_urls(&config("k", ""), &server.uri(), &server.uri());
    let result = tool(&adapter, "openweather_air_pollution")
        .execute(json!({"location": "Berlin"}))
        .await
        .unwrap();
    assert!(result.is_error);
    assert_eq!(
        result.text(),
        "Error fetching air pollution data: Geocoding failed: 401"
    );
}

#[tokio::test]
async fn test_weatherapi_current_uses_argument_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/current.json"))
        .and(query_param("key", "arg_key"))
        .and(query_param("q", "Tokyo"))
        .and(query_param("aqi", "yes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "location": {"name": "Tokyo", "country": "Japan"},
            "current": {"temp_c": 21.0, "air_quality": {"pm10": 12.0}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter_with_base_urls(&config("", "cfg_key"), &server.uri(), &server.uri());
    let result = tool(&adapter, "weatherapi_current")
        .execute(json!({"location": "Tokyo", "api_key": "arg_key"}))
        .await
        .unwrap();
    assert!(!result.is_error);
    let body = body(&result);
    assert_eq!(body["source"], "WeatherAPI.com");
    assert_eq!(body["location"]["name"], "Tokyo");
    assert_eq!(body["current"]["temp_c"], 21.0);
    assert_eq!(body["air_quality"]["pm10"], 12.0);
}

#[tokio::test]
async fn test_weatherapi_forbidden_hint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast.json"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let adapter = adapter_with_base_urls(&config("", ""), &server.uri(), &server.uri());
    let result = tool(&adapter, "weatherapi_forecast")
        .execute(json!({"location": "Oslo"}))
        .await
        .unwrap();
    assert!(result.is_error);
    assert_eq!(result.text(), WEATHERAPI_KEY_HINT);
}

#[tokio::test]
async fn test_weatherapi_forecast_clamps_days() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast.json"))
        .and(query_param("days", "3"))
        .and(query_param("alerts", "yes"))
        .and(query_param("key", "cfg_key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "location": {"name": "Oslo"},
            "current": {"temp_c": 2.0},
            "forecast": {"forecastday": [{}, {}, {}]},
            "alerts": {"alert": []}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter_with_base_urls(&config("", "cfg_key"), &server.uri(), &server.uri());
    let result = tool(&adapter, "weatherapi_forecast")
        .execute(json!({"location": "Oslo", "days": 7}))
        .await
        .unwrap();
    assert!(!result.is_error);
    let body = body(&result);
    assert_eq!(body["forecast"]["forecastday"].as_array().unwrap().len(), 3);
    assert_eq!(body["alerts"], json!({"alert": []}));
}

#[tokio::test]
async fn test_missing_location() {
    let adapter = adapter(&WeatherConfig::default());
    let result = tool(&adapter, "weatherapi_current")
        .execute(json!({}))
        .await
        .unwrap();
    assert!(result.is_error);
    assert!(result.text().contains("location"));
}

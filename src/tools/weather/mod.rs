use crate::config::WeatherConfig;
use crate::tools::base::{Adapter, clamped_u64, optional_str};
use crate::tools::{Tool, ToolResult};
use crate::utils::http::{default_http_client, send_json};
use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::debug;

pub const ADAPTER_NAME: &str = "weather-apis";

const OPENWEATHER_API: &str = "https://api.openweathermap.org";
const WEATHERAPI_API: &str = "https://api.weatherapi.com";
const DEMO_KEY: &str = "demo";

const OPENWEATHER_KEY_HINT: &str = "Invalid API key. Please provide a valid OpenWeatherMap API key or get one free from https://openweathermap.org/api";
const WEATHERAPI_KEY_HINT: &str = "Invalid API key. Please provide a valid WeatherAPI.com key or get one free from https://www.weatherapi.com/";

pub fn adapter(config: &WeatherConfig) -> Adapter {
    adapter_with_base_urls(config, OPENWEATHER_API, WEATHERAPI_API)
}

pub(crate) fn adapter_with_base_urls(
    config: &WeatherConfig,
    openweather_base: &str,
    weatherapi_base: &str,
) -> Adapter {
    let api = Arc::new(WeatherApis {
        client: default_http_client(),
        openweather_base: openweather_base.trim_end_matches('/').to_string(),
        weatherapi_base: weatherapi_base.trim_end_matches('/').to_string(),
        openweather_key: config.openweather_api_key.clone(),
        weatherapi_key: config.weatherapi_key.clone(),
    });
    Adapter::new(
        ADAPTER_NAME,
        "Weather and air quality APIs from multiple providers",
    )
    .with_tool(Arc::new(OpenWeatherCurrentTool { api: api.clone() }))
    .with_tool(Arc::new(WeatherApiCurrentTool { api: api.clone() }))
    .with_tool(Arc::new(OpenWeatherAirPollutionTool { api: api.clone() }))
    .with_tool(Arc::new(WeatherApiForecastTool { api }))
}

/// Provider endpoints and configured keys shared by the weather tools.
struct WeatherApis {
    client: Client,
    openweather_base: String,
    weatherapi_base: String,
    openweather_key: String,
    weatherapi_key: String,
}

/// Argument, then configured key, then the public demo key.
fn resolve_key<'a>(params: &'a Value, configured: &'a str) -> &'a str {
    optional_str(params, "api_key")
        .or_else(|| Some(configured.trim()).filter(|k| !k.is_empty()))
        .unwrap_or(DEMO_KEY)
}

/// Maps an OpenWeatherMap AQI index to its label.
pub(crate) fn aqi_description(aqi: u64) -> &'static str {
    match aqi {
        1 => "Good",
        2 => "Fair",
        3 => "Moderate",
        4 => "Poor",
        5 => "Very Poor",
        _ => "Unknown",
    }
}

fn http_failure(status: StatusCode) -> anyhow::Error {
    anyhow::anyhow!(
        "HTTP {}: {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown")
    )
}

fn location_schema() -> Value {
    json!({
        "type": "string",
        "minLength": 1,
        "description": "City name or coordinates (lat,lon)"
    })
}

fn key_schema(provider: &str) -> Value {
    json!({
        "type": "string",
        "description": format!("{provider} API key (optional, falls back to the configured or demo key)")
    })
}

/// Outcome of a provider call: data, or a ready-made result such as a key hint.
enum Fetched {
    Data(Value),
    Reply(ToolResult),
}

impl WeatherApis {
    async fn openweather_current(&self, location: &str, units: &str, key: &str) -> Result<Fetched> {
        let req = self
            .client
            .get(format!("{}/data/2.5/weather", self.openweather_base))
            .query(&[("q", location), ("appid", key), ("units", units)]);
        let (status, data) = send_json(req).await?;
        if status == StatusCode::UNAUTHORIZED {
            return Ok(Fetched::Reply(ToolResult::error(OPENWEATHER_KEY_HINT)));
        }
        if !status.is_success() {
            return Err(http_failure(status));
        }

        let weather = &data["weather"][0];
        Ok(Fetched::Data(json!({
            "source": "OpenWeatherMap API",
            "location": data["name"],
            "coordinates": {
                "lat": data["coord"]["lat"],
                "lon": data["coord"]["lon"],
            },
            "weather": {
                "main": weather["main"],
                "description": weather["description"],
                "icon": weather["icon"],
            },
            "temperature": {
                "current": data["main"]["temp"],
                "feels_like": data["main"]["feels_like"],
                "min": data["main"]["temp_min"],
                "max": data["main"]["temp_max"],
                "units": units,
            },
            "conditions": {
                "humidity": data["main"]["humidity"],
                "pressure": data["main"]["pressure"],
                "visibility": data["visibility"],
                "wind_speed": data["wind"]["speed"],
                "wind_direction": data["wind"]["deg"],
                "clouds": data["clouds"]["all"],
            },
            "sunrise": data["sys"]["sunrise"],
            "sunset": data["sys"]["sunset"],
            "fetched_at": Utc::now().to_rfc3339(),
        })))
    }

    async fn openweather_air_pollution(&self, location: &str, key: &str) -> Result<Fetched> {
        let req = self
            .client
            .get(format!("{}/geo/1.0/direct", self.openweather_base))
            .query(&[("q", location), ("limit", "1"), ("appid", key)]);
        let (status, places) = send_json(req).await?;
        if !status.is_success() {
            bail!("Geocoding failed: {}", status.as_u16());
        }
        let Some(place) = places.as_array().and_then(|p| p.first()) else {
            return Ok(Fetched::Reply(ToolResult::new(format!(
                "Location \"{location}\" not found"
            ))));
        };
        let (lat, lon) = (place["lat"].clone(), place["lon"].clone());
        debug!("geocoded '{}' to {},{}", location, lat, lon);

        let req = self
            .client
            .get(format!("{}/data/2.5/air_pollution", self.openweather_base))
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("appid", key.to_string()),
            ]);
        let (status, data) = send_json(req).await?;
        if !status.is_success() {
            bail!("Air pollution API failed: {}", status.as_u16());
        }

        let reading = &data["list"][0];
        if reading.is_null() {
            bail!("no air quality readings for {location}");
        }
        let aqi = reading["main"]["aqi"].as_u64().unwrap_or(0);
        Ok(Fetched::Data(json!({
            "source": "OpenWeatherMap Air Pollution API",
            "location": {
                "name": location,
                "coordinates": {"lat": lat, "lon": lon},
            },
            "air_quality": reading,
            "aqi_description": aqi_description(aqi),
            "fetched_at": Utc::now().to_rfc3339(),
        })))
    }

    /// Call a WeatherAPI.com endpoint (`current.json`, `forecast.json`).
    async fn weatherapi(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<Fetched> {
        let req = self
            .client
            .get(format!("{}/v1/{}", self.weatherapi_base, endpoint))
            .query(query);
        let (status, data) = send_json(req).await?;
        if status == StatusCode::FORBIDDEN {
            return Ok(Fetched::Reply(ToolResult::error(WEATHERAPI_KEY_HINT)));
        }
        if !status.is_success() {
            return Err(http_failure(status));
        }
        Ok(Fetched::Data(data))
    }
}

fn into_result(fetched: Result<Fetched>, context: &str) -> ToolResult {
    match fetched {
        Ok(Fetched::Data(value)) => ToolResult::json(value),
        Ok(Fetched::Reply(result)) => result,
        Err(e) => ToolResult::error(format!("Error {context}: {e}")),
    }
}

struct OpenWeatherCurrentTool {
    api: Arc<WeatherApis>,
}

#[async_trait]
impl Tool for OpenWeatherCurrentTool {
    fn name(&self) -> &'static str {
        "openweather_current"
    }

    fn description(&self) -> &'static str {
        "Get current weather data from OpenWeatherMap API"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "location": location_schema(),
                "units": {
                    "type": "string",
                    "enum": ["metric", "imperial", "standard"],
                    "default": "metric",
                    "description": "Temperature units"
                },
                "api_key": key_schema("OpenWeatherMap")
            },
            "required": ["location"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let Some(location) = optional_str(&params, "location") else {
            return Ok(ToolResult::error("Missing 'location' parameter"));
        };
        let units = optional_str(&params, "units").unwrap_or("metric");
        let key = resolve_key(&params, &self.api.openweather_key);
        Ok(into_result(
            self.api.openweather_current(location, units, key).await,
            "fetching weather",
        ))
    }
}

struct WeatherApiCurrentTool {
    api: Arc<WeatherApis>,
}

#[async_trait]
impl Tool for WeatherApiCurrentTool {
    fn name(&self) -> &'static str {
        "weatherapi_current"
    }

    fn description(&self) -> &'static str {
        "Get current weather data from WeatherAPI.com"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "location": location_schema(),
                "api_key": key_schema("WeatherAPI.com")
            },
            "required": ["location"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let Some(location) = optional_str(&params, "location") else {
            return Ok(ToolResult::error("Missing 'location' parameter"));
        };
        let key = resolve_key(&params, &self.api.weatherapi_key);
        let fetched = self
            .api
            .weatherapi("current.json", &[("key", key), ("q", location), ("aqi", "yes")])
            .await
            .map(|f| match f {
                Fetched::Data(data) => Fetched::Data(json!({
                    "source": "WeatherAPI.com",
                    "location": data["location"],
                    "current": data["current"],
                    "air_quality": data["current"]["air_quality"],
                    "fetched_at": Utc::now().to_rfc3339(),
                })),
                reply => reply,
            });
        Ok(into_result(fetched, "fetching weather"))
    }
}

struct OpenWeatherAirPollutionTool {
    api: Arc<WeatherApis>,
}

#[async_trait]
impl Tool for OpenWeatherAirPollutionTool {
    fn name(&self) -> &'static str {
        "openweather_air_pollution"
    }

    fn description(&self) -> &'static str {
        "Get air pollution data from OpenWeatherMap API"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "location": location_schema(),
                "api_key": key_schema("OpenWeatherMap")
            },
            "required": ["location"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let Some(location) = optional_str(&params, "location") else {
            return Ok(ToolResult::error("Missing 'location' parameter"));
        };
        let key = resolve_key(&params, &self.api.openweather_key);
        Ok(into_result(
            self.api.openweather_air_pollution(location, key).await,
            "fetching air pollution data",
        ))
    }
}

struct WeatherApiForecastTool {
    api: Arc<WeatherApis>,
}

#[async_trait]
impl Tool for WeatherApiForecastTool {
    fn name(&self) -> &'static str {
        "weatherapi_forecast"
    }

    fn description(&self) -> &'static str {
        "Get weather forecast from WeatherAPI.com"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "location": location_schema(),
                "days": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 3,
                    "default": 3,
                    "description": "Number of forecast days (1-3)"
                },
                "api_key": key_schema("WeatherAPI.com")
            },
            "required": ["location"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let Some(location) = optional_str(&params, "location") else {
            return Ok(ToolResult::error("Missing 'location' parameter"));
        };
        let days = clamped_u64(&params, "days", 3, 1, 3).to_string();
        let key = resolve_key(&params, &self.api.weatherapi_key);
        let fetched = self
            .api
            .weatherapi(
                "forecast.json",
                &[
                    ("key", key),
                    ("q", location),
                    ("days", &days),
                    ("aqi", "yes"),
                    ("alerts", "yes"),
                ],
            )
            .await
            .map(|f| match f {
                Fetched::Data(data) => Fetched::Data(json!({
                    "source": "WeatherAPI.com",
                    "location": data["location"],
                    "current": data["current"],
                    "forecast": data["forecast"],
                    "alerts": data["alerts"],
                    "fetched_at": Utc::now().to_rfc3339(),
                })),
                reply => reply,
            });
        Ok(into_result(fetched, "fetching forecast"))
    }
}

#[cfg(test)]
mod tests;

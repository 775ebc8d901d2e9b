use serde::{Deserialize, Serialize};

use super::default_true;

fn default_shell() -> String {
    crate::utils::subprocess::default_shell().to_string()
}

fn default_terminal_timeout() -> u64 {
    crate::terminal::DEFAULT_TIMEOUT_SECS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_shell")]
    pub shell: String,
    /// Defaults to the server's own working directory.
    #[serde(default, rename = "workingDir")]
    pub working_dir: Option<String>,
    #[serde(default = "default_terminal_timeout", rename = "defaultTimeout")]
    pub default_timeout: u64,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            shell: default_shell(),
            working_dir: None,
            default_timeout: default_terminal_timeout(),
        }
    }
}

fn default_searxng_url() -> String {
    "http://127.0.0.1:8888".to_string()
}

fn default_max_results() -> usize {
    6
}

fn default_engines() -> String {
    "bing,duckduckgo,brave".to_string()
}

fn default_max_content_chars() -> usize {
    5000
}

fn default_web_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_searxng_url", rename = "searxngUrl")]
    pub searxng_url: String,
    #[serde(default = "default_max_results", rename = "maxResults")]
    pub max_results: usize,
    /// Comma-separated SearXNG engine list.
    #[serde(default = "default_engines")]
    pub engines: String,
    #[serde(default = "default_max_content_chars", rename = "maxContentChars")]
    pub max_content_chars: usize,
    #[serde(default = "default_web_timeout", rename = "timeoutSecs")]
    pub timeout_secs: u64,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            searxng_url: default_searxng_url(),
            max_results: default_max_results(),
            engines: default_engines(),
            max_content_chars: default_max_content_chars(),
            timeout_secs: default_web_timeout(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, rename = "openweatherApiKey")]
    pub openweather_api_key: String,
    #[serde(default, rename = "weatherapiKey")]
    pub weatherapi_key: String,
}

redact_debug!(
    WeatherConfig,
    enabled,
    redact(openweather_api_key),
    redact(weatherapi_key),
);

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            openweather_api_key: String::new(),
            weatherapi_key: String::new(),
        }
    }
}

/// Adapters with nothing to configure beyond an on/off switch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ToggleConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub terminal: TerminalConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub finance: ToggleConfig,
    #[serde(default, rename = "freeApis")]
    pub free_apis: ToggleConfig,
    #[serde(default)]
    pub productivity: ToggleConfig,
    #[serde(default)]
    pub system: ToggleConfig,
}

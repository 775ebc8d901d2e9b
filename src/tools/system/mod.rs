use crate::tools::base::Adapter;
use crate::tools::{Tool, ToolResult};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub const ADAPTER_NAME: &str = "system-apis";

const MAX_URLS: usize = 10;
const MAX_WAIT_SECS: f64 = 10.0;
const MAX_DELAY_SECS: f64 = 5.0;

/// Something that can hand a URL to the desktop.
pub trait UrlOpener: Send + Sync {
    fn open(&self, url: &str) -> Result<()>;
}

/// Opens URLs with the platform's default browser.
pub struct SystemOpener;

impl UrlOpener for SystemOpener {
    fn open(&self, url: &str) -> Result<()> {
        open::that(url).map_err(|e| anyhow::anyhow!("Failed to open browser: {}", e))
    }
}

pub fn adapter(opener: Arc<dyn UrlOpener>) -> Adapter {
    Adapter::new(
        ADAPTER_NAME,
        "System APIs for opening URLs and browser automation",
    )
    .with_tool(Arc::new(OpenUrlTool {
        opener: opener.clone(),
    }))
    .with_tool(Arc::new(OpenMultipleUrlsTool { opener }))
}

fn is_valid_url(raw: &str) -> bool {
    url::Url::parse(raw).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
}

fn seconds(params: &Value, key: &str, default: f64, max: f64) -> f64 {
    params[key].as_f64().unwrap_or(default).clamp(0.0, max)
}

async fn pause(secs: f64) {
    if secs > 0.0 {
        tokio::time::sleep(Duration::from_secs_f64(secs)).await;
    }
}

/// Run the blocking opener off the async runtime.
async fn open_url(opener: &Arc<dyn UrlOpener>, url: &str) -> Result<()> {
    let opener = opener.clone();
    let url = url.to_string();
    tokio::task::spawn_blocking(move || opener.open(&url)).await?
}

struct OpenUrlTool {
    opener: Arc<dyn UrlOpener>,
}

#[async_trait]
impl Tool for OpenUrlTool {
    fn name(&self) -> &'static str {
        "open_url"
    }

    fn description(&self) -> &'static str {
        "Open a URL in the system default browser"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to open in the browser"
                },
                "wait_time": {
                    "type": "number",
                    "minimum": 0,
                    "maximum": MAX_WAIT_SECS,
                    "default": 0,
                    "description": "Wait time in seconds before opening (0-10)"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let url = params["url"].as_str().unwrap_or_default();
        if !is_valid_url(url) {
            return Ok(ToolResult::error(format!(
                "Invalid URL: {url}. Please provide a valid HTTP or HTTPS URL."
            )));
        }

        pause(seconds(&params, "wait_time", 0.0, MAX_WAIT_SECS)).await;

        match open_url(&self.opener, url).await {
            Ok(()) => {
                info!("opened {} in default browser", url);
                Ok(ToolResult::json(json!({
                    "success": true,
                    "url": url,
                    "platform": std::env::consts::OS,
                    "opened_at": Utc::now().to_rfc3339(),
                    "message": format!("Successfully opened {url} in your default browser"),
                })))
            }
            Err(e) => {
                warn!("failed to open {}: {}", url, e);
                Ok(ToolResult::error_json(json!({
                    "success": false,
                    "url": url,
                    "platform": std::env::consts::OS,
                    "error": e.to_string(),
                    "opened_at": Utc::now().to_rfc3339(),
                    "message": format!("Failed to open {url} in browser"),
                })))
            }
        }
    }
}

struct OpenMultipleUrlsTool {
    opener: Arc<dyn UrlOpener>,
}

#[async_trait]
impl Tool for OpenMultipleUrlsTool {
    fn name(&self) -> &'static str {
        "open_multiple_urls"
    }

    fn description(&self) -> &'static str {
        "Open multiple URLs in the system default browser"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "urls": {
                    "type": "array",
                    "items": {"type": "string"},
                    "minItems": 1,
                    "maxItems": MAX_URLS,
                    "description": "Array of URLs to open (1-10 URLs)"
                },
                "delay_between": {
                    "type": "number",
                    "minimum": 0,
                    "maximum": MAX_DELAY_SECS,
                    "default": 1,
                    "description": "Delay between opening URLs in seconds (0-5)"
                },
                "wait_time": {
                    "type": "number",
                    "minimum": 0,
                    "maximum": MAX_WAIT_SECS,
                    "default": 0,
                    "description": "Initial wait time before opening first URL (0-10)"
                }
            },
            "required": ["urls"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let urls: Vec<&str> = params["urls"]
            .as_array()
            .map(|a| a.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        if urls.is_empty() || urls.len() > MAX_URLS {
            return Ok(ToolResult::error(format!(
                "Provide between 1 and {MAX_URLS} URLs."
            )));
        }
        let invalid: Vec<&str> = urls.iter().copied().filter(|u| !is_valid_url(u)).collect();
        if !invalid.is_empty() {
            return Ok(ToolResult::error(format!(
                "Invalid URLs found: {}. Please provide valid HTTP or HTTPS URLs.",
                invalid.join(", ")
            )));
        }

        let delay = seconds(&params, "delay_between", 1.0, MAX_DELAY_SECS);
        let wait = seconds(&params, "wait_time", 0.0, MAX_WAIT_SECS);
        pause(wait).await;

        let mut results = Vec::with_capacity(urls.len());
        for (i, url) in urls.iter().enumerate() {
            match open_url(&self.opener, url).await {
                Ok(()) => results.push(json!({
                    "url": url,
                    "success": true,
                    "opened_at": Utc::now().to_rfc3339(),
                })),
                Err(e) => {
                    warn!("failed to open {}: {}", url, e);
                    results.push(json!({
                        "url": url,
                        "success": false,
                        "error": e.to_string(),
                        "opened_at": Utc::now().to_rfc3339(),
                    }));
                }
            }
            if i + 1 < urls.len() {
                pause(delay).await;
            }
        }

        let successes = results.iter().filter(|r| r["success"] == true).count();
        Ok(ToolResult::json(json!({
            "total_urls": urls.len(),
            "successful_opens": successes,
            "failed_opens": urls.len() - successes,
            "platform": std::env::consts::OS,
            "delay_between": delay,
            "initial_wait": wait,
            "results": results,
            "completed_at": Utc::now().to_rfc3339(),
            "message": format!("Opened {} of {} URLs successfully", successes, urls.len()),
        })))
    }
}

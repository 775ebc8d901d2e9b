use anyhow::{Context, Result, bail};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// Cap on JSON API bodies.
pub const MAX_JSON_BYTES: usize = 5 * 1024 * 1024;
/// Cap on scraped HTML pages.
pub const MAX_PAGE_BYTES: usize = 2 * 1024 * 1024;

const USER_AGENT: &str = concat!("websearch/", env!("CARGO_PKG_VERSION"));

/// Shared client for every adapter: 10 s connect, 30 s overall.
///
/// Falls back to the default client if the builder fails.
pub fn default_http_client() -> Client {
    Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Read at most `max_bytes` of a response body. Returns `(bytes, was_truncated)`.
///
/// A `Content-Length` above the limit is rejected before any bytes are read.
pub async fn limited_body(mut resp: Response, max_bytes: usize) -> Result<(Vec<u8>, bool)> {
    if let Some(cl) = resp.content_length()
        && cl > max_bytes as u64
    {
        bail!("response body too large: {} bytes (limit {})", cl, max_bytes);
    }

    let mut buf = Vec::new();
    while let Some(chunk) = resp.chunk().await? {
        let room = max_bytes.saturating_sub(buf.len());
        if chunk.len() > room {
            buf.extend_from_slice(&chunk[..room]);
            return Ok((buf, true));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok((buf, false))
}

/// Send `req` and return the status with the body parsed as JSON.
///
/// Non-2xx statuses are returned, not raised, so callers can map provider
/// specific codes (e.g. an invalid API key) to their own messages. A non-JSON
/// body becomes `Value::Null`.
pub async fn send_json(req: RequestBuilder) -> Result<(StatusCode, Value)> {
    let resp = req.send().await.context("request failed")?;
    let status = resp.status();
    let (bytes, truncated) = limited_body(resp, MAX_JSON_BYTES).await?;
    if truncated {
        bail!("response body exceeded {} bytes", MAX_JSON_BYTES);
    }
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    Ok((status, value))
}

/// Send `req` and parse a successful JSON response.
pub async fn get_json(req: RequestBuilder) -> Result<Value> {
    let (status, value) = send_json(req).await?;
    if !status.is_success() {
        bail!("HTTP error! status: {}", status.as_u16());
    }
    if value.is_null() {
        bail!("response was not valid JSON");
    }
    Ok(value)
}

/// Send `req` and return the body as lossy UTF-8, truncated to `max_bytes`.
pub async fn get_text(req: RequestBuilder, max_bytes: usize) -> Result<String> {
    let resp = req.send().await.context("request failed")?;
    let status = resp.status();
    if !status.is_success() {
        bail!("HTTP error! status: {}", status.as_u16());
    }
    let (bytes, _) = limited_body(resp, max_bytes).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests;

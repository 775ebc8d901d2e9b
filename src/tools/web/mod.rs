use crate::config::WebConfig;
use crate::tools::base::{Adapter, optional_str};
use crate::tools::{Tool, ToolContent, ToolResult};
use crate::utils::http::{MAX_PAGE_BYTES, default_http_client, get_json, get_text};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use futures_util::future::join_all;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const ADAPTER_NAME: &str = "web-search";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
const DEFAULT_CATEGORIES: &str = "general,web";
const MAX_SCRAPE_LINKS: usize = 20;
const MAX_LINKS_PER_PAGE: usize = 20;
const MAX_IMAGES_PER_PAGE: usize = 10;

/// Subtrees that never count as page content.
const EXCLUDED_TAGS: &[&str] = &["script", "style", "noscript", "nav", "header", "footer", "aside"];
const EXCLUDED_CLASSES: &[&str] = &["ad", "advertisement", "sidebar"];

pub fn adapter(config: &WebConfig) -> Adapter {
    let client = default_http_client();
    let timeout = Duration::from_secs(config.timeout_secs);
    Adapter::new(
        ADAPTER_NAME,
        "Web search and content scraping tools using SearXNG",
    )
    .with_tool(Arc::new(GetLinksTool {
        client: client.clone(),
        base_url: config.searxng_url.trim_end_matches('/').to_string(),
        engines: config.engines.clone(),
        max_results: config.max_results,
        timeout,
    }))
    .with_tool(Arc::new(ScrapeLinksTool {
        client,
        max_content_chars: config.max_content_chars,
        timeout,
    }))
}

struct GetLinksTool {
    client: Client,
    base_url: String,
    engines: String,
    max_results: usize,
    timeout: Duration,
}

#[async_trait]
impl Tool for GetLinksTool {
    fn name(&self) -> &'static str {
        "get_links"
    }

    fn description(&self) -> &'static str {
        "Search SearXNG and return the top links with title, snippet and engine"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "minLength": 1,
                    "description": "Search query"
                },
                "categories": {
                    "type": "string",
                    "description": "Comma-separated categories (default general,web)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let Some(query) = optional_str(&params, "query") else {
            return Ok(ToolResult::error("Missing 'query' parameter"));
        };
        let categories = optional_str(&params, "categories").unwrap_or(DEFAULT_CATEGORIES);

        let req = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[
                ("q", query),
                ("format", "json"),
                ("categories", categories),
                ("engines", self.engines.as_str()),
            ])
            .timeout(self.timeout);

        let data = match get_json(req).await {
            Ok(data) => data,
            Err(e) => {
                warn!("SearXNG search for '{}' failed: {}", query, e);
                return Ok(ToolResult::error(format!(
                    "Error fetching search results: {e}"
                )));
            }
        };

        let results: Vec<Value> = data["results"]
            .as_array()
            .map(|a| a.as_slice())
            .unwrap_or_default()
            .iter()
            .take(self.max_results)
            .map(|r| {
                json!({
                    "title": r["title"],
                    "url": r["url"],
                    "content": r["content"],
                    "engine": r["engine"],
                })
            })
            .collect();

        if results.is_empty() {
            return Ok(ToolResult::new(format!("No results found for \"{query}\"")));
        }
        debug!("SearXNG returned {} results for '{}'", results.len(), query);
        Ok(ToolResult::json(Value::Array(results)))
    }
}

struct ScrapeLinksTool {
    client: Client,
    max_content_chars: usize,
    timeout: Duration,
}

#[async_trait]
impl Tool for ScrapeLinksTool {
    fn name(&self) -> &'static str {
        "scrape_links"
    }

    fn description(&self) -> &'static str {
        "Scrape multiple URLs and return clean, structured content"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "links": {
                    "type": "array",
                    "items": {"type": "string"},
                    "minItems": 1,
                    "maxItems": MAX_SCRAPE_LINKS,
                    "description": "Array of URLs to scrape"
                }
            },
            "required": ["links"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let links: Vec<&str> = params["links"]
            .as_array()
            .map(|a| a.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        if links.is_empty() {
            return Ok(ToolResult::error("Provide at least one URL in 'links'"));
        }

        let pages = join_all(links.iter().map(|url| self.scrape(url))).await;
        Ok(ToolResult::from_parts(
            pages.into_iter().map(ToolContent::Json).collect(),
        ))
    }
}

impl ScrapeLinksTool {
    /// Scrape one page. Failures become `{url, error, scrapedAt}` rather than an error.
    async fn scrape(&self, url: &str) -> Value {
        match self.fetch_page(url).await {
            Ok(value) => value,
            Err(e) => {
                warn!("scrape of {} failed: {}", url, e);
                json!({
                    "url": url,
                    "error": e.to_string(),
                    "scrapedAt": Utc::now().to_rfc3339(),
                })
            }
        }
    }

    async fn fetch_page(&self, url: &str) -> Result<Value> {
        let parsed = url::Url::parse(url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("unsupported URL scheme '{}'", parsed.scheme());
        }
        let req = self
            .client
            .get(parsed)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(self.timeout);
        let html = get_text(req, MAX_PAGE_BYTES).await?;
        extract_page(url, &html, self.max_content_chars)
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow::anyhow!("Failed to parse selector {css:?}: {e:?}"))
}

fn is_excluded(el: &ElementRef) -> bool {
    let value = el.value();
    EXCLUDED_TAGS.contains(&value.name())
        || value.classes().any(|c| EXCLUDED_CLASSES.contains(&c))
}

/// True when `el` or any ancestor is boilerplate.
fn in_excluded(el: &ElementRef) -> bool {
    is_excluded(el) || el.ancestors().filter_map(ElementRef::wrap).any(|a| is_excluded(&a))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text of `root` with boilerplate subtrees skipped, whitespace collapsed.
fn visible_text(root: ElementRef) -> String {
    let mut raw = String::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|a| is_excluded(&a));
        if !hidden {
            raw.push_str(text);
            raw.push(' ');
        }
    }
    collapse_whitespace(&raw)
}

fn element_text(el: ElementRef) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

/// Turn an HTML page into the structured scrape record.
pub(crate) fn extract_page(url: &str, html: &str, max_content_chars: usize) -> Result<Value> {
    let document = Html::parse_document(html);

    let title = document
        .select(&selector("title")?)
        .next()
        .map(element_text)
        .unwrap_or_default();
    let meta_description = document
        .select(&selector(r#"meta[name="description"]"#)?)
        .next()
        .and_then(|m| m.value().attr("content"))
        .map(str::trim)
        .unwrap_or_default()
        .to_string();

    let primary = selector("main, article, .content, .post-content, .entry-content, #content")?;
    let fallback =
        selector(r#"div[class*="content"], div[class*="article"], div[class*="post"]"#)?;
    let body = selector("body")?;
    let root = document
        .select(&primary)
        .find(|el| !in_excluded(el))
        .or_else(|| document.select(&fallback).find(|el| !in_excluded(el)))
        .or_else(|| document.select(&body).next())
        .unwrap_or_else(|| document.root_element());

    let content = visible_text(root);
    let word_count = content.split_whitespace().count();
    let cut = content
        .char_indices()
        .nth(max_content_chars)
        .map_or(content.len(), |(i, _)| i);

    let headings: Vec<Value> = document
        .select(&selector("h1, h2, h3, h4, h5, h6")?)
        .filter(|h| !in_excluded(h))
        .map(|h| {
            let level = h.value().name()[1..].parse::<u8>().unwrap_or(0);
            json!({"level": level, "text": element_text(h)})
        })
        .collect();

    let links: Vec<Value> = document
        .select(&selector("a[href]")?)
        .filter(|a| !in_excluded(a))
        .take(MAX_LINKS_PER_PAGE)
        .map(|a| {
            json!({
                "text": element_text(a),
                "href": a.value().attr("href").unwrap_or_default(),
            })
        })
        .collect();

    let images: Vec<Value> = document
        .select(&selector("img[src]")?)
        .filter(|img| !in_excluded(img))
        .take(MAX_IMAGES_PER_PAGE)
        .map(|img| {
            let attr = |name: &str| img.value().attr(name).unwrap_or_default();
            json!({"src": attr("src"), "alt": attr("alt"), "title": attr("title")})
        })
        .collect();

    Ok(json!({
        "url": url,
        "title": title,
        "metaDescription": meta_description,
        "content": &content[..cut],
        "headings": headings,
        "links": links,
        "images": images,
        "wordCount": word_count,
        "scrapedAt": Utc::now().to_rfc3339(),
    }))
}

#[cfg(test)]
mod tests;

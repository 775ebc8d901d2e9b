use crate::tools::base::{Adapter, clamped_u64, optional_str};
use crate::tools::free_apis::{fetch, head, limit_schema};
use crate::tools::{Tool, ToolResult};
use crate::utils::http::{MAX_JSON_BYTES, default_http_client, limited_body};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use futures_util::{StreamExt, TryStreamExt, stream};
use reqwest::{Client, Method};
use serde_json::{Map, Value, json};
use std::sync::Arc;

pub const ADAPTER_NAME: &str = "productivity-apis";

const MAX_CONCURRENT_UUID_REQUESTS: usize = 8;
const DATASETS: [&str; 6] = ["users", "posts", "comments", "albums", "photos", "todos"];

/// Base URLs of the testing services.
#[derive(Debug, Clone)]
pub(crate) struct Endpoints {
    pub jsonplaceholder: String,
    pub httpbin: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            jsonplaceholder: "https://jsonplaceholder.typicode.com".to_string(),
            httpbin: "https://httpbin.org".to_string(),
        }
    }
}

pub fn adapter() -> Adapter {
    adapter_with_endpoints(Endpoints::default())
}

pub(crate) fn adapter_with_endpoints(endpoints: Endpoints) -> Adapter {
    let client = default_http_client();
    let jsonplaceholder = endpoints.jsonplaceholder.trim_end_matches('/').to_string();
    let httpbin = endpoints.httpbin.trim_end_matches('/').to_string();
    Adapter::new(
        ADAPTER_NAME,
        "Productivity and testing APIs for development and data management",
    )
    .with_tool(Arc::new(TodosTool {
        client: client.clone(),
        base_url: jsonplaceholder.clone(),
    }))
    .with_tool(Arc::new(AlbumsTool {
        client: client.clone(),
        base_url: jsonplaceholder.clone(),
    }))
    .with_tool(Arc::new(PhotosTool {
        client: client.clone(),
        base_url: jsonplaceholder.clone(),
    }))
    .with_tool(Arc::new(HttpBinTool {
        client: client.clone(),
        base_url: httpbin.clone(),
    }))
    .with_tool(Arc::new(CompleteDatasetTool {
        client: client.clone(),
        base_url: jsonplaceholder,
    }))
    .with_tool(Arc::new(UuidTool {
        client,
        base_url: httpbin,
    }))
}

struct TodosTool {
    client: Client,
    base_url: String,
}

#[async_trait]
impl Tool for TodosTool {
    fn name(&self) -> &'static str {
        "jsonplaceholder_todos"
    }

    fn description(&self) -> &'static str {
        "Get todo items from JSONPlaceholder API for testing"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "limit": limit_schema(20, 10, "todos"),
                "completed": {
                    "type": "boolean",
                    "description": "Filter by completion status"
                },
                "user_id": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Filter by user ID"
                }
            }
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let limit = clamped_u64(&params, "limit", 10, 1, 20);
        let completed = params["completed"].as_bool();
        let user_id = params["user_id"].as_u64();

        let mut req = self.client.get(format!("{}/todos", self.base_url));
        if let Some(completed) = completed {
            req = req.query(&[("completed", completed)]);
        }
        if let Some(id) = user_id {
            req = req.query(&[("userId", id)]);
        }
        let result = fetch(req).await.map(|data| {
            let (total, todos) = head(&data, limit);
            json!({
                "source": "JSONPlaceholder API",
                "total_todos": total,
                "returned_todos": todos.len(),
                "filters": {"completed": completed, "user_id": user_id},
                "todos": todos,
                "fetched_at": Utc::now().to_rfc3339(),
            })
        });
        Ok(ToolResult::from_json_result(result, "fetching todos"))
    }
}

struct AlbumsTool {
    client: Client,
    base_url: String,
}

#[async_trait]
impl Tool for AlbumsTool {
    fn name(&self) -> &'static str {
        "jsonplaceholder_albums"
    }

    fn description(&self) -> &'static str {
        "Get photo albums from JSONPlaceholder API for testing"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "limit": limit_schema(20, 10, "albums"),
                "user_id": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Filter by user ID"
                }
            }
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let limit = clamped_u64(&params, "limit", 10, 1, 20);
        let user_id = params["user_id"].as_u64();

        let mut req = self.client.get(format!("{}/albums", self.base_url));
        if let Some(id) = user_id {
            req = req.query(&[("userId", id)]);
        }
        let result = fetch(req).await.map(|data| {
            let (total, albums) = head(&data, limit);
            json!({
                "source": "JSONPlaceholder API",
                "total_albums": total,
                "returned_albums": albums.len(),
                "filter_user_id": user_id,
                "albums": albums,
                "fetched_at": Utc::now().to_rfc3339(),
            })
        });
        Ok(ToolResult::from_json_result(result, "fetching albums"))
    }
}

struct PhotosTool {
    client: Client,
    base_url: String,
}

#[async_trait]
impl Tool for PhotosTool {
    fn name(&self) -> &'static str {
        "jsonplaceholder_photos"
    }

    fn description(&self) -> &'static str {
        "Get photos from JSONPlaceholder API for testing"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "limit": limit_schema(50, 20, "photos"),
                "album_id": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Filter by album ID"
                }
            }
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let limit = clamped_u64(&params, "limit", 20, 1, 50);
        let album_id = params["album_id"].as_u64();

        let mut req = self.client.get(format!("{}/photos", self.base_url));
        if let Some(id) = album_id {
            req = req.query(&[("albumId", id)]);
        }
        let result = fetch(req).await.map(|data| {
            let (total, photos) = head(&data, limit);
            let photos: Vec<Value> = photos
                .iter()
                .map(|p| {
                    json!({
                        "id": p["id"],
                        "title": p["title"],
                        "url": p["url"],
                        "thumbnail_url": p["thumbnailUrl"],
                        "album_id": p["albumId"],
                    })
                })
                .collect();
            json!({
                "source": "JSONPlaceholder API",
                "total_photos": total,
                "returned_photos": photos.len(),
                "filter_album_id": album_id,
                "photos": photos,
                "fetched_at": Utc::now().to_rfc3339(),
            })
        });
        Ok(ToolResult::from_json_result(result, "fetching photos"))
    }
}

struct HttpBinTool {
    client: Client,
    base_url: String,
}

impl HttpBinTool {
    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        data: Option<&str>,
        headers: &Map<String, Value>,
    ) -> Result<Value> {
        let mut req = self
            .client
            .request(method.clone(), format!("{}{}", self.base_url, endpoint))
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        for (name, value) in headers {
            if let Some(value) = value.as_str() {
                req = req.header(name.as_str(), value);
            }
        }
        if let Some(data) = data
            && matches!(method, Method::POST | Method::PUT | Method::PATCH)
        {
            req = req.body(data.to_string());
        }

        let resp = req.send().await.context("request failed")?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            );
        }
        let response_headers: Map<String, Value> = resp
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    Value::String(String::from_utf8_lossy(v.as_bytes()).into_owned()),
                )
            })
            .collect();
        let (bytes, truncated) = limited_body(resp, MAX_JSON_BYTES).await?;
        if truncated {
            anyhow::bail!("response body exceeded {} bytes", MAX_JSON_BYTES);
        }
        let result: Value =
            serde_json::from_slice(&bytes).context("response was not valid JSON")?;

        Ok(json!({
            "source": "HTTPBin API",
            "method": method.as_str(),
            "endpoint": endpoint,
            "status_code": status.as_u16(),
            "status_text": status.canonical_reason().unwrap_or_default(),
            "response_headers": response_headers,
            "result": result,
            "sent_data": data,
            "sent_headers": headers,
            "fetched_at": Utc::now().to_rfc3339(),
        }))
    }
}

#[async_trait]
impl Tool for HttpBinTool {
    fn name(&self) -> &'static str {
        "httpbin_test"
    }

    fn description(&self) -> &'static str {
        "Test HTTP requests with HTTPBin API"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "method": {
                    "type": "string",
                    "enum": ["get", "post", "put", "patch", "delete"],
                    "default": "get",
                    "description": "HTTP method to test"
                },
                "endpoint": {
                    "type": "string",
                    "default": "/get",
                    "description": "HTTPBin endpoint to test"
                },
                "data": {
                    "type": "string",
                    "description": "Data to send (for POST/PUT/PATCH)"
                },
                "headers": {
                    "type": "object",
                    "additionalProperties": {"type": "string"},
                    "description": "Custom headers to send"
                }
            }
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let method = match optional_str(&params, "method").unwrap_or("get") {
            "get" => Method::GET,
            "post" => Method::POST,
            "put" => Method::PUT,
            "patch" => Method::PATCH,
            "delete" => Method::DELETE,
            other => return Ok(ToolResult::error(format!("Unsupported method '{}'", other))),
        };
        let endpoint = optional_str(&params, "endpoint").unwrap_or("/get");
        // Appended to the base URL, so it has to be a path.
        if !endpoint.starts_with('/') {
            return Ok(ToolResult::error(format!(
                "Invalid endpoint '{}': must start with '/'",
                endpoint
            )));
        }
        let data = optional_str(&params, "data");
        let headers = params["headers"].as_object().cloned().unwrap_or_default();

        let result = self.send(method, endpoint, data, &headers).await;
        Ok(ToolResult::from_json_result(result, "testing HTTP request"))
    }
}

struct CompleteDatasetTool {
    client: Client,
    base_url: String,
}

#[async_trait]
impl Tool for CompleteDatasetTool {
    fn name(&self) -> &'static str {
        "jsonplaceholder_complete"
    }

    fn description(&self) -> &'static str {
        "Get complete dataset from JSONPlaceholder API"
    }

    fn parameters(&self) -> Value {
        let properties: Map<String, Value> = DATASETS
            .iter()
            .map(|name| {
                (
                    format!("include_{name}"),
                    json!({
                        "type": "boolean",
                        "default": true,
                        "description": format!("Include {name} data")
                    }),
                )
            })
            .collect();
        json!({"type": "object", "properties": properties})
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let wanted: Vec<&str> = DATASETS
            .into_iter()
            .filter(|name| {
                params[format!("include_{name}")]
                    .as_bool()
                    .unwrap_or(true)
            })
            .collect();

        let fetches = wanted.iter().map(|name| async move {
            let data = fetch(self.client.get(format!("{}/{}", self.base_url, name))).await?;
            Ok::<_, anyhow::Error>((*name, data))
        });
        let result = futures_util::future::try_join_all(fetches)
            .await
            .map(|datasets| {
                let summary: Map<String, Value> = DATASETS
                    .iter()
                    .map(|name| {
                        let count = datasets
                            .iter()
                            .find(|(n, _)| n == name)
                            .and_then(|(_, d)| d.as_array())
                            .map_or(0, Vec::len);
                        ((*name).to_string(), json!(count))
                    })
                    .collect();
                let data: Map<String, Value> = datasets
                    .into_iter()
                    .map(|(name, d)| (name.to_string(), d))
                    .collect();
                json!({
                    "source": "JSONPlaceholder API",
                    "fetched_at": Utc::now().to_rfc3339(),
                    "data": data,
                    "summary": summary,
                })
            });
        Ok(ToolResult::from_json_result(result, "fetching complete dataset"))
    }
}

struct UuidTool {
    client: Client,
    base_url: String,
}

#[async_trait]
impl Tool for UuidTool {
    fn name(&self) -> &'static str {
        "uuid_generator"
    }

    fn description(&self) -> &'static str {
        "Generate UUIDs using HTTPBin UUID service"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "count": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 100,
                    "default": 1,
                    "description": "Number of UUIDs to generate (1-100)"
                }
            }
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let count = clamped_u64(&params, "count", 1, 1, 100);
        let url = format!("{}/uuid", self.base_url);

        let result: Result<Vec<Value>> = stream::iter(0..count)
            .map(|_| {
                let req = self.client.get(&url);
                async move {
                    let data = fetch(req).await?;
                    Ok(data["uuid"].clone())
                }
            })
            .buffered(MAX_CONCURRENT_UUID_REQUESTS)
            .try_collect()
            .await;

        let result = result.map(|uuids| {
            json!({
                "source": "HTTPBin UUID API",
                "total_uuids": uuids.len(),
                "uuids": uuids,
                "fetched_at": Utc::now().to_rfc3339(),
            })
        });
        Ok(ToolResult::from_json_result(result, "generating UUIDs"))
    }
}

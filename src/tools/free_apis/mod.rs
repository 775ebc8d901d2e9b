use crate::tools::base::{Adapter, clamped_u64, optional_str};
use crate::tools::{Tool, ToolResult};
use crate::utils::http::{default_http_client, send_json};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, RequestBuilder};
use serde_json::{Value, json};
use std::sync::Arc;

pub const ADAPTER_NAME: &str = "free-apis";

/// Base URLs of the keyless public APIs.
#[derive(Debug, Clone)]
pub(crate) struct Endpoints {
    pub jsonplaceholder: String,
    pub quotable: String,
    pub random_user: String,
    pub cat_facts: String,
    pub dog_ceo: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            jsonplaceholder: "https://jsonplaceholder.typicode.com".to_string(),
            quotable: "https://api.quotable.io".to_string(),
            random_user: "https://randomuser.me".to_string(),
            cat_facts: "https://catfact.ninja".to_string(),
            dog_ceo: "https://dog.ceo".to_string(),
        }
    }
}

pub fn adapter() -> Adapter {
    adapter_with_endpoints(Endpoints::default())
}

pub(crate) fn adapter_with_endpoints(endpoints: Endpoints) -> Adapter {
    let client = default_http_client();
    let trim = |s: &str| s.trim_end_matches('/').to_string();
    let jsonplaceholder = trim(&endpoints.jsonplaceholder);
    Adapter::new(
        ADAPTER_NAME,
        "Collection of free APIs for testing and development",
    )
    .with_tool(Arc::new(UsersTool {
        client: client.clone(),
        base_url: jsonplaceholder.clone(),
    }))
    .with_tool(Arc::new(PostsTool {
        client: client.clone(),
        base_url: jsonplaceholder.clone(),
    }))
    .with_tool(Arc::new(CommentsTool {
        client: client.clone(),
        base_url: jsonplaceholder,
    }))
    .with_tool(Arc::new(QuotesTool {
        client: client.clone(),
        base_url: trim(&endpoints.quotable),
    }))
    .with_tool(Arc::new(RandomUserTool {
        client: client.clone(),
        base_url: trim(&endpoints.random_user),
    }))
    .with_tool(Arc::new(CatFactsTool {
        client: client.clone(),
        base_url: trim(&endpoints.cat_facts),
    }))
    .with_tool(Arc::new(DogImagesTool {
        client,
        base_url: trim(&endpoints.dog_ceo),
    }))
}

pub(crate) async fn fetch(req: RequestBuilder) -> Result<Value> {
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

pub(crate) fn limit_schema(max: u64, default: u64, what: &str) -> Value {
    json!({
        "type": "integer",
        "minimum": 1,
        "maximum": max,
        "default": default,
        "description": format!("Number of {what} to fetch (1-{max})")
    })
}

/// First `limit` entries of a JSON array (an empty list for anything else).
pub(crate) fn head(data: &Value, limit: u64) -> (usize, Vec<Value>) {
    let all = data.as_array().map(|a| a.as_slice()).unwrap_or_default();
    let take = usize::try_from(limit).unwrap_or(usize::MAX);
    (all.len(), all.iter().take(take).cloned().collect())
}

/// Dog CEO breed paths: `breed` or `breed/sub-breed`, lowercase letters only.
fn is_valid_breed(breed: &str) -> bool {
    let segment = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_lowercase());
    match breed.split_once('/') {
        Some((main, sub)) => segment(main) && segment(sub),
        None => segment(breed),
    }
}

struct UsersTool {
    client: Client,
    base_url: String,
}

#[async_trait]
impl Tool for UsersTool {
    fn name(&self) -> &'static str {
        "jsonplaceholder_users"
    }

    fn description(&self) -> &'static str {
        "Get fake user data from JSONPlaceholder API for testing"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"limit": limit_schema(10, 5, "users")}
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let limit = clamped_u64(&params, "limit", 5, 1, 10);
        let req = self.client.get(format!("{}/users", self.base_url));
        let result = fetch(req).await.map(|data| {
            let (total, users) = head(&data, limit);
            json!({
                "source": "JSONPlaceholder API",
                "total_users": total,
                "returned_users": users.len(),
                "users": users,
                "fetched_at": Utc::now().to_rfc3339(),
            })
        });
        Ok(ToolResult::from_json_result(result, "fetching users"))
    }
}

struct PostsTool {
    client: Client,
    base_url: String,
}

#[async_trait]
impl Tool for PostsTool {
    fn name(&self) -> &'static str {
        "jsonplaceholder_posts"
    }

    fn description(&self) -> &'static str {
        "Get fake blog posts from JSONPlaceholder API for testing"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "limit": limit_schema(20, 10, "posts"),
                "user_id": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Filter posts by user ID"
                }
            }
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let limit = clamped_u64(&params, "limit", 10, 1, 20);
        let user_id = params["user_id"].as_u64();

        let mut req = self.client.get(format!("{}/posts", self.base_url));
        if let Some(id) = user_id {
            req = req.query(&[("userId", id)]);
        }
        let result = fetch(req).await.map(|data| {
            let (total, posts) = head(&data, limit);
            json!({
                "source": "JSONPlaceholder API",
                "total_posts": total,
                "returned_posts": posts.len(),
                "filter_user_id": user_id,
                "posts": posts,
                "fetched_at": Utc::now().to_rfc3339(),
            })
        });
        Ok(ToolResult::from_json_result(result, "fetching posts"))
    }
}

struct CommentsTool {
    client: Client,
    base_url: String,
}

#[async_trait]
impl Tool for CommentsTool {
    fn name(&self) -> &'static str {
        "jsonplaceholder_comments"
    }

    fn description(&self) -> &'static str {
        "Get fake comments from JSONPlaceholder API for testing"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "limit": limit_schema(20, 10, "comments"),
                "post_id": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Filter comments by post ID"
                }
            }
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let limit = clamped_u64(&params, "limit", 10, 1, 20);
        let post_id = params["post_id"].as_u64();

        let mut req = self.client.get(format!("{}/comments", self.base_url));
        if let Some(id) = post_id {
            req = req.query(&[("postId", id)]);
        }
        let result = fetch(req).await.map(|data| {
            let (total, comments) = head(&data, limit);
            json!({
                "source": "JSONPlaceholder API",
                "total_comments": total,
                "returned_comments": comments.len(),
                "filter_post_id": post_id,
                "comments": comments,
                "fetched_at": Utc::now().to_rfc3339(),
            })
        });
        Ok(ToolResult::from_json_result(result, "fetching comments"))
    }
}

struct QuotesTool {
    client: Client,
    base_url: String,
}

#[async_trait]
impl Tool for QuotesTool {
    fn name(&self) -> &'static str {
        "quotes_api"
    }

    fn description(&self) -> &'static str {
        "Get inspirational quotes from Quotes REST API"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "limit": limit_schema(20, 5, "quotes"),
                "author": {
                    "type": "string",
                    "description": "Filter quotes by author name"
                },
                "tags": {
                    "type": "string",
                    "description": "Filter quotes by tags (comma-separated)"
                }
            }
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let limit = clamped_u64(&params, "limit", 5, 1, 20);
        let author = optional_str(&params, "author");
        let tags = optional_str(&params, "tags");

        let mut query = vec![("limit", limit.to_string())];
        if let Some(author) = author {
            query.push(("author", author.to_string()));
        }
        if let Some(tags) = tags {
            query.push(("tags", tags.to_string()));
        }
        let req = self
            .client
            .get(format!("{}/quotes", self.base_url))
            .query(&query);
        let result = fetch(req).await.map(|data| {
            // Paginated responses wrap the list in `results`; older ones are a bare array.
            let quotes = match data.get("results") {
                Some(results) => results.clone(),
                None => data.clone(),
            };
            let returned = quotes.as_array().map_or(0, Vec::len);
            json!({
                "source": "Quotable API",
                "total_quotes": data["count"].as_u64().unwrap_or(returned as u64),
                "returned_quotes": returned,
                "filter_author": author,
                "filter_tags": tags,
                "quotes": quotes,
                "fetched_at": Utc::now().to_rfc3339(),
            })
        });
        Ok(ToolResult::from_json_result(result, "fetching quotes"))
    }
}

struct RandomUserTool {
    client: Client,
    base_url: String,
}

#[async_trait]
impl Tool for RandomUserTool {
    fn name(&self) -> &'static str {
        "random_user_api"
    }

    fn description(&self) -> &'static str {
        "Generate random user data using Random User Generator API"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "limit": limit_schema(10, 1, "users to generate"),
                "gender": {
                    "type": "string",
                    "enum": ["male", "female"],
                    "description": "Filter by gender"
                },
                "nationality": {
                    "type": "string",
                    "description": "Filter by nationality (e.g., 'US', 'GB', 'DE')"
                }
            }
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let limit = clamped_u64(&params, "limit", 1, 1, 10);
        let gender = optional_str(&params, "gender");
        let nationality = optional_str(&params, "nationality");

        let mut query = vec![("results", limit.to_string())];
        if let Some(gender) = gender {
            query.push(("gender", gender.to_string()));
        }
        if let Some(nat) = nationality {
            query.push(("nat", nat.to_string()));
        }
        let req = self
            .client
            .get(format!("{}/api/", self.base_url))
            .query(&query);
        let result = fetch(req).await.map(|data| {
            let users = data["results"].as_array().cloned().unwrap_or_default();
            json!({
                "source": "Random User Generator API",
                "total_users": users.len(),
                "filter_gender": gender,
                "filter_nationality": nationality,
                "users": users,
                "fetched_at": Utc::now().to_rfc3339(),
            })
        });
        Ok(ToolResult::from_json_result(result, "generating random users"))
    }
}

struct CatFactsTool {
    client: Client,
    base_url: String,
}

#[async_trait]
impl Tool for CatFactsTool {
    fn name(&self) -> &'static str {
        "cat_facts_api"
    }

    fn description(&self) -> &'static str {
        "Get random cat facts from Cat Facts API"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"limit": limit_schema(10, 3, "cat facts")}
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let limit = clamped_u64(&params, "limit", 3, 1, 10);
        let mut facts = Vec::new();
        // The API serves one fact per request.
        for _ in 0..limit {
            match fetch(self.client.get(format!("{}/fact", self.base_url))).await {
                Ok(fact) => facts.push(fact),
                Err(e) => return Ok(ToolResult::error(format!("Error fetching cat facts: {e}"))),
            }
        }
        Ok(ToolResult::json(json!({
            "source": "Cat Facts API",
            "total_facts": facts.len(),
            "facts": facts,
            "fetched_at": Utc::now().to_rfc3339(),
        })))
    }
}

struct DogImagesTool {
    client: Client,
    base_url: String,
}

#[async_trait]
impl Tool for DogImagesTool {
    fn name(&self) -> &'static str {
        "dog_images_api"
    }

    fn description(&self) -> &'static str {
        "Get random dog images from Dog CEO API"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "limit": limit_schema(10, 3, "dog images"),
                "breed": {
                    "type": "string",
                    "description": "Filter by dog breed (e.g., 'hound', 'poodle', 'retriever')"
                }
            }
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let limit = clamped_u64(&params, "limit", 3, 1, 10);
        let breed = optional_str(&params, "breed").map(str::to_lowercase);
        if let Some(breed) = &breed
            && !is_valid_breed(breed)
        {
            return Ok(ToolResult::error(format!(
                "Invalid breed '{}': expected a name like 'hound' or 'hound/afghan'",
                breed
            )));
        }

        let url = match &breed {
            Some(breed) => format!("{}/api/breed/{}/images/random/{}", self.base_url, breed, limit),
            None => format!("{}/api/breeds/image/random/{}", self.base_url, limit),
        };
        let result = fetch(self.client.get(url)).await.map(|data| {
            let urls: Vec<Value> = match &data["message"] {
                Value::Array(items) => items.clone(),
                Value::String(single) => vec![Value::String(single.clone())],
                _ => Vec::new(),
            };
            let images: Vec<Value> = urls
                .iter()
                .enumerate()
                .map(|(i, url)| {
                    json!({
                        "id": format!("dog_{i}"),
                        "url": url,
                        "breed": breed.as_deref().unwrap_or("random"),
                    })
                })
                .collect();
            json!({
                "source": "Dog CEO API",
                "total_images": images.len(),
                "filter_breed": breed,
                "images": images,
                "fetched_at": Utc::now().to_rfc3339(),
            })
        });
        Ok(ToolResult::from_json_result(result, "fetching dog images"))
    }
}

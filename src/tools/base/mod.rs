use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// One piece of a tool's output. Transports decide how each kind is put on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolContent {
    Text(String),
    Json(Value),
}

impl ToolContent {
    /// Render this part as text. JSON is pretty-printed.
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Json(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub content: Vec<ToolContent>,
    pub is_error: bool,
}

impl ToolResult {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text(content.into())],
            is_error: false,
        }
    }

    pub fn json(value: Value) -> Self {
        Self {
            content: vec![ToolContent::Json(value)],
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text(content.into())],
            is_error: true,
        }
    }

    /// Structured failure envelope, e.g. `{"success": false, "error": ...}`.
    pub fn error_json(value: Value) -> Self {
        Self {
            content: vec![ToolContent::Json(value)],
            is_error: true,
        }
    }

    pub fn from_parts(content: Vec<ToolContent>) -> Self {
        Self {
            content,
            is_error: false,
        }
    }

    /// Convert a `Result<Value>` into a `ToolResult`, formatting errors with
    /// the given context (e.g. `"fetching weather"` -> `"Error fetching weather: ..."`).
    pub fn from_json_result(result: anyhow::Result<Value>, context: &str) -> Self {
        match result {
            Ok(value) => Self::json(value),
            Err(e) => Self::error(format!("Error {}: {}", context, e)),
        }
    }

    /// All content parts rendered as text and joined by newlines.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .map(ToolContent::to_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl std::fmt::Display for ToolResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text())
    }
}

/// Tool version information
#[derive(Debug, Clone)]
pub struct ToolVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ToolVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl std::fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl Default for ToolVersion {
    fn default() -> Self {
        Self::new(1, 0, 0)
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> Value; // JSON Schema

    async fn execute(&self, params: Value) -> anyhow::Result<ToolResult>;

    /// Get tool version (defaults to 1.0.0)
    fn version(&self) -> ToolVersion {
        ToolVersion::default()
    }

    /// Per-tool execution timeout. Overrides the registry-level default.
    fn execution_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(120)
    }

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
            version: self.version().to_string(),
        }
    }
}

/// Catalog entry handed to transports for discovery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Value,
    pub version: String,
}

/// A named bundle of related tools; the unit of registration.
#[derive(Clone)]
pub struct Adapter {
    pub name: String,
    pub description: String,
    pub tools: Vec<Arc<dyn Tool>>,
}

impl Adapter {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            tools: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }
}

impl std::fmt::Debug for Adapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adapter")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("tools", &self.tool_names())
            .finish()
    }
}

/// Middleware that can intercept tool execution for cross-cutting concerns
/// like truncation and logging.
#[async_trait]
pub trait ToolMiddleware: Send + Sync {
    /// Called before tool execution. Return `Some` to short-circuit.
    async fn before_execute(
        &self,
        _name: &str,
        _params: &Value,
        _tool: &dyn Tool,
    ) -> Option<ToolResult> {
        None
    }

    /// Called after tool execution. Can modify the result (e.g., truncation).
    async fn after_execute(
        &self,
        _name: &str,
        _params: &Value,
        _tool: &dyn Tool,
        _result: &mut ToolResult,
    ) {
    }
}

/// Read a `u64` parameter, falling back to `default` and clamping into `[min, max]`.
pub fn clamped_u64(params: &Value, key: &str, default: u64, min: u64, max: u64) -> u64 {
    params[key]
        .as_u64()
        .or_else(|| params[key].as_f64().map(|f| f.max(0.0) as u64))
        .unwrap_or(default)
        .clamp(min, max)
}

/// Read an optional non-empty string parameter.
pub fn optional_str<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params[key].as_str().map(str::trim).filter(|s| !s.is_empty())
}

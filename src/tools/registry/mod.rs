use crate::tools::base::{Adapter, ToolDescriptor, ToolMiddleware};
use crate::tools::{Tool, ToolResult};
use crate::utils::truncation::truncate_text;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

const DEFAULT_MAX_RESULT_CHARS: usize = 50_000;
const MAX_TOOL_NAME_LEN: usize = 256;
/// Cap on how many schema violations are echoed back to the caller.
const MAX_REPORTED_VIOLATIONS: usize = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Tool '{0}' not found")]
    ToolNotFound(String),

    #[error("Invalid arguments for tool '{tool}': {details}")]
    InvalidArguments { tool: String, details: String },

    #[error("Invalid tool name (len={len})")]
    InvalidName { len: usize },

    #[error("Adapter '{adapter}' collides with already registered names: {names:?}")]
    Duplicate { adapter: String, names: Vec<String> },
}

fn is_valid_tool_name(name: &str) -> bool {
    !name.is_empty() && name.len() <= MAX_TOOL_NAME_LEN && !name.chars().any(char::is_control)
}

/// Process-wide tool catalog. Aggregates adapters and resolves tool names to handlers.
///
/// Holds two mappings: adapter name -> adapter and tool name -> tool. Registration keeps
/// them in sync, so every tool reachable through an adapter is also reachable by name.
pub struct ToolRegistry {
    adapters: HashMap<String, Adapter>,
    tools: HashMap<String, Arc<dyn Tool>>,
    middleware: Vec<Arc<dyn ToolMiddleware>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::with_max_result_chars(DEFAULT_MAX_RESULT_CHARS)
    }

    pub fn with_max_result_chars(max_result_chars: usize) -> Self {
        Self {
            adapters: HashMap::new(),
            tools: HashMap::new(),
            middleware: vec![
                Arc::new(TruncationMiddleware::new(max_result_chars)),
                Arc::new(LoggingMiddleware),
            ],
        }
    }

    /// Register an adapter and all of its tools.
    ///
    /// Never fails. A tool whose name is already bound replaces the earlier binding
    /// (last registration wins); the replaced names are logged and returned so callers
    /// can surface the collision. Tools with invalid names are skipped.
    pub fn register(&mut self, mut adapter: Adapter) -> Vec<String> {
        let mut overwritten = Vec::new();
        let adapter_name = adapter.name.clone();

        if self.adapters.contains_key(&adapter_name) {
            warn!("tool registry: replacing adapter '{}'", adapter_name);
        }

        // Invalid tools leave the adapter too, so its tool list matches the name map.
        adapter.tools.retain(|tool| {
            let name = tool.name();
            let valid = is_valid_tool_name(name);
            if !valid {
                warn!(
                    "tool registry: skipping tool with invalid name in adapter '{}' (len={}, has_control_chars={})",
                    adapter_name,
                    name.len(),
                    name.chars().any(char::is_control)
                );
            }
            valid
        });

        for tool in &adapter.tools {
            let name = tool.name().to_string();
            if self.tools.contains_key(&name) {
                warn!(
                    "tool registry: overwriting duplicate tool '{}' (now provided by adapter '{}')",
                    name, adapter_name
                );
                overwritten.push(name.clone());
            }
            self.tools.insert(name, tool.clone());
        }

        debug!(
            "tool registry: registered adapter '{}' with {} tools",
            adapter_name,
            adapter.tools.len()
        );
        self.adapters.insert(adapter_name, adapter);
        overwritten
    }

    /// Register an adapter only if none of its names collide with existing bindings.
    ///
    /// On error nothing is mutated.
    pub fn register_strict(&mut self, adapter: Adapter) -> Result<(), RegistryError> {
        let mut seen = HashSet::new();
        let mut collisions = Vec::new();

        if self.adapters.contains_key(&adapter.name) {
            collisions.push(adapter.name.clone());
        }
        for tool in &adapter.tools {
            let name = tool.name();
            if !is_valid_tool_name(name) {
                return Err(RegistryError::InvalidName { len: name.len() });
            }
            if self.tools.contains_key(name) || !seen.insert(name) {
                collisions.push(name.to_string());
            }
        }

        if !collisions.is_empty() {
            return Err(RegistryError::Duplicate {
                adapter: adapter.name.clone(),
                names: collisions,
            });
        }

        self.register(adapter);
        Ok(())
    }

    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Snapshot of every registered tool, sorted by name.
    pub fn get_all_tools(&self) -> Vec<Arc<dyn Tool>> {
        let mut tools: Vec<_> = self.tools.values().cloned().collect();
        tools.sort_by(|a, b| a.name().cmp(b.name()));
        tools
    }

    pub fn get_adapter(&self, name: &str) -> Option<&Adapter> {
        self.adapters.get(name)
    }

    /// All registered adapters, sorted by name.
    pub fn get_all_adapters(&self) -> Vec<&Adapter> {
        let mut adapters: Vec<_> = self.adapters.values().collect();
        adapters.sort_by(|a, b| a.name.cmp(&b.name));
        adapters
    }

    /// Returns a sorted list of all registered tool names.
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Flat catalog for transports: name, description and parameter schema per tool.
    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.get_all_tools()
            .iter()
            .map(|t| t.descriptor())
            .collect()
    }

    /// Resolve `name` and run it. Never fails: lookup errors, schema violations,
    /// handler errors, timeouts and panics all come back as `ToolResult::error`.
    pub async fn invoke(&self, name: &str, args: Value) -> ToolResult {
        let Some(tool) = self.get_tool(name) else {
            warn!("tool registry: unknown tool '{}'", name);
            return ToolResult::error(RegistryError::ToolNotFound(name.to_string()).to_string());
        };

        let args = if args.is_null() {
            Value::Object(serde_json::Map::new())
        } else {
            args
        };

        if let Err(e) = validate_args(name, &tool.parameters(), &args) {
            warn!("{}", e);
            return ToolResult::error(e.to_string());
        }

        for mw in &self.middleware {
            if let Some(result) = mw.before_execute(name, &args, tool.as_ref()).await {
                return result;
            }
        }

        let mut result = execute_with_guards(name, tool.clone(), args.clone()).await;

        for mw in &self.middleware {
            mw.after_execute(name, &args, tool.as_ref(), &mut result)
                .await;
        }

        result
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Check `args` against the tool's JSON Schema. A schema that fails to compile is
/// logged and treated as permissive.
fn validate_args(name: &str, schema: &Value, args: &Value) -> Result<(), RegistryError> {
    let validator = match jsonschema::validator_for(schema) {
        Ok(v) => v,
        Err(e) => {
            warn!("tool '{}' has an invalid parameter schema: {}", name, e);
            return Ok(());
        }
    };

    let violations: Vec<String> = validator
        .iter_errors(args)
        .take(MAX_REPORTED_VIOLATIONS)
        .map(|e| e.to_string())
        .collect();
    if violations.is_empty() {
        Ok(())
    } else {
        Err(RegistryError::InvalidArguments {
            tool: name.to_string(),
            details: violations.join("; "),
        })
    }
}

/// Execute a tool in a spawned `tokio::task` with timeout and panic isolation.
///
/// Panics are caught via `JoinError::is_panic` and timeouts are enforced with
/// `tokio::time::timeout`; both come back as `ToolResult::error`.
async fn execute_with_guards(name: &str, tool: Arc<dyn Tool>, params: Value) -> ToolResult {
    let tool_name = name.to_string();
    let timeout = tool.execution_timeout();
    let timeout_secs = timeout.as_secs();

    let handle =
        tokio::task::spawn(async move { tokio::time::timeout(timeout, tool.execute(params)).await });

    match handle.await {
        Ok(Ok(Ok(result))) => result,
        Ok(Ok(Err(e))) => {
            warn!("Tool '{}' failed: {}", tool_name, e);
            ToolResult::error(format!("Error: {}", e))
        }
        Ok(Err(_)) => {
            warn!("Tool '{}' timed out after {}s", tool_name, timeout_secs);
            ToolResult::error(format!(
                "Tool '{}' timed out after {}s",
                tool_name, timeout_secs
            ))
        }
        Err(join_err) => {
            if join_err.is_panic() {
                // into_panic() consumes the JoinError so we must extract in one step.
                let panic_payload = join_err.into_panic();
                let panic_msg = panic_payload
                    .downcast_ref::<String>()
                    .map(String::as_str)
                    .or_else(|| panic_payload.downcast_ref::<&str>().copied())
                    .unwrap_or("unknown cause");
                error!("Tool '{}' panicked: {}", tool_name, panic_msg);
                ToolResult::error(format!("Tool '{}' crashed: {}", tool_name, panic_msg))
            } else {
                error!("Tool '{}' was cancelled", tool_name);
                ToolResult::error(format!("Tool '{}' was cancelled", tool_name))
            }
        }
    }
}

// --- Middleware implementations ---

/// Caps the rendered size of a tool result.
pub struct TruncationMiddleware {
    max_chars: usize,
}

impl TruncationMiddleware {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }
}

#[async_trait::async_trait]
impl ToolMiddleware for TruncationMiddleware {
    async fn after_execute(
        &self,
        _name: &str,
        _params: &Value,
        _tool: &dyn Tool,
        result: &mut ToolResult,
    ) {
        let text = result.text();
        if text.len() > self.max_chars {
            result.content = vec![crate::tools::ToolContent::Text(truncate_text(
                &text,
                self.max_chars,
            ))];
        }
    }
}

/// Logs tool invocations and outcomes.
pub struct LoggingMiddleware;

#[async_trait::async_trait]
impl ToolMiddleware for LoggingMiddleware {
    async fn before_execute(
        &self,
        name: &str,
        params: &Value,
        _tool: &dyn Tool,
    ) -> Option<ToolResult> {
        debug!("Executing tool: {} with arguments: {}", name, params);
        None
    }

    async fn after_execute(
        &self,
        name: &str,
        _params: &Value,
        _tool: &dyn Tool,
        result: &mut ToolResult,
    ) {
        if result.is_error {
            warn!("Tool '{}' returned error: {}", name, result.text());
        } else {
            info!("Tool '{}' completed ({} parts)", name, result.content.len());
        }
    }
}

use crate::tools::base::ToolDescriptor;
use crate::tools::{ToolContent, ToolRegistry, ToolResult};
use anyhow::Result;
use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler, ServiceExt,
    model::{
        CallToolRequestParam, CallToolResult, Content, Implementation, ListToolsResult, Meta,
        PaginatedRequestParam, ProtocolVersion, ServerCapabilities, ServerInfo, Tool,
    },
    service::RequestContext,
    transport::stdio,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info};

/// MCP front end over the tool registry. Holds no state of its own.
#[derive(Clone)]
pub struct McpServer {
    registry: Arc<ToolRegistry>,
}

impl McpServer {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Serve over stdin/stdout until the client disconnects.
    pub async fn serve_stdio(self) -> Result<()> {
        info!(
            "serving {} tools over stdio",
            self.registry.len()
        );
        let service = self.serve(stdio()).await.inspect_err(|e| {
            error!("serving error: {e:?}");
        })?;
        service.waiting().await?;
        info!("stdio server stopped");
        Ok(())
    }
}

pub(crate) fn to_mcp_tool(descriptor: ToolDescriptor) -> Tool {
    let input_schema = match descriptor.parameters {
        Value::Object(obj) => Arc::new(obj),
        _ => Arc::new(serde_json::Map::new()),
    };
    let mut meta = Meta::new();
    meta.0
        .insert("version".to_string(), Value::String(descriptor.version));
    Tool {
        name: descriptor.name.into(),
        title: None,
        description: Some(descriptor.description.into()),
        input_schema,
        output_schema: None,
        annotations: None,
        icons: None,
        meta: Some(meta),
    }
}

/// JSON parts go out as pretty-printed text.
pub(crate) fn to_call_result(result: ToolResult) -> CallToolResult {
    let content: Vec<Content> = result
        .content
        .iter()
        .map(|part| match part {
            ToolContent::Text(text) => Content::text(text.clone()),
            ToolContent::Json(_) => Content::text(part.to_text()),
        })
        .collect();
    if result.is_error {
        CallToolResult::error(content)
    } else {
        CallToolResult::success(content)
    }
}

impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "websearch".to_string(),
                title: None,
                version: crate::VERSION.to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Web search, scraping, public data APIs and terminal sessions exposed as tools"
                    .to_string(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        let tools: Vec<Tool> = self
            .registry
            .list_tools()
            .into_iter()
            .map(to_mcp_tool)
            .collect();
        debug!("listing {} tools", tools.len());
        Ok(ListToolsResult::with_all_items(tools))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let args = request.arguments.map_or(Value::Null, Value::Object);
        let result = self.registry.invoke(&request.name, args).await;
        Ok(to_call_result(result))
    }
}

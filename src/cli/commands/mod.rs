use crate::config::load_config;
use crate::server::McpServer;
use crate::tools::setup::build_registry;
use crate::tools::{ToolRegistry, ToolResult};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::fmt::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "websearch")]
#[command(version, about = "Web search, public APIs and terminal sessions as MCP tools")]
pub struct Cli {
    /// Path to config.json (default: ~/.websearch/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the MCP server over stdio
    Serve,
    /// Print the tool catalog
    Tools,
    /// Invoke one tool and print its result
    Call {
        /// Tool name
        name: String,
        /// Arguments as a JSON object
        args: Option<String>,
    },
}

pub async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let registry = build_registry(&config)?;

    match cli.command {
        Commands::Serve => {
            McpServer::new(Arc::new(registry)).serve_stdio().await?;
        }
        Commands::Tools => {
            print!("{}", render_catalog(&registry));
        }
        Commands::Call { name, args } => {
            let result = call(&registry, &name, args.as_deref()).await?;
            println!("{}", result);
            if result.is_error {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// One `name  description` line per tool, sorted by name.
fn render_catalog(registry: &ToolRegistry) -> String {
    let descriptors = registry.list_tools();
    let width = descriptors.iter().map(|d| d.name.len()).max().unwrap_or(0);
    let mut out = String::new();
    for d in descriptors {
        let _ = writeln!(out, "{:width$}  {}", d.name, d.description, width = width);
    }
    out
}

async fn call(registry: &ToolRegistry, name: &str, args: Option<&str>) -> Result<ToolResult> {
    let args = match args {
        Some(raw) => serde_json::from_str::<Value>(raw)
            .with_context(|| format!("arguments for '{}' are not valid JSON", name))?,
        None => Value::Null,
    };
    Ok(registry.invoke(name, args).await)
}

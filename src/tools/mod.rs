pub mod base;
pub mod finance;
pub mod free_apis;
pub mod productivity;
pub mod registry;
pub mod setup;
pub mod system;
pub mod terminal;
pub mod weather;
pub mod web;

pub use base::{Adapter, Tool, ToolContent, ToolResult, ToolVersion};
pub use registry::ToolRegistry;

pub mod base;
pub mod filesystem;
pub mod http;
pub mod jobs;
pub mod memory_tools;
pub mod message;
pub mod registry;
pub mod setup;
pub mod shell;
pub mod web;

pub use base::{ExecutionContext, Tool, ToolPermission, ToolResult};
pub use registry::ToolRegistry;

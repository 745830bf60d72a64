use crate::agent::memory::MemoryStore;
use crate::agent::tools::ToolRegistry;
use crate::agent::tools::filesystem::{ListDirTool, ReadFileTool, WriteFileTool};
use crate::agent::tools::http::HttpRequestTool;
use crate::agent::tools::jobs::{JobCreateTool, JobDeleteTool, JobListTool, JobRunTool};
use crate::agent::tools::memory_tools::{
    DailyLogAppendTool, MemoryAppendTool, MemoryTagsTool, SearchLogsTool,
};
use crate::agent::tools::message::SendMessageTool;
use crate::agent::tools::shell::RunCommandTool;
use crate::agent::tools::web::WebSearchTool;
use crate::channels::ChannelWriter;
use crate::config::SecurityMode;
use crate::cron::JobScheduler;
use crate::policy::domain::GatedClient;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

/// Everything the built-in tools need at construction time.
pub struct ToolBuildContext {
    pub workspace: PathBuf,
    pub security_mode: SecurityMode,
    pub exec_timeout: u64,
    pub inline_output_limit: usize,
    /// `host:port` of the running domain proxy, if any.
    pub proxy_addr: Option<String>,
    pub gated_client: Arc<GatedClient>,
    pub memory: Arc<MemoryStore>,
    pub scheduler: Arc<JobScheduler>,
    pub channel_writer: Option<Arc<dyn ChannelWriter>>,
    pub default_channel: String,
    pub web_search_api_key: String,
    pub web_search_max_results: usize,
}

/// Build the registry with every built-in tool.
pub fn register_all_tools(ctx: &ToolBuildContext) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();

    registry.register(Arc::new(ReadFileTool::new(ctx.workspace.clone())))?;
    registry.register(Arc::new(ListDirTool::new(ctx.workspace.clone())))?;
    registry.register(Arc::new(WriteFileTool::new(
        ctx.workspace.clone(),
        ctx.security_mode,
    )))?;
    registry.register(Arc::new(RunCommandTool::new(
        ctx.workspace.clone(),
        ctx.exec_timeout,
        ctx.inline_output_limit,
        ctx.proxy_addr.clone(),
    )))?;
    registry.register(Arc::new(HttpRequestTool::new(ctx.gated_client.clone())))?;
    registry.register(Arc::new(WebSearchTool::new(
        ctx.gated_client.clone(),
        ctx.web_search_api_key.clone(),
        ctx.web_search_max_results,
    )))?;
    registry.register(Arc::new(SendMessageTool::new(ctx.channel_writer.clone())))?;

    registry.register(Arc::new(MemoryAppendTool::new(ctx.memory.clone())))?;
    registry.register(Arc::new(MemoryTagsTool::new(ctx.memory.clone())))?;
    registry.register(Arc::new(DailyLogAppendTool::new(ctx.memory.clone())))?;
    registry.register(Arc::new(SearchLogsTool::new(ctx.memory.clone())))?;

    registry.register(Arc::new(JobCreateTool::new(
        ctx.scheduler.clone(),
        ctx.default_channel.clone(),
    )))?;
    registry.register(Arc::new(JobListTool::new(ctx.scheduler.clone())))?;
    registry.register(Arc::new(JobDeleteTool::new(ctx.scheduler.clone())))?;
    registry.register(Arc::new(JobRunTool::new(ctx.scheduler.clone())))?;

    Ok(registry)
}

use crate::agent::memory::MemoryStore;
use crate::agent::tools::base::{ExecutionContext, Tool, ToolResult, require_str_arg};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

pub struct MemoryAppendTool {
    store: Arc<MemoryStore>,
}

impl MemoryAppendTool {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for MemoryAppendTool {
    fn name(&self) -> &str {
        "memory_append"
    }

    fn description(&self) -> &str {
        "Save a fact to long-term memory, optionally tagged."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "content": {
                    "type": "string",
                    "description": "The fact to remember"
                },
                "tags": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Optional tags for later retrieval"
                }
            },
            "required": ["content"]
        })
    }

    async fn execute(&self, params: Value, _ctx: &ExecutionContext) -> anyhow::Result<ToolResult> {
        let content = require_str_arg(&params, "content")?;
        let tags: Vec<String> = params
            .get("tags")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();
        self.store.append(content, &tags)?;
        Ok(ToolResult::new("remembered"))
    }
}

pub struct MemoryTagsTool {
    store: Arc<MemoryStore>,
}

impl MemoryTagsTool {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for MemoryTagsTool {
    fn name(&self) -> &str {
        "memory_tags"
    }

    fn description(&self) -> &str {
        "List the tags used in long-term memory."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, _params: Value, _ctx: &ExecutionContext) -> anyhow::Result<ToolResult> {
        let tags = self.store.tags()?;
        if tags.is_empty() {
            return Ok(ToolResult::new("no tags"));
        }
        Ok(ToolResult::new(tags.join("\n")))
    }
}

pub struct DailyLogAppendTool {
    store: Arc<MemoryStore>,
}

impl DailyLogAppendTool {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for DailyLogAppendTool {
    fn name(&self) -> &str {
        "daily_log_append"
    }

    fn description(&self) -> &str {
        "Append a timestamped entry to today's log."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "content": {
                    "type": "string",
                    "description": "The entry to log"
                }
            },
            "required": ["content"]
        })
    }

    async fn execute(&self, params: Value, _ctx: &ExecutionContext) -> anyhow::Result<ToolResult> {
        let content = require_str_arg(&params, "content")?;
        self.store.daily_log_append(content)?;
        Ok(ToolResult::new("logged"))
    }
}

pub struct SearchLogsTool {
    store: Arc<MemoryStore>,
}

impl SearchLogsTool {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for SearchLogsTool {
    fn name(&self) -> &str {
        "search_logs"
    }

    fn description(&self) -> &str {
        "Search the daily logs for entries matching a query."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Case-insensitive substring to look for"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, _ctx: &ExecutionContext) -> anyhow::Result<ToolResult> {
        let query = require_str_arg(&params, "query")?;
        let hits = self.store.search_logs(query)?;
        if hits.is_empty() {
            return Ok(ToolResult::new("no matches"));
        }
        let count = hits.len();
        let mut output = hits.join("\n");
        if count > 50 {
            output = hits[..50].join("\n");
            output.push_str(&format!("\n[{} more matches omitted]", count - 50));
        }
        Ok(ToolResult::new(output))
    }
}

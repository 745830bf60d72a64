use crate::errors::NeoclawError;
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Result of a single tool execution.
#[derive(Debug, Clone, Default)]
pub struct ToolResult {
    /// Text handed back to the model as the `tool_result` content.
    pub output: String,
    /// Whether `output` was cut short of the tool's full output.
    pub truncated: bool,
    /// Where the full output was written when `truncated` is set.
    pub full_output_path: Option<PathBuf>,
}

impl ToolResult {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            truncated: false,
            full_output_path: None,
        }
    }

    pub fn truncated(output: impl Into<String>, full_output_path: Option<PathBuf>) -> Self {
        Self {
            output: output.into(),
            truncated: true,
            full_output_path,
        }
    }
}

/// Static permission class of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolPermission {
    /// Runs without consulting the approver.
    AutoApprove,
    /// Must pass the approval engine's prompt (or a matching policy) first.
    RequiresApproval,
}

/// Context passed to every tool execution: the conversation the call belongs
/// to and the turn's cancellation token.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub channel: String,
    pub chat_id: String,
    pub cancel: CancellationToken,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self {
            channel: "terminal".to_string(),
            chat_id: "local".to_string(),
            cancel: CancellationToken::new(),
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> Value; // JSON Schema

    fn permission(&self) -> ToolPermission {
        ToolPermission::AutoApprove
    }

    async fn execute(&self, params: Value, ctx: &ExecutionContext) -> anyhow::Result<ToolResult>;

    /// One-line human summary of an invocation, shown in approval prompts.
    /// Tools without a useful summary fall back to their name.
    fn summarize_args(&self, _params: &Value) -> Option<String> {
        None
    }
}

/// Fetch a required, non-empty string argument.
pub fn require_str_arg<'a>(params: &'a Value, key: &str) -> Result<&'a str, NeoclawError> {
    params
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            NeoclawError::InvalidArgs(format!("missing or empty string argument '{}'", key))
        })
}

/// Fetch an optional string argument, rejecting non-string values.
pub fn optional_str_arg<'a>(params: &'a Value, key: &str) -> Result<Option<&'a str>, NeoclawError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(NeoclawError::InvalidArgs(format!(
            "argument '{}' must be a string, got {}",
            key,
            json_type_name(other)
        ))),
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

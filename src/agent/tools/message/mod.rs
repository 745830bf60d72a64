use crate::agent::tools::base::{ExecutionContext, Tool, ToolResult, require_str_arg};
use crate::channels::ChannelWriter;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Deliver a message to the active channel mid-turn (e.g. progress updates
/// during a long tool sequence). Falls back to stdout when no channel sender
/// is wired.
pub struct SendMessageTool {
    writer: Option<Arc<dyn ChannelWriter>>,
}

impl SendMessageTool {
    pub fn new(writer: Option<Arc<dyn ChannelWriter>>) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl Tool for SendMessageTool {
    fn name(&self) -> &str {
        "send_message"
    }

    fn description(&self) -> &str {
        "Send a message to the user immediately, before the turn finishes."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "The message to deliver"
                }
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ExecutionContext) -> anyhow::Result<ToolResult> {
        let message = require_str_arg(&params, "message")?;
        match &self.writer {
            Some(writer) => {
                writer.send(message).await?;
                Ok(ToolResult::new(format!(
                    "message sent to {}:{}",
                    ctx.channel, ctx.chat_id
                )))
            }
            None => {
                println!("{}", message);
                Ok(ToolResult::new("message sent to stdout"))
            }
        }
    }
}

#[cfg(test)]
mod tests;

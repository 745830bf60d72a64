use crate::agent::tools::ToolRegistry;
use crate::agent::tools::base::ExecutionContext;
use crate::approval::{ApprovalEngine, Approver};
use crate::errors::NeoclawError;
use crate::providers::base::{ChatRequest, LLMProvider, Message, Usage};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Called once per provider response with that response's token usage.
pub type UsageCallback = Box<dyn Fn(Usage) + Send + Sync>;

/// Final state of a completed turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// The assistant's final text (may be empty when the model had nothing to
    /// say).
    pub text: String,
    /// Usage summed over every provider call in the turn.
    pub usage: Usage,
}

/// One cycle of user-message → (model ↔ tools)* → assistant-message.
///
/// The loop borrows the registry and provider per turn; the caller owns the
/// history, which is left in its in-progress state on cancellation or when
/// the iteration cap trips.
pub struct TurnLoop {
    provider: Arc<dyn LLMProvider>,
    registry: Arc<ToolRegistry>,
    engine: Arc<ApprovalEngine>,
    approver: Option<Arc<dyn Approver>>,
    system_prompt: String,
    max_iterations: usize,
    max_tokens: u32,
    usage_callback: Option<UsageCallback>,
}

impl TurnLoop {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        registry: Arc<ToolRegistry>,
        engine: Arc<ApprovalEngine>,
        approver: Option<Arc<dyn Approver>>,
        system_prompt: String,
        max_iterations: usize,
        max_tokens: u32,
    ) -> Self {
        Self {
            provider,
            registry,
            engine,
            approver,
            system_prompt,
            max_iterations: max_iterations.max(1),
            max_tokens,
            usage_callback: None,
        }
    }

    pub fn with_usage_callback(mut self, callback: UsageCallback) -> Self {
        self.usage_callback = Some(callback);
        self
    }

    pub async fn run(
        &self,
        ctx: &ExecutionContext,
        history: &mut Vec<Message>,
    ) -> Result<TurnOutcome, NeoclawError> {
        let tool_defs = self.registry.tool_definitions();
        let tool_names = self.registry.tool_names();
        let mut usage = Usage::default();

        for iteration in 1..=self.max_iterations {
            if ctx.cancel.is_cancelled() {
                return Err(NeoclawError::Canceled);
            }

            debug!(
                "turn iteration {}/{} ({} messages)",
                iteration,
                self.max_iterations,
                history.len()
            );
            let response = self
                .provider
                .chat_with_retry(
                    ChatRequest {
                        system: &self.system_prompt,
                        messages: history,
                        tools: &tool_defs,
                        model: None,
                        max_tokens: self.max_tokens,
                    },
                    None,
                )
                .await
                .map_err(|e| match e.downcast::<NeoclawError>() {
                    Ok(ne) => ne,
                    Err(e) => NeoclawError::Internal(e),
                })?;

            usage.add(response.usage);
            if let Some(callback) = &self.usage_callback {
                callback(response.usage);
            }

            if !response.has_tool_calls() {
                let text = response.content.unwrap_or_default();
                if !text.is_empty() {
                    history.push(Message::assistant(text.clone(), None));
                }
                info!(
                    "turn finished after {} iteration(s), {} tokens",
                    iteration,
                    usage.total()
                );
                return Ok(TurnOutcome { text, usage });
            }

            history.push(Message::assistant(
                response.content.clone().unwrap_or_default(),
                Some(response.tool_calls.clone()),
            ));

            for call in &response.tool_calls {
                let Some(tool) = self.registry.get(&call.name) else {
                    warn!("model called unknown tool '{}'", call.name);
                    history.push(Message::tool_result(
                        &call.id,
                        format!(
                            "Error: tool '{}' does not exist. Available tools: {}",
                            call.name,
                            tool_names.join(", ")
                        ),
                        true,
                    ));
                    continue;
                };

                let args = match parse_arguments(&call.arguments) {
                    Ok(args) => args,
                    Err(msg) => {
                        warn!("bad arguments for tool '{}': {}", call.name, msg);
                        history.push(Message::tool_result(&call.id, msg, true));
                        continue;
                    }
                };

                let description = tool
                    .summarize_args(&args)
                    .unwrap_or_else(|| call.name.clone());

                match self
                    .engine
                    .execute_tool(ctx, self.approver.as_deref(), tool.as_ref(), &args, &description)
                    .await
                {
                    Ok(result) => {
                        debug!(
                            "tool '{}' returned {} chars{}",
                            call.name,
                            result.output.len(),
                            if result.truncated { " (truncated)" } else { "" }
                        );
                        history.push(Message::tool_result(&call.id, result.output, false));
                    }
                    Err(e) if e.is_canceled() => return Err(NeoclawError::Canceled),
                    Err(e) => {
                        warn!("tool '{}' failed: {}", call.name, e);
                        history.push(Message::tool_result(
                            &call.id,
                            format!("tool execution error: {}", e),
                            true,
                        ));
                    }
                }
            }
        }

        warn!("turn hit the {}-iteration cap", self.max_iterations);
        Err(NeoclawError::MaxIterations(self.max_iterations))
    }
}

/// Parse a tool call's raw argument JSON into an object.
fn parse_arguments(raw: &str) -> Result<Value, String> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(other) => Err(format!(
            "Error: tool arguments must be a JSON object, got {}",
            crate::agent::tools::base::json_type_name(&other)
        )),
        Err(e) => Err(format!("Error: failed to parse tool arguments: {}", e)),
    }
}

use crate::providers::base::{ChatRequest, LLMProvider, LLMResponse, ToolCallRequest, Usage};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::warn;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";
const CONNECT_TIMEOUT_SECS: u64 = 30;

pub struct AnthropicProvider {
    api_key: String,
    default_model: String,
    base_url: String,
    request_timeout: Duration,
    client: Client,
}

impl AnthropicProvider {
    pub fn new(api_key: String, model: Option<String>, request_timeout_secs: u64) -> Self {
        Self {
            api_key,
            default_model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: API_URL.to_string(),
            request_timeout: Duration::from_secs(request_timeout_secs),
            client: Client::builder()
                .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Convert generic messages to Anthropic content blocks. Tool results
    /// become `user` messages carrying `tool_result` blocks; consecutive user
    /// messages are merged because the API rejects same-role runs.
    fn convert_messages(messages: &[crate::providers::base::Message]) -> Vec<Value> {
        let mut converted: Vec<Value> = Vec::new();

        for msg in messages {
            let entry = match msg.role.as_str() {
                "user" => json!({
                    "role": "user",
                    "content": [{"type": "text", "text": msg.content}],
                }),
                "assistant" => {
                    let mut content: Vec<Value> = Vec::new();
                    if !msg.content.is_empty() {
                        content.push(json!({"type": "text", "text": msg.content}));
                    }
                    if let Some(tool_calls) = &msg.tool_calls {
                        for tc in tool_calls {
                            // The wire wants parsed input; unparseable argument
                            // strings degrade to an empty object.
                            let input: Value = serde_json::from_str(&tc.arguments)
                                .unwrap_or_else(|_| json!({}));
                            content.push(json!({
                                "type": "tool_use",
                                "id": tc.id,
                                "name": tc.name,
                                "input": input,
                            }));
                        }
                    }
                    json!({"role": "assistant", "content": content})
                }
                "tool" => {
                    let Some(tool_call_id) = &msg.tool_call_id else {
                        continue;
                    };
                    let mut block = json!({
                        "type": "tool_result",
                        "tool_use_id": tool_call_id,
                        "content": msg.content,
                    });
                    if msg.is_error {
                        block["is_error"] = json!(true);
                    }
                    json!({"role": "user", "content": [block]})
                }
                other => {
                    warn!("dropping message with unsupported role '{}'", other);
                    continue;
                }
            };

            if let Some(last) = converted.last_mut()
                && last["role"] == "user"
                && entry["role"] == "user"
            {
                let mut combined = last["content"].as_array().cloned().unwrap_or_default();
                combined.extend(entry["content"].as_array().cloned().unwrap_or_default());
                last["content"] = Value::Array(combined);
                continue;
            }
            converted.push(entry);
        }

        converted
    }

    fn parse_response(json: &Value) -> LLMResponse {
        let mut content: Option<String> = None;
        let mut tool_calls = Vec::new();

        if let Some(blocks) = json["content"].as_array() {
            for block in blocks {
                match block["type"].as_str() {
                    Some("text") => {
                        if let Some(text) = block["text"].as_str()
                            && content.is_none()
                        {
                            content = Some(text.to_string());
                        }
                    }
                    Some("tool_use") => {
                        tool_calls.push(ToolCallRequest {
                            id: block["id"].as_str().unwrap_or_default().to_string(),
                            name: block["name"].as_str().unwrap_or_default().to_string(),
                            arguments: serde_json::to_string(&block["input"])
                                .unwrap_or_else(|_| "{}".to_string()),
                        });
                    }
                    _ => {}
                }
            }
        }

        let usage = Usage {
            input_tokens: json["usage"]["input_tokens"].as_u64().unwrap_or(0),
            output_tokens: json["usage"]["output_tokens"].as_u64().unwrap_or(0),
        };

        LLMResponse {
            content,
            tool_calls,
            usage,
        }
    }
}

#[async_trait]
impl LLMProvider for AnthropicProvider {
    async fn chat(&self, req: ChatRequest<'_>) -> Result<LLMResponse> {
        let mut payload = json!({
            "model": req.model.unwrap_or(&self.default_model),
            "messages": Self::convert_messages(req.messages),
            "max_tokens": req.max_tokens,
        });

        if !req.system.is_empty() {
            payload["system"] = json!(req.system);
        }

        if !req.tools.is_empty() {
            let tools: Vec<Value> = req
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.parameters,
                    })
                })
                .collect();
            payload["tools"] = json!(tools);
        }

        let resp = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&payload)
            .timeout(self.request_timeout)
            .send()
            .await
            .context("Failed to send request to Anthropic API")?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .context("Failed to read Anthropic API response body")?;
        if !status.is_success() {
            anyhow::bail!("Anthropic API error {}: {}", status, body);
        }

        let json: Value =
            serde_json::from_str(&body).context("Failed to parse Anthropic API response JSON")?;
        Ok(Self::parse_response(&json))
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }
}

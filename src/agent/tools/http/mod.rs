use crate::agent::tools::base::{ExecutionContext, Tool, ToolResult, require_str_arg};
use crate::errors::NeoclawError;
use crate::policy::domain::GatedClient;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

const MAX_RESPONSE_CHARS: usize = 50_000;
const DEFAULT_ACCEPT: &str = "application/json, text/markdown, text/plain";

const METHODS: &[&str] = &[
    "GET", "HEAD", "POST", "PUT", "DELETE", "CONNECT", "OPTIONS", "TRACE", "PATCH",
];

/// Arbitrary HTTP requests. Auto-approved: the domain gate in the shared
/// client transport is the authorization point.
pub struct HttpRequestTool {
    client: Arc<GatedClient>,
}

impl HttpRequestTool {
    pub fn new(client: Arc<GatedClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for HttpRequestTool {
    fn name(&self) -> &str {
        "http_request"
    }

    fn description(&self) -> &str {
        "Make an HTTP request. For REST APIs, webhooks, and services."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "method": {
                    "type": "string",
                    "enum": METHODS,
                    "description": "HTTP method"
                },
                "url": {
                    "type": "string",
                    "description": "Full URL to request"
                },
                "headers": {
                    "type": "object",
                    "description": "Request headers as key-value pairs"
                },
                "body": {
                    "description": "Request body (string sent raw, object sent as JSON)"
                }
            },
            "required": ["method", "url"]
        })
    }

    async fn execute(&self, params: Value, _ctx: &ExecutionContext) -> anyhow::Result<ToolResult> {
        let method_raw = require_str_arg(&params, "method")?.to_uppercase();
        if !METHODS.contains(&method_raw.as_str()) {
            return Err(NeoclawError::InvalidArgs(format!(
                "unsupported HTTP method '{}'",
                method_raw
            ))
            .into());
        }
        let method = reqwest::Method::from_bytes(method_raw.as_bytes())
            .map_err(|_| NeoclawError::InvalidArgs(format!("invalid method '{}'", method_raw)))?;

        let url_raw = require_str_arg(&params, "url")?;
        let url = url::Url::parse(url_raw)
            .map_err(|e| NeoclawError::Parse(format!("invalid URL '{}': {}", url_raw, e)))?;

        let mut request = self.client.request(method.clone(), url);

        let mut has_accept = false;
        if let Some(headers) = params.get("headers").and_then(Value::as_object) {
            for (key, val) in headers {
                if let Some(v) = val.as_str() {
                    if key.eq_ignore_ascii_case("accept") {
                        has_accept = true;
                    }
                    request = request.header(key.as_str(), v);
                }
            }
        }
        if !has_accept {
            request = request.header("Accept", DEFAULT_ACCEPT);
        }

        match params.get("body") {
            None | Some(Value::Null) => {}
            Some(Value::String(s)) => {
                request = request.body(s.clone());
            }
            Some(other) => {
                request = request.json(other);
            }
        }

        let built = request
            .build()
            .map_err(|e| NeoclawError::Parse(format!("failed to build request: {}", e)))?;
        let response = self.client.execute(built).await?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|h| h.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = response.text().await.unwrap_or_default();

        // Pretty-print JSON bodies for the model
        let body = if content_type.contains("json") {
            serde_json::from_str::<Value>(&body)
                .and_then(|v| serde_json::to_string_pretty(&v))
                .unwrap_or(body)
        } else {
            body
        };

        let header = format!("HTTP {} {}", status, method_raw);
        if body.chars().count() > MAX_RESPONSE_CHARS {
            let truncated: String = body.chars().take(MAX_RESPONSE_CHARS).collect();
            return Ok(ToolResult::truncated(
                format!("{}\n\n{}\n[response truncated]", header, truncated),
                None,
            ));
        }
        Ok(ToolResult::new(format!("{}\n\n{}", header, body)))
    }
}

use crate::agent::tools::base::{ExecutionContext, Tool, ToolResult, require_str_arg};
use crate::errors::NeoclawError;
use crate::policy::domain::GatedClient;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

const BRAVE_SEARCH_URL: &str = "https://api.search.brave.com/res/v1/web/search";
const MAX_DESCRIPTION_CHARS: usize = 300;

/// Brave web search. Requires an API key; traffic goes through the shared
/// gated client like every other outbound request.
pub struct WebSearchTool {
    client: Arc<GatedClient>,
    api_key: String,
    max_results: usize,
    endpoint: String,
}

impl WebSearchTool {
    pub fn new(client: Arc<GatedClient>, api_key: String, max_results: usize) -> Self {
        Self {
            client,
            api_key,
            max_results: max_results.max(1),
            endpoint: BRAVE_SEARCH_URL.to_string(),
        }
    }

    #[cfg(test)]
    fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = endpoint;
        self
    }

    fn format_results(&self, json: &Value) -> String {
        let Some(results) = json["web"]["results"].as_array() else {
            return "no results".to_string();
        };
        let mut out = Vec::new();
        for result in results.iter().take(self.max_results) {
            let title = result["title"].as_str().unwrap_or("(untitled)");
            let url = result["url"].as_str().unwrap_or("");
            let description = result["description"].as_str().unwrap_or("");
            let description = crate::utils::truncate_chars(description, MAX_DESCRIPTION_CHARS, "…");
            out.push(format!("{}\n{}\n{}", title, url, description));
        }
        if out.is_empty() {
            "no results".to_string()
        } else {
            out.join("\n\n")
        }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web and return the top results with titles, URLs, and snippets."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, _ctx: &ExecutionContext) -> anyhow::Result<ToolResult> {
        let query = require_str_arg(&params, "query")?;
        if self.api_key.is_empty() {
            return Err(NeoclawError::InvalidArgs(
                "web_search requires a Brave API key (tools.web_search.api_key)".to_string(),
            )
            .into());
        }

        let mut url = url::Url::parse(&self.endpoint)
            .map_err(|e| NeoclawError::Parse(format!("bad search endpoint: {}", e)))?;
        url.query_pairs_mut().append_pair("q", query);

        let request = self
            .client
            .request(reqwest::Method::GET, url)
            .header("X-Subscription-Token", &self.api_key)
            .header("Accept", "application/json")
            .build()
            .map_err(|e| NeoclawError::Parse(format!("failed to build request: {}", e)))?;

        let response = self.client.execute(request).await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("web search failed with HTTP {}: {}", status, body);
        }
        let json: Value = serde_json::from_str(&body)
            .map_err(|e| NeoclawError::Parse(format!("bad search response: {}", e)))?;

        Ok(ToolResult::new(self.format_results(&json)))
    }
}

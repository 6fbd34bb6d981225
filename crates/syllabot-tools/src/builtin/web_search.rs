use futures::future::BoxFuture;
use reqwest::Client;
use serde_json::json;

use syllabot_core::error::{Result, SyllabotError};
use syllabot_core::traits::Tool;
use syllabot_core::types::{ToolContext, ToolResult};

const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";

pub struct WebSearchTool {
    api_key: String,
    endpoint: String,
    http: Client,
}

impl WebSearchTool {
    pub fn new(http: Client, api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            endpoint: TAVILY_SEARCH_URL.to_string(),
            http,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for current information. Returns relevant results with snippets."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of results (default 5)",
                    "default": 5
                }
            },
            "required": ["query"]
        })
    }

    fn execute(
        &self,
        input: serde_json::Value,
        _ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>> {
        Box::pin(async move {
            let query = input["query"]
                .as_str()
                .ok_or_else(|| SyllabotError::ToolValidation("'query' must be a string".into()))?;
            let max = input["max_results"].as_u64().unwrap_or(5);

            let resp = self
                .http
                .post(&self.endpoint)
                .json(&json!({
                    "api_key": self.api_key,
                    "query": query,
                    "max_results": max,
                }))
                .send()
                .await
                .map_err(|e| SyllabotError::fetch(&self.endpoint, e))?;

            let status = resp.status();
            if !status.is_success() {
                return Err(SyllabotError::fetch(
                    &self.endpoint,
                    format!("HTTP {}", status.as_u16()),
                ));
            }

            let body: serde_json::Value = resp
                .json()
                .await
                .map_err(|e| SyllabotError::fetch(&self.endpoint, e))?;

            let results = body["results"]
                .as_array()
                .filter(|arr| !arr.is_empty())
                .map(|arr| {
                    arr.iter()
                        .map(|r| {
                            format!(
                                "**{}**\n{}\nURL: {}",
                                r["title"].as_str().unwrap_or(""),
                                r["content"].as_str().unwrap_or(""),
                                r["url"].as_str().unwrap_or("")
                            )
                        })
                        .collect::<Vec<_>>()
                        .join("\n\n---\n\n")
                })
                .unwrap_or_else(|| "No results found.".into());

            Ok(ToolResult::success(results))
        })
    }
}

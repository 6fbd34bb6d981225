use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Client;
use tracing::debug;

use syllabot_core::config::AppConfig;
use syllabot_core::error::{Result, SyllabotError};
use syllabot_core::traits::Tool;
use syllabot_core::types::{ToolContext, ToolDefinition, ToolResult};

use crate::builtin::file_search::{CorpusSearch, FileSearchTool};
use crate::builtin::locate_pdf::{DocumentLocator, LocatePdfTool};
use crate::builtin::read_pdf::{DocumentExtractor, ReadPdfTool};
use crate::builtin::web_search::WebSearchTool;

/// Registry of available tools.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool.
    pub fn register(&mut self, tool: impl Tool) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered tool names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Definitions for the named tools, in the order given.
    pub fn definitions_for(&self, names: &[&str]) -> Result<Vec<ToolDefinition>> {
        names
            .iter()
            .map(|name| {
                let tool = self
                    .get(name)
                    .ok_or_else(|| SyllabotError::ToolNotFound(name.to_string()))?;
                Ok(ToolDefinition {
                    name: tool.name().to_string(),
                    description: tool.description().to_string(),
                    input_schema: tool.input_schema(),
                })
            })
            .collect()
    }

    /// Execute a tool by name.
    pub async fn execute(
        &self,
        name: &str,
        input: serde_json::Value,
        ctx: ToolContext,
    ) -> Result<ToolResult> {
        let tool = self
            .get(name)
            .ok_or_else(|| SyllabotError::ToolNotFound(name.to_string()))?;

        let timeout = std::time::Duration::from_secs(tool.timeout_secs());

        match tokio::time::timeout(timeout, tool.execute(input, ctx)).await {
            Ok(result) => result,
            Err(_) => Err(SyllabotError::ToolTimeout {
                tool: name.to_string(),
                timeout_secs: tool.timeout_secs(),
            }),
        }
    }

    /// Create a registry with the document tools, plus corpus search when a
    /// vector store is configured and web search when an API key is.
    pub fn with_builtins(config: &AppConfig, http: Client) -> Self {
        let mut registry = Self::new();

        registry.register(LocatePdfTool::new(DocumentLocator::new(
            http.clone(),
            &config.source,
        )));
        registry.register(ReadPdfTool::new(DocumentExtractor::new(http.clone())));

        match config.require_vector_store_id() {
            Ok(id) => registry.register(FileSearchTool::new(CorpusSearch::new(
                http.clone(),
                &config.vector_store,
                id,
                config.vector_store_api_key(),
            ))),
            Err(_) => debug!("No vector store configured, file_search not registered"),
        }

        if let Some(ws) = &config.web_search {
            registry.register(WebSearchTool::new(http, &ws.api_key));
        }

        registry
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

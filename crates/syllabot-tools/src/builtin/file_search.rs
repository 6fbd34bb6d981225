use futures::future::BoxFuture;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use syllabot_core::config::VectorStoreConfig;
use syllabot_core::error::{Result, SyllabotError};
use syllabot_core::traits::Tool;
use syllabot_core::types::{ToolContext, ToolResult};

/// One ranked snippet from the reference corpus.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub filename: String,
    pub score: f64,
    pub text: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    #[serde(default)]
    filename: String,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    content: Vec<SearchContent>,
}

#[derive(Deserialize)]
struct SearchContent {
    #[serde(default)]
    text: String,
}

/// Queries the vector store holding the reference syllabus.
pub struct CorpusSearch {
    http: Client,
    base_url: String,
    vector_store_id: String,
    api_key: Option<String>,
    max_num_results: u32,
}

impl CorpusSearch {
    pub fn new(
        http: Client,
        config: &VectorStoreConfig,
        vector_store_id: &str,
        api_key: Option<&str>,
    ) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            vector_store_id: vector_store_id.to_string(),
            api_key: api_key.map(str::to_string),
            max_num_results: config.max_num_results,
        }
    }

    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let url = format!("{}/vector_stores/{}/search", self.base_url, self.vector_store_id);
        debug!(%url, query, "Querying vector store");

        let mut req = self.http.post(&url).json(&json!({
            "query": query,
            "max_num_results": self.max_num_results,
        }));
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await.map_err(|e| SyllabotError::fetch(&url, e))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyllabotError::fetch(&url, format!("HTTP {}: {}", status.as_u16(), body)));
        }

        let body: SearchResponse = resp
            .json()
            .await
            .map_err(|e| SyllabotError::fetch(&url, format!("invalid search response: {}", e)))?;

        let hits: Vec<SearchHit> = body
            .data
            .into_iter()
            .take(self.max_num_results as usize)
            .map(|r| SearchHit {
                filename: r.filename,
                score: r.score,
                text: r
                    .content
                    .into_iter()
                    .map(|c| c.text)
                    .collect::<Vec<_>>()
                    .join("\n"),
            })
            .collect();

        info!(hits = hits.len(), "Vector store search complete");
        Ok(hits)
    }
}

/// Render hits for the model, best first.
pub fn format_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No matching passages in the reference corpus.".to_string();
    }
    hits.iter()
        .enumerate()
        .map(|(i, h)| format!("[{}] {} (score {:.3})\n{}", i + 1, h.filename, h.score, h.text))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

pub struct FileSearchTool {
    corpus: CorpusSearch,
}

impl FileSearchTool {
    pub fn new(corpus: CorpusSearch) -> Self {
        Self { corpus }
    }
}

impl Tool for FileSearchTool {
    fn name(&self) -> &str {
        "file_search"
    }

    fn description(&self) -> &str {
        "Search the reference syllabus stored in the vector store. Returns the most relevant passages with their scores."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to look for in the reference syllabus"
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
                .filter(|q| !q.trim().is_empty())
                .ok_or_else(|| SyllabotError::ToolValidation("'query' must be a non-empty string".into()))?;
            let hits = self.corpus.search(query).await?;
            Ok(ToolResult::success(format_hits(&hits)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use syllabot_test_utils::test_tool_context;

    fn corpus(base_url: String) -> CorpusSearch {
        let config = VectorStoreConfig {
            base_url,
            max_num_results: 2,
            ..VectorStoreConfig::default()
        };
        CorpusSearch::new(Client::new(), &config, "vs_123", Some("sk-test"))
    }

    #[tokio::test]
    async fn test_search_posts_query_and_parses_hits() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/vector_stores/vs_123/search")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::Json(json!({"query": "test levels", "max_num_results": 2})))
            .with_status(200)
            .with_body(
                json!({
                    "object": "vector_store.search_results.page",
                    "data": [
                        {"filename": "ctfl_en.pdf", "score": 0.91,
                         "content": [{"type": "text", "text": "2.2 Test Levels"}, {"type": "text", "text": "component testing"}]},
                        {"filename": "ctfl_en.pdf", "score": 0.55, "content": [{"type": "text", "text": "glossary"}]},
                        {"filename": "extra.pdf", "score": 0.10, "content": []}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let hits = corpus(format!("{}/v1", server.url()))
            .search("test levels")
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "2.2 Test Levels\ncomponent testing");
        assert!(hits[0].score > hits[1].score);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_search_http_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/v1/vector_stores/vs_123/search")
            .with_status(404)
            .with_body(r#"{"error":{"message":"No vector store found"}}"#)
            .create_async()
            .await;

        let err = corpus(format!("{}/v1", server.url()))
            .search("anything")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "fetch");
    }

    #[tokio::test]
    async fn test_tool_requires_query() {
        let tool = FileSearchTool::new(corpus("http://127.0.0.1:9".into()));
        let err = tool
            .execute(json!({"query": ""}), test_tool_context())
            .await
            .unwrap_err();
        assert!(matches!(err, SyllabotError::ToolValidation(_)));
    }

    #[test]
    fn test_format_hits() {
        assert!(format_hits(&[]).contains("No matching"));
        let out = format_hits(&[SearchHit {
            filename: "a.pdf".into(),
            score: 0.5,
            text: "body".into(),
        }]);
        assert!(out.starts_with("[1] a.pdf (score 0.500)"));
    }
}

use std::sync::Arc;

use tracing::{debug, info, warn};

use syllabot_core::config::AppConfig;
use syllabot_core::error::Result;
use syllabot_core::event::EventBus;
use syllabot_core::normalize::normalize;
use syllabot_core::traits::LlmClient;
use syllabot_core::types::RunEnvelope;
use syllabot_tools::{http, ToolRegistry};

use crate::agent_loop::AgentRuntime;
use crate::context::{load_instructions, load_user_input};
use crate::graph::{ActorDefinition, ActorGraph, ActorGraphBuilder, ActorRole, HandoffExecutor, RunResult};

/// Owns everything one comparison run needs: config, model client, tools
/// and the event bus. The actor graph is rebuilt for every run.
pub struct Orchestrator {
    config: AppConfig,
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    event_bus: Arc<EventBus>,
}

impl Orchestrator {
    /// Wire the real HTTP client, tools and model client. Fails when the
    /// vector store id is missing.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        config.require_vector_store_id()?;
        let http = http::build_client(&config.http)?;
        let tools = ToolRegistry::with_builtins(&config, http);
        let llm: Arc<dyn LlmClient> = Arc::from(syllabot_llm::create_client(&config.model));
        info!(
            model = %config.model.model_id,
            tools = ?tools.list(),
            "Orchestrator ready"
        );
        Ok(Self::with_parts(config, llm, Arc::new(tools), Arc::new(EventBus::default())))
    }

    pub fn with_parts(
        config: AppConfig,
        llm: Arc<dyn LlmClient>,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            config,
            llm,
            tools,
            event_bus,
        }
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        self.event_bus.clone()
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Build the three-actor graph with every hand-off edge. Capabilities
    /// whose tool is not registered are dropped with a warning.
    pub fn build_graph(&self) -> Result<ActorGraph> {
        let mut builder = ActorGraphBuilder::new();
        for role in ActorRole::ALL {
            let mut def = ActorDefinition::standard(role, load_instructions(&self.config.prompts, role));
            def.capabilities.retain(|cap| {
                let present = self.tools.contains(cap.tool_name());
                if !present {
                    warn!(actor = %role, tool = cap.tool_name(), "Tool not registered, capability dropped");
                }
                present
            });
            builder = builder.actor(def);
        }
        builder.complete_edges().build()
    }

    pub async fn run(&self, user_input: &str) -> Result<RunResult> {
        let graph = self.build_graph()?;
        debug!(graph = %graph.describe(), "Actor graph built");

        let runtime = AgentRuntime::new(
            self.config.model.clone(),
            self.config.agent.max_turns,
            self.llm.clone(),
            self.tools.clone(),
            self.event_bus.clone(),
        );
        let executor = HandoffExecutor::new(
            graph,
            runtime,
            self.config.protocol.clone(),
            self.event_bus.clone(),
        );
        executor.run(user_input).await
    }
}

/// Turn a run outcome into the envelope printed to the caller.
///
/// A final answer that parses as JSON is passed through as data, anything
/// else becomes a JSON string.
pub fn envelope_for(result: &Result<RunResult>) -> RunEnvelope {
    match result {
        Ok(run) => {
            let value = serde_json::from_str::<serde_json::Value>(run.output.trim())
                .unwrap_or_else(|_| serde_json::Value::String(run.output.clone()));
            match normalize(&value) {
                Ok(text) => RunEnvelope::success(text),
                Err(e) => RunEnvelope::from_error(&e),
            }
        }
        Err(e) => RunEnvelope::from_error(e),
    }
}

/// Run the full comparison and report it as an envelope. Never fails;
/// every error is reported inside the envelope.
pub async fn run_comparison(config: AppConfig, user_input: Option<String>) -> RunEnvelope {
    let input = user_input.unwrap_or_else(|| load_user_input(&config.prompts));
    let orchestrator = match Orchestrator::from_config(config) {
        Ok(o) => o,
        Err(e) => {
            warn!(error = %e, "Cannot start run");
            return RunEnvelope::from_error(&e);
        }
    };
    envelope_for(&orchestrator.run(&input).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use syllabot_core::types::StreamDelta;
    use syllabot_test_utils::{html_page, pdf_with_pages, syllabus_page, test_config, tool_turn, MockLlm};

    fn orchestrator(config: AppConfig, mock: &MockLlm) -> Orchestrator {
        let client = http::build_client(&config.http).unwrap();
        let tools = ToolRegistry::with_builtins(&config, client);
        Orchestrator::with_parts(
            config,
            Arc::new(mock.clone()),
            Arc::new(tools),
            Arc::new(EventBus::default()),
        )
    }

    #[tokio::test]
    async fn test_end_to_end_comparison() {
        let mut server = mockito::Server::new_async().await;
        let page = server
            .mock("GET", "/ke-stazeni")
            .with_body(syllabus_page("/files/ISTQB_CTFL_Syllabus_CZ_v4.pdf"))
            .create_async()
            .await;
        let pdf = server
            .mock("GET", "/files/ISTQB_CTFL_Syllabus_CZ_v4.pdf")
            .with_header("content-type", "application/pdf")
            .with_body(pdf_with_pages(&["Chapter 1 Fundamentals", "Chapter 2 Lifecycle"]))
            .create_async()
            .await;
        let search = server
            .mock("POST", "/v1/vector_stores/vs_test/search")
            .match_body(Matcher::PartialJson(serde_json::json!({"query": "Fundamentals"})))
            .with_body(
                serde_json::json!({
                    "data": [{
                        "filename": "ctfl_reference.pdf",
                        "score": 0.91,
                        "content": [{"type": "text", "text": "Chapter 1 Fundamentals"}]
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let mut config = test_config();
        config.source.page_url = format!("{}/ke-stazeni", server.url());
        config.vector_store.base_url = format!("{}/v1", server.url());
        let pdf_url = format!("{}/files/ISTQB_CTFL_Syllabus_CZ_v4.pdf", server.url());

        let mock = MockLlm::new();
        mock.push_tool("transfer_to_retriever", serde_json::json!({}));
        mock.push_tool("locate_pdf", serde_json::json!({}));
        mock.push_tool("read_pdf", serde_json::json!({"pdf_url": pdf_url}));
        let mut back = vec![StreamDelta::TextDelta("Read the Czech syllabus.".into())];
        back.extend(tool_turn("call_r", "transfer_to_coordinator", serde_json::json!({})));
        mock.push(back);
        mock.push_tool("transfer_to_comparator", serde_json::json!({}));
        mock.push_tool("file_search", serde_json::json!({"query": "Fundamentals"}));
        mock.push_tool("transfer_to_coordinator", serde_json::json!({}));
        mock.push_text(r#"{"same": true, "summary": "Chapter 1 matches"}"#);

        let orch = orchestrator(config, &mock);
        let result = orch.run("Compare the syllabi.").await;
        page.assert_async().await;
        pdf.assert_async().await;
        search.assert_async().await;

        let run = result.as_ref().unwrap();
        assert_eq!(run.context.get_str("pdf_url"), Some(pdf_url.as_str()));
        assert!(run.context.get("syllabus_chars").is_some());
        assert_eq!(run.handoffs, 4);
        assert_eq!(mock.remaining(), 0);

        let env = serde_json::to_value(envelope_for(&result)).unwrap();
        assert_eq!(
            env,
            serde_json::json!({
                "result": "success",
                "text": {"same": true, "summary": "Chapter 1 matches"}
            })
        );
    }

    #[tokio::test]
    async fn test_missing_link_fails_without_comparator() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/ke-stazeni")
            .with_body(html_page(&[r#"<a href="/files/other.pdf">Other</a>"#]))
            .create_async()
            .await;

        let mut config = test_config();
        config.source.page_url = format!("{}/ke-stazeni", server.url());

        let mock = MockLlm::new();
        mock.push_tool("transfer_to_retriever", serde_json::json!({}));
        mock.push_tool("locate_pdf", serde_json::json!({}));
        mock.push_tool("transfer_to_coordinator", serde_json::json!({}));

        let orch = orchestrator(config, &mock);
        let result = orch.run("Compare the syllabi.").await;
        assert_eq!(mock.requests().len(), 2);
        assert!(mock
            .requests()
            .iter()
            .all(|r| !r.tools.contains(&"file_search".to_string())));

        let env = serde_json::to_value(envelope_for(&result)).unwrap();
        assert_eq!(env["result"], "error");
        assert_eq!(env["kind"], "not_found");
        assert_eq!(env["reason"], "No matching PDF file was found on the page.");
    }

    #[tokio::test]
    async fn test_missing_vector_store_is_configuration_error() {
        let mut config = test_config();
        config.vector_store.id = None;

        let env = run_comparison(config, Some("compare".into())).await;
        let json = serde_json::to_value(env).unwrap();
        assert_eq!(json["result"], "error");
        assert_eq!(json["kind"], "configuration");
    }

    #[test]
    fn test_graph_drops_unregistered_capabilities() {
        let config = test_config();
        let orch = orchestrator(config, &MockLlm::new());
        let graph = orch.build_graph().unwrap();
        // web_search has no API key in the test config
        assert_eq!(
            graph.actor(ActorRole::Retriever).tool_names(),
            vec!["locate_pdf", "read_pdf"]
        );
        assert_eq!(graph.actor(ActorRole::Comparator).tool_names(), vec!["file_search"]);
        assert_eq!(graph.edges().len(), 6);
    }

    #[test]
    fn test_plain_text_answer_becomes_string() {
        let run = RunResult {
            run_id: syllabot_core::types::RunId::new(),
            output: "The documents match.".into(),
            final_actor: ActorRole::Coordinator,
            activations: vec![],
            handoffs: 4,
            context: Default::default(),
            input_tokens: 0,
            output_tokens: 0,
            elapsed_ms: 0,
        };
        let env = serde_json::to_value(envelope_for(&Ok(run))).unwrap();
        assert_eq!(env["text"], "The documents match.");
    }
}

use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, error, info, warn};

use syllabot_core::config::ModelConfig;
use syllabot_core::error::{Result, SyllabotError};
use syllabot_core::event::{AgentEvent, EventBus};
use syllabot_core::traits::LlmClient;
use syllabot_core::types::*;
use syllabot_tools::ToolRegistry;

use crate::context;
use crate::graph::{keys, Actor, ActorRole, HandoffContext, Sequencer};

/// Accumulator for streaming tool call deltas.
#[derive(Debug, Default)]
struct ToolCallAccumulator {
    id: String,
    name: String,
    input_json: String,
}

impl ToolCallAccumulator {
    /// Parsed arguments. Models send an empty string for argument-less calls.
    fn input(&self) -> Result<serde_json::Value> {
        if self.input_json.trim().is_empty() {
            return Ok(serde_json::json!({}));
        }
        serde_json::from_str(&self.input_json).map_err(|e| {
            SyllabotError::ToolValidation(format!("invalid arguments for {}: {}", self.name, e))
        })
    }
}

/// Mutable state of one run, shared by every activation.
#[derive(Debug)]
pub struct RunState {
    pub run_id: RunId,
    /// The conversation all actors read and append to.
    pub conversation: Vec<ChatMessage>,
    pub context: HandoffContext,
    pub sequencer: Sequencer,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl RunState {
    pub fn new(user_input: &str, enforce_sequence: bool) -> Self {
        Self {
            run_id: RunId::new(),
            conversation: vec![ChatMessage::user(user_input)],
            context: HandoffContext::new(),
            sequencer: Sequencer::new(enforce_sequence),
            input_tokens: 0,
            output_tokens: 0,
        }
    }
}

/// How an activation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivationOutcome {
    /// The actor answered without calling a tool.
    Final(String),
    /// The actor called a hand-off tool. `text` is whatever it said alongside.
    Handoff { to: ActorRole, text: String },
}

/// Runs one actor activation: a streaming tool-use loop over the shared
/// conversation that ends with a final answer or a hand-off.
pub struct AgentRuntime {
    model: ModelConfig,
    max_turns: usize,
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    event_bus: Arc<EventBus>,
}

impl AgentRuntime {
    pub fn new(
        model: ModelConfig,
        max_turns: usize,
        llm: Arc<dyn LlmClient>,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            model,
            max_turns,
            llm,
            tools,
            event_bus,
        }
    }

    /// The actor's own tools followed by one hand-off tool per target.
    fn tool_definitions(&self, actor: &Actor) -> Result<Vec<ToolDefinition>> {
        let mut defs = self.tools.definitions_for(&actor.tool_names())?;
        defs.extend(actor.handoffs().iter().map(|target| ToolDefinition {
            name: target.handoff_tool().to_string(),
            description: target.handoff_description().to_string(),
            input_schema: serde_json::json!({"type": "object", "properties": {}}),
        }));
        Ok(defs)
    }

    pub async fn run_activation(
        &self,
        actor: &Actor,
        state: &mut RunState,
    ) -> Result<ActivationOutcome> {
        let tool_defs = self.tool_definitions(actor)?;
        let tool_ctx = ToolContext {
            run_id: state.run_id.clone(),
            actor: actor.identity().to_string(),
        };

        for turn in 0..self.max_turns {
            debug!(actor = %actor.role(), turn, "Starting actor turn");

            let mut messages = Vec::with_capacity(state.conversation.len() + 1);
            messages.push(context::build_actor_context(actor, &state.context));
            messages.extend(state.conversation.iter().cloned());

            let mut stream = self.llm.chat_stream(&self.model, messages, &tool_defs).await?;

            // Accumulate response
            let mut text_content = String::new();
            let mut tool_calls: Vec<ToolCallAccumulator> = Vec::new();
            let mut stop_reason = None;

            while let Some(delta) = stream.next().await {
                match delta? {
                    StreamDelta::TextDelta(text) => {
                        self.event_bus.publish(AgentEvent::TextDelta(text.clone()));
                        text_content.push_str(&text);
                    }
                    StreamDelta::ToolUseStart { index, id, name } => {
                        while tool_calls.len() <= index {
                            tool_calls.push(ToolCallAccumulator::default());
                        }
                        tool_calls[index].id = id;
                        tool_calls[index].name = name;
                    }
                    StreamDelta::ToolInputDelta { index, delta } => {
                        if let Some(tc) = tool_calls.get_mut(index) {
                            tc.input_json.push_str(&delta);
                        }
                    }
                    StreamDelta::Stop(reason) => stop_reason = Some(reason),
                    StreamDelta::Usage {
                        input_tokens,
                        output_tokens,
                    } => {
                        state.input_tokens += input_tokens;
                        state.output_tokens += output_tokens;
                    }
                }
            }
            drop(stream);

            // Gaps left by sparse indices carry no name
            tool_calls.retain(|tc| !tc.name.is_empty());

            let mut content_blocks = Vec::new();
            if !text_content.is_empty() {
                content_blocks.push(ContentBlock::Text {
                    text: text_content.clone(),
                });
            }
            for tc in &tool_calls {
                content_blocks.push(ContentBlock::ToolUse {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    input: tc.input().unwrap_or(serde_json::Value::Null),
                });
            }
            state.conversation.push(ChatMessage {
                role: Role::Assistant,
                content: content_blocks,
                author: Some(actor.identity().to_string()),
                timestamp: Some(chrono::Utc::now()),
            });

            if tool_calls.is_empty() {
                if stop_reason == Some(StopReason::MaxTokens) {
                    warn!(actor = %actor.role(), "LLM hit max tokens");
                }
                info!(actor = %actor.role(), turns = turn + 1, "Actor produced a final answer");
                return Ok(ActivationOutcome::Final(text_content));
            }

            // Execute tool calls in the order the model emitted them
            let mut result_blocks = Vec::with_capacity(tool_calls.len());
            let mut handoff_to = None;

            for tc in &tool_calls {
                if handoff_to.is_some() {
                    result_blocks.push(ContentBlock::ToolResult {
                        tool_use_id: tc.id.clone(),
                        content: "Skipped: control was already handed off.".to_string(),
                        is_error: true,
                    });
                    continue;
                }

                if let Some(target) = actor.handoff_target(&tc.name) {
                    state.sequencer.handoff(actor.role(), target)?;
                    result_blocks.push(ContentBlock::ToolResult {
                        tool_use_id: tc.id.clone(),
                        content: serde_json::json!({"assistant": target.identity()}).to_string(),
                        is_error: false,
                    });
                    handoff_to = Some(target);
                    continue;
                }

                if !actor.has_tool(&tc.name) {
                    error!(actor = %actor.role(), tool = %tc.name, "Actor called a tool outside its toolset");
                    return Err(SyllabotError::ToolNotFound(tc.name.clone()));
                }
                state.sequencer.check_tool(actor.role(), &tc.name)?;

                let input = tc.input()?;
                if tc.name == "read_pdf" {
                    let requested = input.get("pdf_url").and_then(|v| v.as_str()).unwrap_or_default();
                    state
                        .sequencer
                        .check_extraction_source(state.context.get_str(keys::PDF_URL), requested)?;
                }
                self.event_bus.publish(AgentEvent::ToolStart {
                    actor: actor.identity().to_string(),
                    name: tc.name.clone(),
                    input: input.clone(),
                });

                let result = match self.tools.execute(&tc.name, input, tool_ctx.clone()).await {
                    Ok(r) => r,
                    Err(e) => {
                        error!(actor = %actor.role(), tool = %tc.name, error = %e, "Tool execution failed, aborting run");
                        return Err(e);
                    }
                };

                self.event_bus.publish(AgentEvent::ToolEnd {
                    actor: actor.identity().to_string(),
                    name: tc.name.clone(),
                    result: result.clone(),
                });

                if !result.is_error {
                    state.sequencer.tool_succeeded(&tc.name);
                    state.context.record_tool_output(&tc.name, &result.content);
                }

                result_blocks.push(ContentBlock::ToolResult {
                    tool_use_id: tc.id.clone(),
                    content: result.content,
                    is_error: result.is_error,
                });
            }

            state.conversation.push(ChatMessage::tool_results(result_blocks));

            if let Some(to) = handoff_to {
                return Ok(ActivationOutcome::Handoff {
                    to,
                    text: text_content,
                });
            }
        }

        Err(SyllabotError::MaxTurnsExceeded(self.max_turns))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ActorDefinition, ActorGraph, ActorGraphBuilder};
    use syllabot_core::config::AppConfig;
    use syllabot_test_utils::{tool_turn, MockLlm};

    fn graph() -> ActorGraph {
        ActorRole::ALL
            .into_iter()
            .fold(ActorGraphBuilder::new(), |b, role| {
                b.actor(ActorDefinition::standard(role, context::default_instructions(role)))
            })
            .complete_edges()
            .build()
            .unwrap()
    }

    fn runtime(mock: &MockLlm, max_turns: usize) -> AgentRuntime {
        let mut config = AppConfig::default();
        config.vector_store.id = Some("vs_1".into());
        let tools = ToolRegistry::with_builtins(&config, reqwest::Client::new());
        AgentRuntime::new(
            ModelConfig::default(),
            max_turns,
            Arc::new(mock.clone()),
            Arc::new(tools),
            Arc::new(EventBus::default()),
        )
    }

    #[tokio::test]
    async fn test_final_answer() {
        let mock = MockLlm::new();
        mock.push_text("All done.");
        let graph = graph();
        let mut state = RunState::new("compare", false);

        let outcome = runtime(&mock, 4)
            .run_activation(graph.actor(ActorRole::Coordinator), &mut state)
            .await
            .unwrap();
        assert_eq!(outcome, ActivationOutcome::Final("All done.".into()));
        assert_eq!(state.conversation.len(), 2);
        assert_eq!(state.conversation[1].author.as_deref(), Some("Coordinator"));
        assert_eq!(state.input_tokens, 10);
    }

    #[tokio::test]
    async fn test_handoff_skips_later_calls() {
        let mock = MockLlm::new();
        let mut deltas = vec![StreamDelta::TextDelta("Delegating.".into())];
        deltas.extend(tool_turn("call_a", "transfer_to_retriever", serde_json::json!({})));
        deltas.push(StreamDelta::ToolUseStart {
            index: 1,
            id: "call_b".into(),
            name: "transfer_to_comparator".into(),
        });
        mock.push(deltas);

        let graph = graph();
        let mut state = RunState::new("compare", true);
        let outcome = runtime(&mock, 4)
            .run_activation(graph.actor(ActorRole::Coordinator), &mut state)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ActivationOutcome::Handoff {
                to: ActorRole::Retriever,
                text: "Delegating.".into()
            }
        );
        let results = state.conversation.last().unwrap();
        assert_eq!(results.content.len(), 2);
        assert!(matches!(
            &results.content[1],
            ContentBlock::ToolResult { content, is_error: true, .. } if content.starts_with("Skipped")
        ));
    }

    #[tokio::test]
    async fn test_missing_capability_tool_fails_before_request() {
        let mock = MockLlm::new();
        mock.push_text("unused");
        let graph = graph();
        let mut state = RunState::new("compare", false);

        // web_search is granted to the Retriever but not registered here
        let err = runtime(&mock, 4)
            .run_activation(graph.actor(ActorRole::Retriever), &mut state)
            .await
            .unwrap_err();
        assert!(matches!(err, SyllabotError::ToolNotFound(ref n) if n == "web_search"));
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn test_offers_toolset_and_handoff_tools() {
        let mock = MockLlm::new();
        mock.push_text("done");
        let graph = graph();
        let mut state = RunState::new("compare", false);
        runtime(&mock, 4)
            .run_activation(graph.actor(ActorRole::Comparator), &mut state)
            .await
            .unwrap();

        let request = &mock.requests()[0];
        assert_eq!(
            request.tools,
            vec!["file_search", "transfer_to_coordinator", "transfer_to_retriever"]
        );
        let system = request.system_prompt().unwrap();
        assert!(system.contains("You are the FileSearchAgent."));
    }

    #[tokio::test]
    async fn test_tool_outside_toolset_is_rejected() {
        let mock = MockLlm::new();
        mock.push_tool("read_pdf", serde_json::json!({"pdf_url": "https://x/y.pdf"}));
        let graph = graph();
        let mut state = RunState::new("compare", false);

        let err = runtime(&mock, 4)
            .run_activation(graph.actor(ActorRole::Comparator), &mut state)
            .await
            .unwrap_err();
        assert!(matches!(err, SyllabotError::ToolNotFound(ref n) if n == "read_pdf"));
    }

    #[tokio::test]
    async fn test_sequence_violation_aborts() {
        let mock = MockLlm::new();
        mock.push_tool("transfer_to_comparator", serde_json::json!({}));
        let graph = graph();
        let mut state = RunState::new("compare", true);

        let err = runtime(&mock, 4)
            .run_activation(graph.actor(ActorRole::Coordinator), &mut state)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "protocol");
    }

    #[tokio::test]
    async fn test_invalid_tool_input_aborts() {
        let mock = MockLlm::new();
        mock.push_tool("file_search", serde_json::json!({"query": ""}));
        let graph = graph();
        let mut state = RunState::new("compare", false);

        let err = runtime(&mock, 4)
            .run_activation(graph.actor(ActorRole::Comparator), &mut state)
            .await
            .unwrap_err();
        assert!(matches!(err, SyllabotError::ToolValidation(_)));
    }

    #[tokio::test]
    async fn test_max_turns() {
        struct StubSearch;
        impl syllabot_core::traits::Tool for StubSearch {
            fn name(&self) -> &str {
                "file_search"
            }
            fn description(&self) -> &str {
                "stub"
            }
            fn input_schema(&self) -> serde_json::Value {
                serde_json::json!({"type": "object"})
            }
            fn execute(
                &self,
                _input: serde_json::Value,
                _ctx: ToolContext,
            ) -> futures::future::BoxFuture<'_, Result<ToolResult>> {
                Box::pin(async { Ok(ToolResult::success("[1] ref.pdf (score 0.900)\nsame")) })
            }
        }

        let mock = MockLlm::new();
        for _ in 0..2 {
            mock.push_tool("file_search", serde_json::json!({"query": "chapter 1"}));
        }
        let mut registry = ToolRegistry::new();
        registry.register(StubSearch);
        let runtime = AgentRuntime::new(
            ModelConfig::default(),
            2,
            Arc::new(mock.clone()),
            Arc::new(registry),
            Arc::new(EventBus::default()),
        );
        let graph = graph();
        let mut state = RunState::new("compare", false);

        let err = runtime
            .run_activation(graph.actor(ActorRole::Comparator), &mut state)
            .await
            .unwrap_err();
        assert!(matches!(err, SyllabotError::MaxTurnsExceeded(2)));
        // user, then two rounds of assistant call + tool results
        assert_eq!(state.conversation.len(), 5);
    }

    #[test]
    fn test_accumulator_input() {
        let empty = ToolCallAccumulator::default();
        assert_eq!(empty.input().unwrap(), serde_json::json!({}));

        let bad = ToolCallAccumulator {
            id: "1".into(),
            name: "read_pdf".into(),
            input_json: "{\"pdf_url\":".into(),
        };
        assert!(bad.input().is_err());
    }
}

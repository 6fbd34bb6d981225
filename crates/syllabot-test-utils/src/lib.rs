//! Shared test utilities: a scripted LLM, PDF and HTML fixtures, and
//! ready-made contexts for Syllabot crates.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use futures::stream::{self, BoxStream};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use syllabot_core::config::{AppConfig, ModelConfig};
use syllabot_core::error::{Result, SyllabotError};
use syllabot_core::traits::LlmClient;
use syllabot_core::types::*;

// ── Scripted LLM ────────────────────────────────────────────────

/// What the model was asked on one call.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<String>,
}

impl RecordedRequest {
    /// Text of the leading system message, if any.
    pub fn system_prompt(&self) -> Option<String> {
        self.messages
            .first()
            .filter(|m| m.role == Role::System)
            .map(|m| m.text())
    }
}

#[derive(Default)]
struct MockState {
    script: VecDeque<Vec<StreamDelta>>,
    requests: Vec<RecordedRequest>,
}

/// An `LlmClient` that replays one scripted response per call and records
/// every request. Clones share the same script.
#[derive(Clone, Default)]
pub struct MockLlm {
    state: Arc<Mutex<MockState>>,
}

impl MockLlm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one response.
    pub fn push(&self, deltas: Vec<StreamDelta>) -> &Self {
        self.state.lock().unwrap().script.push_back(deltas);
        self
    }

    /// Queue a plain-text final answer.
    pub fn push_text(&self, text: &str) -> &Self {
        self.push(text_turn(text))
    }

    /// Queue a single tool call.
    pub fn push_tool(&self, name: &str, input: serde_json::Value) -> &Self {
        let id = format!("call_{}", self.state.lock().unwrap().script.len() + 1);
        self.push(tool_turn(&id, name, input))
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn remaining(&self) -> usize {
        self.state.lock().unwrap().script.len()
    }
}

impl LlmClient for MockLlm {
    fn chat_stream(
        &self,
        _config: &ModelConfig,
        messages: Vec<ChatMessage>,
        tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        let tools: Vec<String> = tools.iter().map(|t| t.name.clone()).collect();
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.requests.push(RecordedRequest { messages, tools });
            let deltas = state
                .script
                .pop_front()
                .ok_or_else(|| SyllabotError::LlmRequest("mock script exhausted".into()))?;
            let items: Vec<Result<StreamDelta>> = deltas.into_iter().map(Ok).collect();
            Ok(Box::pin(stream::iter(items)) as BoxStream<'_, Result<StreamDelta>>)
        })
    }
}

/// Deltas for a text-only answer.
pub fn text_turn(text: &str) -> Vec<StreamDelta> {
    vec![
        StreamDelta::TextDelta(text.to_string()),
        StreamDelta::Stop(StopReason::EndTurn),
        StreamDelta::Usage {
            input_tokens: 10,
            output_tokens: 5,
        },
    ]
}

/// Deltas for one tool call, with arguments streamed in two pieces.
pub fn tool_turn(id: &str, name: &str, input: serde_json::Value) -> Vec<StreamDelta> {
    let args = input.to_string();
    let (head, tail) = args.split_at(args.len() / 2);
    vec![
        StreamDelta::ToolUseStart {
            index: 0,
            id: id.to_string(),
            name: name.to_string(),
        },
        StreamDelta::ToolInputDelta {
            index: 0,
            delta: head.to_string(),
        },
        StreamDelta::ToolInputDelta {
            index: 0,
            delta: tail.to_string(),
        },
        StreamDelta::Stop(StopReason::ToolUse),
    ]
}

// ── Fixtures ────────────────────────────────────────────────────

/// A PDF with one page per entry; an empty entry produces a page without text.
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for text in pages {
        let operations = if text.is_empty() {
            vec![]
        } else {
            vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ]
        };
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode page content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("serialize fixture PDF");
    bytes
}

/// A minimal HTML page whose body holds the given fragments in order.
pub fn html_page(fragments: &[&str]) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><title>Ke stažení</title></head><body>\n{}\n</body></html>",
        fragments.join("\n")
    )
}

/// Source page markup with a single syllabus link at `href`.
pub fn syllabus_page(href: &str) -> String {
    html_page(&[
        r#"<a download="ISTQB_CTFL_Glossary_CZ.pdf" href="/files/glossary.pdf">Glossary</a>"#,
        &format!(r#"<a download="ISTQB_CTFL_Syllabus_CZ.pdf" href="{}">Syllabus</a>"#, href),
    ])
}

pub fn test_tool_context() -> ToolContext {
    ToolContext {
        run_id: RunId::new(),
        actor: "WebSearchAgent".to_string(),
    }
}

/// Config with a vector store id and a prompts dir that does not exist, so
/// built-in prompts are used.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.vector_store.id = Some("vs_test".to_string());
    config.prompts.dir = "/nonexistent/syllabot-prompts".to_string();
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_mock_llm_replays_script() {
        let mock = MockLlm::new();
        mock.push_text("hello");
        let mut stream = mock
            .chat_stream(&ModelConfig::default(), vec![ChatMessage::system("sys")], &[])
            .await
            .unwrap();
        assert!(matches!(stream.next().await, Some(Ok(StreamDelta::TextDelta(ref t))) if t == "hello"));
        drop(stream);
        assert_eq!(mock.requests()[0].system_prompt().as_deref(), Some("sys"));
        assert!(mock
            .chat_stream(&ModelConfig::default(), vec![], &[])
            .await
            .is_err());
    }

    #[test]
    fn test_pdf_fixture_loads() {
        let bytes = pdf_with_pages(&["A", "", "B"]);
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
    }
}

use std::path::Path;

use tracing::{debug, warn};

use syllabot_core::config::PromptsConfig;
use syllabot_core::types::ChatMessage;

use crate::graph::{Actor, ActorRole, HandoffContext};

/// Prepended to every actor's instructions so the model knows how hand-offs work.
pub const HANDOFF_PREFIX: &str = "# System context
You are one of several cooperating agents. Each agent has its own instructions and tools, and \
can hand the conversation to another agent by calling a hand-off function named \
`transfer_to_<agent>`. The conversation so far, including other agents' tool results, is \
shared. Hand-offs happen in the background; do not mention them in your answers.";

const DEFAULT_COORDINATOR_PROMPT: &str = r#"You are the Coordinator.

1. Hand off to the WebSearchAgent to locate the Czech ISTQB CTFL syllabus PDF and read its text.
2. When it returns, hand off to the FileSearchAgent to compare that text with the reference syllabus.
3. When it returns, answer the user with a concise summary of the comparison.

Never skip a step and never answer before the comparison is done."#;

const DEFAULT_RETRIEVER_PROMPT: &str = r#"You are the WebSearchAgent.

1. Call `locate_pdf` to find the syllabus PDF link.
2. Call `read_pdf` with the returned URL to read the syllabus text.
3. Summarize what you retrieved in a sentence or two, then hand control back to the Coordinator."#;

const DEFAULT_COMPARATOR_PROMPT: &str = r#"You are the FileSearchAgent.

Use `file_search` to find the passages of the reference syllabus that correspond to the
retrieved syllabus text in the conversation. Compare structure and content, note what
matches and what differs, then hand control back to the Coordinator with your findings."#;

pub const DEFAULT_USER_INPUT: &str =
    "Find the current Czech ISTQB CTFL syllabus, read it, and compare it with the reference syllabus in the vector store. Summarize the differences.";

/// Built-in instructions for `role`.
pub fn default_instructions(role: ActorRole) -> &'static str {
    match role {
        ActorRole::Coordinator => DEFAULT_COORDINATOR_PROMPT,
        ActorRole::Retriever => DEFAULT_RETRIEVER_PROMPT,
        ActorRole::Comparator => DEFAULT_COMPARATOR_PROMPT,
    }
}

/// Read a text file, falling back to `fallback` when it is missing, unreadable
/// or blank.
pub fn load_text_or(path: &Path, fallback: &str, label: &str) -> String {
    match std::fs::read_to_string(path) {
        Ok(content) if !content.trim().is_empty() => {
            debug!(path = %path.display(), label, "Loaded prompt file");
            content
        }
        Ok(_) => {
            warn!(path = %path.display(), label, "Prompt file is empty, using built-in default");
            fallback.to_string()
        }
        Err(e) => {
            warn!(path = %path.display(), label, error = %e, "Failed to read prompt file, using built-in default");
            fallback.to_string()
        }
    }
}

/// Instructions for `role` from the prompt directory.
pub fn load_instructions(prompts: &PromptsConfig, role: ActorRole) -> String {
    let file = match role {
        ActorRole::Coordinator => &prompts.coordinator,
        ActorRole::Retriever => &prompts.retriever,
        ActorRole::Comparator => &prompts.comparator,
    };
    load_text_or(
        &prompts.prompt_path(file),
        default_instructions(role),
        role.identity(),
    )
}

/// The user's request. `user_input` is resolved relative to the working
/// directory, not the prompt directory.
pub fn load_user_input(prompts: &PromptsConfig) -> String {
    load_text_or(Path::new(&prompts.user_input), DEFAULT_USER_INPUT, "user_input")
}

/// Assemble a system prompt from parts.
pub struct ContextBuilder {
    parts: Vec<String>,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self { parts: Vec::new() }
    }

    /// Add a base system prompt.
    pub fn with_base_prompt(mut self, prompt: &str) -> Self {
        self.parts.push(prompt.to_string());
        self
    }

    /// Add custom instructions.
    pub fn with_instructions(mut self, instructions: &str) -> Self {
        if !instructions.trim().is_empty() {
            self.parts.push(instructions.trim().to_string());
        }
        self
    }

    /// Build the final system message.
    pub fn build(self) -> ChatMessage {
        ChatMessage::system(self.parts.join("\n\n"))
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// System message for one activation of `actor`.
pub fn build_actor_context(actor: &Actor, context: &HandoffContext) -> ChatMessage {
    ContextBuilder::new()
        .with_base_prompt(HANDOFF_PREFIX)
        .with_instructions(&actor.build_prompt(context))
        .build()
}

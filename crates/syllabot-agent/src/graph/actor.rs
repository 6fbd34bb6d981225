use std::fmt;

use serde::{Deserialize, Serialize};

use super::handoff::{keys, HandoffContext};

/// The three participants of the comparison protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Coordinator,
    Retriever,
    Comparator,
}

impl ActorRole {
    pub const ALL: [ActorRole; 3] = [
        ActorRole::Coordinator,
        ActorRole::Retriever,
        ActorRole::Comparator,
    ];

    /// Name the actor is known by in the conversation.
    pub fn identity(self) -> &'static str {
        match self {
            Self::Coordinator => "Coordinator",
            Self::Retriever => "WebSearchAgent",
            Self::Comparator => "FileSearchAgent",
        }
    }

    /// Name of the tool other actors call to hand control to this one.
    pub fn handoff_tool(self) -> &'static str {
        match self {
            Self::Coordinator => "transfer_to_coordinator",
            Self::Retriever => "transfer_to_retriever",
            Self::Comparator => "transfer_to_comparator",
        }
    }

    pub fn from_handoff_tool(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.handoff_tool() == name)
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Coordinator => 0,
            Self::Retriever => 1,
            Self::Comparator => 2,
        }
    }

    /// One-line description used in hand-off tool definitions.
    pub fn handoff_description(self) -> &'static str {
        match self {
            Self::Coordinator => {
                "Hand control back to the Coordinator once your part of the task is done."
            }
            Self::Retriever => {
                "Hand off to the WebSearchAgent, which locates the syllabus PDF and reads its text."
            }
            Self::Comparator => {
                "Hand off to the FileSearchAgent, which compares the retrieved syllabus with the reference document."
            }
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identity())
    }
}

/// A named tool an actor may be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    WebSearch,
    LocatePdf,
    ReadPdf,
    FileSearch,
}

impl Capability {
    pub fn tool_name(self) -> &'static str {
        match self {
            Self::WebSearch => "web_search",
            Self::LocatePdf => "locate_pdf",
            Self::ReadPdf => "read_pdf",
            Self::FileSearch => "file_search",
        }
    }
}

/// Everything needed to define an actor before the graph wires it.
#[derive(Debug, Clone)]
pub struct ActorDefinition {
    pub role: ActorRole,
    pub instructions: String,
    pub capabilities: Vec<Capability>,
    /// Context keys rendered into this actor's system prompt.
    pub input_keys: Vec<String>,
    /// Context keys this actor's closing text is stored under.
    pub output_keys: Vec<String>,
}

impl ActorDefinition {
    pub fn new(role: ActorRole) -> Self {
        Self {
            role,
            instructions: String::new(),
            capabilities: vec![],
            input_keys: vec![],
            output_keys: vec![],
        }
    }

    /// The standard wiring for `role`: its toolset and context keys.
    pub fn standard(role: ActorRole, instructions: impl Into<String>) -> Self {
        let def = Self::new(role).with_instructions(instructions);
        match role {
            ActorRole::Coordinator => def.with_inputs(vec![
                keys::PDF_URL.into(),
                keys::SYLLABUS_CHARS.into(),
                keys::RETRIEVAL_SUMMARY.into(),
                keys::COMPARISON.into(),
            ]),
            ActorRole::Retriever => def
                .with_capabilities(vec![
                    Capability::WebSearch,
                    Capability::LocatePdf,
                    Capability::ReadPdf,
                ])
                .with_outputs(vec![keys::RETRIEVAL_SUMMARY.into()]),
            ActorRole::Comparator => def
                .with_capabilities(vec![Capability::FileSearch])
                .with_inputs(vec![
                    keys::PDF_URL.into(),
                    keys::SYLLABUS_CHARS.into(),
                    keys::RETRIEVAL_SUMMARY.into(),
                ])
                .with_outputs(vec![keys::COMPARISON.into()]),
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn with_capabilities(mut self, capabilities: Vec<Capability>) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_inputs(mut self, keys: Vec<String>) -> Self {
        self.input_keys = keys;
        self
    }

    pub fn with_outputs(mut self, keys: Vec<String>) -> Self {
        self.output_keys = keys;
        self
    }
}

/// A fully wired, read-only actor. Only [`super::ActorGraphBuilder`] creates these.
#[derive(Debug, Clone)]
pub struct Actor {
    role: ActorRole,
    instructions: String,
    capabilities: Vec<Capability>,
    handoffs: Vec<ActorRole>,
    input_keys: Vec<String>,
    output_keys: Vec<String>,
}

impl Actor {
    pub(crate) fn wire(def: ActorDefinition, handoffs: Vec<ActorRole>) -> Self {
        Self {
            role: def.role,
            instructions: def.instructions,
            capabilities: def.capabilities,
            handoffs,
            input_keys: def.input_keys,
            output_keys: def.output_keys,
        }
    }

    pub fn role(&self) -> ActorRole {
        self.role
    }

    pub fn identity(&self) -> &'static str {
        self.role.identity()
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Actors this one may hand control to.
    pub fn handoffs(&self) -> &[ActorRole] {
        &self.handoffs
    }

    pub fn input_keys(&self) -> &[String] {
        &self.input_keys
    }

    pub fn output_keys(&self) -> &[String] {
        &self.output_keys
    }

    pub fn tool_names(&self) -> Vec<&'static str> {
        self.capabilities.iter().map(|c| c.tool_name()).collect()
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.capabilities.iter().any(|c| c.tool_name() == name)
    }

    /// The hand-off target addressed by tool `name`, if this actor may use it.
    pub fn handoff_target(&self, name: &str) -> Option<ActorRole> {
        ActorRole::from_handoff_tool(name).filter(|r| self.handoffs.contains(r))
    }

    /// Render this actor's instructions followed by the context values for
    /// its input keys. Keys without a value are left out.
    pub fn build_prompt(&self, context: &HandoffContext) -> String {
        let mut prompt = self.instructions.trim().to_string();

        let section = context.render(&self.input_keys);
        if !section.is_empty() {
            prompt.push_str("\n\n## Context Data\n\n");
            prompt.push_str(&section);
        }
        prompt
    }
}

//! The order in which the comparison protocol may proceed.
//!
//! ```text
//! Start ─Coordinator→Retriever─▶ Retrieving{located, extracted}
//!       ─Retriever→Coordinator (located && extracted)─▶ Retrieved
//!       ─Coordinator→Comparator─▶ Comparing
//!       ─Comparator→Coordinator─▶ Compared
//!       ─Coordinator final answer─▶ Done
//! ```
//!
//! With enforcement off every check passes and the phase is not tracked.

use std::fmt;

use tracing::warn;

use syllabot_core::error::{Result, SyllabotError};

use super::actor::ActorRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    Retrieving { located: bool, extracted: bool },
    Retrieved,
    Comparing,
    Compared,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str("start"),
            Self::Retrieving { located, extracted } => {
                write!(f, "retrieving (located={}, extracted={})", located, extracted)
            }
            Self::Retrieved => f.write_str("retrieved"),
            Self::Comparing => f.write_str("comparing"),
            Self::Compared => f.write_str("compared"),
            Self::Done => f.write_str("done"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Sequencer {
    enforce: bool,
    phase: Phase,
}

impl Sequencer {
    pub fn new(enforce: bool) -> Self {
        Self {
            enforce,
            phase: Phase::Start,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_enforced(&self) -> bool {
        self.enforce
    }

    fn violation(&self, action: String) -> SyllabotError {
        SyllabotError::ProtocolViolation {
            phase: self.phase.to_string(),
            action,
        }
    }

    /// Check and apply a hand-off.
    pub fn handoff(&mut self, from: ActorRole, to: ActorRole) -> Result<()> {
        if !self.enforce {
            return Ok(());
        }
        let next = match (self.phase, from, to) {
            (Phase::Start, ActorRole::Coordinator, ActorRole::Retriever) => Phase::Retrieving {
                located: false,
                extracted: false,
            },
            (
                Phase::Retrieving {
                    located: true,
                    extracted: true,
                },
                ActorRole::Retriever,
                ActorRole::Coordinator,
            ) => Phase::Retrieved,
            (Phase::Retrieved, ActorRole::Coordinator, ActorRole::Comparator) => Phase::Comparing,
            (Phase::Comparing, ActorRole::Comparator, ActorRole::Coordinator) => Phase::Compared,
            _ => return Err(self.violation(format!("hand-off {} -> {}", from, to))),
        };
        self.phase = next;
        Ok(())
    }

    /// Check that `actor` may call `tool` now.
    pub fn check_tool(&self, actor: ActorRole, tool: &str) -> Result<()> {
        if !self.enforce {
            return Ok(());
        }
        let allowed = match (self.phase, actor, tool) {
            (Phase::Retrieving { .. }, ActorRole::Retriever, "web_search" | "locate_pdf") => true,
            (Phase::Retrieving { located, .. }, ActorRole::Retriever, "read_pdf") => located,
            (Phase::Comparing, ActorRole::Comparator, "file_search") => true,
            _ => false,
        };
        if allowed {
            Ok(())
        } else {
            Err(self.violation(format!("{} calls {}", actor, tool)))
        }
    }

    /// Check that `read_pdf` targets the URL `locate_pdf` produced.
    ///
    /// Unenforced runs only log the mismatch.
    pub fn check_extraction_source(&self, located: Option<&str>, requested: &str) -> Result<()> {
        let requested = requested.trim();
        let Some(located) = located.filter(|l| *l != requested) else {
            return Ok(());
        };
        if !self.enforce {
            warn!(located, requested, "read_pdf targets a URL other than the located one");
            return Ok(());
        }
        Err(self.violation(format!("read_pdf of {} instead of located {}", requested, located)))
    }

    /// Record a successful tool call.
    pub fn tool_succeeded(&mut self, tool: &str) {
        if let Phase::Retrieving { located, extracted } = &mut self.phase {
            match tool {
                "locate_pdf" => *located = true,
                "read_pdf" => *extracted = true,
                _ => {}
            }
        }
    }

    /// Check and apply a final answer by `actor`.
    pub fn finish(&mut self, actor: ActorRole) -> Result<()> {
        if !self.enforce {
            return Ok(());
        }
        match (self.phase, actor) {
            (Phase::Compared, ActorRole::Coordinator) => {
                self.phase = Phase::Done;
                Ok(())
            }
            _ => Err(self.violation(format!("final answer by {}", actor))),
        }
    }
}

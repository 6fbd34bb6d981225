use std::collections::HashSet;
use std::fmt::Write as _;

use syllabot_core::error::{Result, SyllabotError};

use super::actor::{Actor, ActorDefinition, ActorRole};
use super::edge::HandoffEdge;

/// Collects actor definitions and hand-off edges, then validates and wires
/// them into an [`ActorGraph`] in one step.
#[derive(Debug, Default)]
pub struct ActorGraphBuilder {
    definitions: Vec<ActorDefinition>,
    edges: Vec<HandoffEdge>,
}

impl ActorGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actor(mut self, def: ActorDefinition) -> Self {
        self.definitions.push(def);
        self
    }

    pub fn edge(mut self, from: ActorRole, to: ActorRole) -> Self {
        self.edges.push(HandoffEdge::new(from, to));
        self
    }

    /// Allow every actor to hand off to every other actor.
    pub fn complete_edges(mut self) -> Self {
        self.edges.extend(HandoffEdge::complete());
        self
    }

    /// Validate and wire. Each role must be defined exactly once, edges may
    /// only join defined actors and none may point back at its source.
    /// Duplicate edges collapse.
    pub fn build(self) -> Result<ActorGraph> {
        let mut slots: [Option<ActorDefinition>; 3] = [None, None, None];
        for def in self.definitions {
            let slot = &mut slots[def.role.index()];
            if slot.is_some() {
                return Err(SyllabotError::Configuration(format!(
                    "actor {} is defined more than once",
                    def.role
                )));
            }
            *slot = Some(def);
        }

        let mut seen = HashSet::new();
        let mut edges = Vec::new();
        for edge in self.edges {
            if edge.is_self_edge() {
                return Err(SyllabotError::Configuration(format!(
                    "actor {} cannot hand off to itself",
                    edge.from
                )));
            }
            if let Some(role) = [edge.from, edge.to]
                .into_iter()
                .find(|r| slots[r.index()].is_none())
            {
                return Err(SyllabotError::UnknownActor(role.identity().to_string()));
            }
            if seen.insert(edge) {
                edges.push(edge);
            }
        }

        let [coordinator, retriever, comparator] = slots;
        let mut actors = Vec::with_capacity(3);
        for (role, def) in ActorRole::ALL
            .into_iter()
            .zip([coordinator, retriever, comparator])
        {
            let def = def.ok_or_else(|| {
                SyllabotError::Configuration(format!("actor {} is not defined", role))
            })?;
            let handoffs = edges
                .iter()
                .filter(|e| e.from == role)
                .map(|e| e.to)
                .collect();
            actors.push(Actor::wire(def, handoffs));
        }

        Ok(ActorGraph { actors, edges })
    }
}

/// The wired, immutable set of actors for one run. Entry is always the
/// Coordinator.
#[derive(Debug, Clone)]
pub struct ActorGraph {
    /// Indexed by [`ActorRole::index`].
    actors: Vec<Actor>,
    edges: Vec<HandoffEdge>,
}

impl ActorGraph {
    pub fn entry(&self) -> ActorRole {
        ActorRole::Coordinator
    }

    pub fn actor(&self, role: ActorRole) -> &Actor {
        &self.actors[role.index()]
    }

    pub fn actors(&self) -> &[Actor] {
        &self.actors
    }

    pub fn edges(&self) -> &[HandoffEdge] {
        &self.edges
    }

    pub fn can_handoff(&self, from: ActorRole, to: ActorRole) -> bool {
        self.edges.contains(&HandoffEdge::new(from, to))
    }

    /// Human-readable outline of actors, their tools and hand-off targets.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for actor in &self.actors {
            let tools = actor.tool_names();
            let targets: Vec<&str> = actor.handoffs().iter().map(|r| r.identity()).collect();
            let _ = writeln!(out, "{}{}", actor.identity(), if actor.role() == self.entry() { " (entry)" } else { "" });
            let _ = writeln!(
                out,
                "  tools:    {}",
                if tools.is_empty() { "-".to_string() } else { tools.join(", ") }
            );
            let _ = writeln!(
                out,
                "  handoffs: {}",
                if targets.is_empty() { "-".to_string() } else { targets.join(", ") }
            );
        }
        out
    }
}

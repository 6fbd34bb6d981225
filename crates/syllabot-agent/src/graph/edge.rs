use serde::{Deserialize, Serialize};

use super::actor::ActorRole;

/// A directed hand-off permission: `from` may transfer control to `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandoffEdge {
    pub from: ActorRole,
    pub to: ActorRole,
}

impl HandoffEdge {
    pub fn new(from: ActorRole, to: ActorRole) -> Self {
        Self { from, to }
    }

    /// Every ordered pair of distinct roles.
    pub fn complete() -> Vec<HandoffEdge> {
        ActorRole::ALL
            .into_iter()
            .flat_map(|from| {
                ActorRole::ALL
                    .into_iter()
                    .filter(move |to| *to != from)
                    .map(move |to| HandoffEdge::new(from, to))
            })
            .collect()
    }

    pub fn is_self_edge(&self) -> bool {
        self.from == self.to
    }
}

//! Actor graph and hand-off protocol.
//!
//! Three actors (Coordinator, Retriever, Comparator) share one conversation
//! and pass control with `transfer_to_<role>` tool calls. The graph is wired
//! once by [`ActorGraphBuilder`] and never changes during a run. The
//! [`Sequencer`] holds the order the protocol must follow, and the
//! [`HandoffExecutor`] drives activations until a final answer.

pub mod actor;
pub mod builder;
pub mod edge;
pub mod executor;
pub mod handoff;
pub mod sequence;

pub use actor::{Actor, ActorDefinition, ActorRole, Capability};
pub use builder::{ActorGraph, ActorGraphBuilder};
pub use edge::HandoffEdge;
pub use executor::{Activation, HandoffExecutor, RunResult};
pub use handoff::{keys, HandoffContext};
pub use sequence::{Phase, Sequencer};

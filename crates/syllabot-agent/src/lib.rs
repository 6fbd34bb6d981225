pub mod agent_loop;
pub mod context;
pub mod graph;
pub mod orchestrator;

pub use agent_loop::{ActivationOutcome, AgentRuntime, RunState};
pub use graph::{
    ActorDefinition, ActorGraph, ActorGraphBuilder, ActorRole, Capability, HandoffContext,
    HandoffExecutor, RunResult,
};
pub use orchestrator::{envelope_for, run_comparison, Orchestrator};

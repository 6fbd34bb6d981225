use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info};

use syllabot_core::config::ProtocolConfig;
use syllabot_core::error::{Result, SyllabotError};
use syllabot_core::event::{AgentEvent, EventBus};
use syllabot_core::types::RunId;

use super::actor::ActorRole;
use super::builder::ActorGraph;
use super::handoff::HandoffContext;
use crate::agent_loop::{ActivationOutcome, AgentRuntime, RunState};

/// One stretch of control held by an actor.
#[derive(Debug, Clone)]
pub struct Activation {
    pub actor: ActorRole,
    /// Text the actor produced when it gave up control.
    pub output: String,
    pub elapsed_ms: u64,
}

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub run_id: RunId,
    /// The final answer.
    pub output: String,
    pub final_actor: ActorRole,
    /// Activations in order.
    pub activations: Vec<Activation>,
    pub handoffs: usize,
    pub context: HandoffContext,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub elapsed_ms: u64,
}

impl RunResult {
    /// Actor identities in activation order.
    pub fn transcript(&self) -> Vec<&'static str> {
        self.activations.iter().map(|a| a.actor.identity()).collect()
    }
}

/// Walks the actor graph from its entry actor, passing control along
/// hand-offs until an actor gives a final answer.
///
/// Any error from an activation ends the run; there is no retry and no
/// fallback hand-off.
pub struct HandoffExecutor {
    graph: ActorGraph,
    runtime: AgentRuntime,
    protocol: ProtocolConfig,
    event_bus: Arc<EventBus>,
}

impl HandoffExecutor {
    pub fn new(
        graph: ActorGraph,
        runtime: AgentRuntime,
        protocol: ProtocolConfig,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            graph,
            runtime,
            protocol,
            event_bus,
        }
    }

    pub fn graph(&self) -> &ActorGraph {
        &self.graph
    }

    pub async fn run(&self, user_input: &str) -> Result<RunResult> {
        let mut state = RunState::new(user_input, self.protocol.enforce_sequence);
        let run_id = state.run_id.clone();

        match self.run_inner(&mut state).await {
            Ok(result) => Ok(result),
            Err(e) => {
                error!(run_id = %run_id, error = %e, "Run failed");
                self.event_bus.publish(AgentEvent::RunError {
                    run_id,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run_inner(&self, state: &mut RunState) -> Result<RunResult> {
        let start = Instant::now();
        let mut current = self.graph.entry();
        let mut activations = Vec::new();
        let mut handoffs = 0usize;

        info!(run_id = %state.run_id, entry = %current, "Run started");
        self.event_bus.publish(AgentEvent::RunStarted {
            run_id: state.run_id.clone(),
            actor: current.identity().to_string(),
        });

        loop {
            let actor = self.graph.actor(current);
            self.event_bus.publish(AgentEvent::ActorActivated {
                actor: actor.identity().to_string(),
            });
            info!(actor = %current, "Actor activated");

            let activation_start = Instant::now();
            let outcome = self.runtime.run_activation(actor, state).await?;
            let elapsed_ms = activation_start.elapsed().as_millis() as u64;

            match outcome {
                ActivationOutcome::Final(text) => {
                    state.sequencer.finish(current)?;
                    state.context.ingest_output(actor.output_keys(), &text);
                    activations.push(Activation {
                        actor: current,
                        output: text.clone(),
                        elapsed_ms,
                    });

                    info!(
                        run_id = %state.run_id,
                        final_actor = %current,
                        handoffs,
                        input_tokens = state.input_tokens,
                        output_tokens = state.output_tokens,
                        "Run complete"
                    );
                    self.event_bus.publish(AgentEvent::RunComplete {
                        run_id: state.run_id.clone(),
                        final_actor: current.identity().to_string(),
                        handoffs,
                        input_tokens: state.input_tokens,
                        output_tokens: state.output_tokens,
                    });

                    return Ok(RunResult {
                        run_id: state.run_id.clone(),
                        output: text,
                        final_actor: current,
                        activations,
                        handoffs,
                        context: state.context.clone(),
                        input_tokens: state.input_tokens,
                        output_tokens: state.output_tokens,
                        elapsed_ms: start.elapsed().as_millis() as u64,
                    });
                }
                ActivationOutcome::Handoff { to, text } => {
                    state.context.ingest_output(actor.output_keys(), &text);
                    activations.push(Activation {
                        actor: current,
                        output: text,
                        elapsed_ms,
                    });

                    handoffs += 1;
                    if handoffs > self.protocol.max_handoffs {
                        return Err(SyllabotError::MaxHandoffsExceeded(self.protocol.max_handoffs));
                    }

                    info!(from = %current, to = %to, "Hand-off");
                    self.event_bus.publish(AgentEvent::Handoff {
                        from: current.identity().to_string(),
                        to: to.identity().to_string(),
                    });
                    current = to;
                }
            }
        }
    }
}

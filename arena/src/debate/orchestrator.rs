//! Round orchestrator — drives one debate from start to summary.
//!
//! Every state change goes through the session registry first and is then
//! published on the event bus, so viewers see events in mutation order.
//!
//! ```text
//! AwaitingTurn(r, 0) → … → AwaitingTurn(r, n) → AwaitingModerator(r)
//!        ▲                                            │
//!        └──── continue, r < ceiling ──── RoundClosed(r, decision)
//!                                                     │ conclude / ceiling
//!                                                     ▼
//!                                              AwaitingSummary → Done
//! ```

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::error::{DebateError, DebateResult, UpstreamStage};
use super::guardrails::GuardrailEngine;
use super::memory_bridge::{record_debate_insights, AgentMemoryStore};
use super::moderator::ModeratorEngine;
use super::pause::{Checkpoint, SharedPauseController};
use super::persistence::{FinishedDebateRecord, HistoryStore};
use super::provider::{AgentTurnProvider, AgentTurnRequest, ModeratorContext, SummaryRequest};
use crate::error::ArenaError;
use crate::events::{DebateEvent, EventKind, SharedEventBus};
use crate::session::{DebateSession, DebateStatus, Decision, ModeratorStep, SharedSessionRegistry};

/// Position of the round loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    AwaitingTurn { round: u32, agent_index: usize },
    AwaitingModerator { round: u32 },
    RoundClosed { round: u32, decision: Decision },
    AwaitingSummary,
    Done,
}

/// How a round task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed { rounds: u32 },
    /// The session was evicted or finished elsewhere.
    Discarded,
    Failed { message: String },
}

/// Shared reference to RoundOrchestrator
pub type SharedRoundOrchestrator = Arc<RoundOrchestrator>;

pub struct RoundOrchestrator {
    registry: SharedSessionRegistry,
    bus: SharedEventBus,
    pause: SharedPauseController,
    agents: Arc<dyn AgentTurnProvider>,
    moderator: ModeratorEngine,
    guardrails: GuardrailEngine,
    history: Option<Arc<dyn HistoryStore>>,
    memory: Option<Arc<dyn AgentMemoryStore>>,
}

impl RoundOrchestrator {
    pub fn new(
        registry: SharedSessionRegistry,
        bus: SharedEventBus,
        pause: SharedPauseController,
        agents: Arc<dyn AgentTurnProvider>,
        moderator: ModeratorEngine,
    ) -> Self {
        Self {
            registry,
            bus,
            pause,
            agents,
            moderator,
            guardrails: GuardrailEngine::default(),
            history: None,
            memory: None,
        }
    }

    pub fn with_history(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_memory(mut self, memory: Arc<dyn AgentMemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Create a shared reference to this orchestrator
    pub fn shared(self) -> SharedRoundOrchestrator {
        Arc::new(self)
    }

    /// Run the debate on its own task.
    pub fn spawn(self: &Arc<Self>, debate_id: &str) -> JoinHandle<RunOutcome> {
        let this = Arc::clone(self);
        let debate_id = debate_id.to_string();
        tokio::spawn(async move { this.run(&debate_id).await })
    }

    /// Drive the debate to a terminal status. Upstream failures mark the
    /// session as errored and publish `debate_error`.
    pub async fn run(&self, debate_id: &str) -> RunOutcome {
        let outcome = self.settle(debate_id).await;
        self.pause.release(debate_id);
        outcome
    }

    async fn settle(&self, debate_id: &str) -> RunOutcome {
        match self.drive(debate_id).await {
            Ok(outcome) => outcome,
            Err(err) if err.is_discarded() => {
                info!(debate_id, "Session discarded, round loop exiting");
                RunOutcome::Discarded
            }
            Err(err) => {
                let message = err.to_string();
                error!(debate_id, round = ?err.round(), "Debate failed: {}", message);
                match self.registry.set_error(debate_id, &message) {
                    Ok(()) => {}
                    Err(e) if e.is_not_found() => return RunOutcome::Discarded,
                    Err(e) => warn!(debate_id, "Could not record debate error: {}", e),
                }
                self.publish(
                    debate_id,
                    EventKind::DebateError {
                        message: message.clone(),
                        round: err.round(),
                    },
                );
                RunOutcome::Failed { message }
            }
        }
    }

    fn publish(&self, debate_id: &str, kind: EventKind) {
        self.bus.publish(DebateEvent::new(debate_id, kind));
    }

    fn session(&self, debate_id: &str) -> DebateResult<DebateSession> {
        self.registry
            .get(debate_id)
            .ok_or_else(|| ArenaError::NotFound(debate_id.to_string()).into())
    }

    async fn drive(&self, debate_id: &str) -> DebateResult<RunOutcome> {
        self.registry.start(debate_id)?;
        let session = self.session(debate_id)?;
        info!(debate_id, topic = %session.topic, agents = session.agent_ids.len(), max_rounds = session.max_rounds, "Debate started");
        self.publish(
            debate_id,
            EventKind::DebateStarted {
                topic: session.topic.clone(),
                agent_ids: session.agent_ids.clone(),
                max_rounds: session.max_rounds,
                branched_from: session.branched_from.clone(),
            },
        );

        let (round, agent_index) = session.resume_point();
        let agent_count = session.agent_ids.len();
        let mut entered_round: Option<u32> = None;
        let mut phase = RoundPhase::AwaitingTurn { round, agent_index };

        loop {
            debug!(debate_id, ?phase, "Round loop step");
            phase = match phase {
                RoundPhase::AwaitingTurn { round, agent_index } => {
                    if agent_index >= agent_count {
                        RoundPhase::AwaitingModerator { round }
                    } else {
                        if self.pause.checkpoint(debate_id).await? == Checkpoint::Discarded {
                            return Ok(RunOutcome::Discarded);
                        }
                        if entered_round != Some(round) {
                            entered_round = Some(round);
                            info!(debate_id, round, "Round started");
                            self.publish(debate_id, EventKind::RoundStarted { round });
                        }
                        self.take_turn(debate_id, round, agent_index).await?;
                        RoundPhase::AwaitingTurn {
                            round,
                            agent_index: agent_index + 1,
                        }
                    }
                }

                RoundPhase::AwaitingModerator { round } => {
                    if self.pause.checkpoint(debate_id).await? == Checkpoint::Discarded {
                        return Ok(RunOutcome::Discarded);
                    }
                    let decision = self.evaluate_round(debate_id, round).await?;
                    RoundPhase::RoundClosed { round, decision }
                }

                RoundPhase::RoundClosed { round, decision } => {
                    let max_rounds = self.session(debate_id)?.max_rounds;
                    if decision == Decision::Conclude
                        || self.guardrails.evaluate_round(round, max_rounds).should_stop()
                    {
                        RoundPhase::AwaitingSummary
                    } else {
                        RoundPhase::AwaitingTurn {
                            round: round + 1,
                            agent_index: 0,
                        }
                    }
                }

                RoundPhase::AwaitingSummary => {
                    if !self.enter_concluding(debate_id).await? {
                        return Ok(RunOutcome::Discarded);
                    }
                    self.conclude(debate_id).await?;
                    RoundPhase::Done
                }

                RoundPhase::Done => {
                    let rounds = self.session(debate_id).map(|s| s.current_round).unwrap_or(0);
                    return Ok(RunOutcome::Completed { rounds });
                }
            };
        }
    }

    async fn take_turn(&self, debate_id: &str, round: u32, agent_index: usize) -> DebateResult<()> {
        let session = self.session(debate_id)?;
        let agent_id = session.agent_ids[agent_index].clone();

        self.registry.set_speaking(debate_id, Some(&agent_id))?;
        self.publish(
            debate_id,
            EventKind::AgentThinking {
                round,
                agent_id: agent_id.clone(),
            },
        );

        let request = AgentTurnRequest {
            debate_id: debate_id.to_string(),
            agent_id: agent_id.clone(),
            topic: session.topic.clone(),
            document: session.document.clone(),
            round,
            max_rounds: session.max_rounds,
            transcript: session.transcript(),
        };
        let turn = self.agents.take_turn(&request).await.map_err(|e| {
            DebateError::upstream(
                UpstreamStage::AgentTurn {
                    agent_id: agent_id.clone(),
                    round,
                },
                e,
            )
        })?;

        let argument = turn.into_argument(&agent_id, round);
        for tool in &argument.tools_used {
            self.publish(
                debate_id,
                EventKind::AgentToolUse {
                    round,
                    agent_id: agent_id.clone(),
                    tool: tool.clone(),
                },
            );
        }
        self.registry
            .append_argument(debate_id, round, argument.clone())?;
        debug!(debate_id, round, agent_id = %agent_id, "Argument recorded");
        self.publish(debate_id, EventKind::AgentArgument { argument });
        Ok(())
    }

    async fn evaluate_round(&self, debate_id: &str, round: u32) -> DebateResult<Decision> {
        self.registry.set_speaking(debate_id, None)?;
        let session = self.session(debate_id)?;
        let context = ModeratorContext {
            debate_id: debate_id.to_string(),
            topic: session.topic.clone(),
            round,
            max_rounds: session.max_rounds,
            transcript: session.transcript(),
            tools: self.moderator.tool_names(),
        };

        let registry = &self.registry;
        let bus = &self.bus;
        let mut sink = |step: &ModeratorStep| -> Result<(), ArenaError> {
            registry.record_moderator_step(debate_id, round, step.clone())?;
            bus.publish(DebateEvent::new(
                debate_id,
                EventKind::ModeratorStep {
                    round,
                    step: step.clone(),
                },
            ));
            Ok(())
        };
        let verdict = self.moderator.evaluate(&context, &mut sink).await?;

        self.registry
            .close_round(debate_id, round, verdict.decision)?;
        info!(debate_id, round, decision = %verdict.decision, forced = verdict.forced, "Round complete");
        self.publish(
            debate_id,
            EventKind::RoundComplete {
                round,
                decision: verdict.decision,
                forced: verdict.forced,
            },
        );
        Ok(verdict.decision)
    }

    /// debating → concluding, waiting out a pause that lands after the last
    /// round closed. Returns `false` if the session went away meanwhile.
    async fn enter_concluding(&self, debate_id: &str) -> DebateResult<bool> {
        loop {
            if self.pause.checkpoint(debate_id).await? == Checkpoint::Discarded {
                return Ok(false);
            }
            match self.registry.begin_concluding(debate_id) {
                Ok(()) => return Ok(true),
                Err(ArenaError::InvalidTransition {
                    from: DebateStatus::Paused,
                    ..
                }) => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn conclude(&self, debate_id: &str) -> DebateResult<()> {
        let session = self.session(debate_id)?;
        let request = SummaryRequest {
            debate_id: debate_id.to_string(),
            topic: session.topic.clone(),
            rounds_completed: session.current_round,
            transcript: session.transcript(),
        };
        let summary = self.moderator.summarize(&request).await?;
        self.registry.complete(debate_id, summary.clone())?;
        self.publish(
            debate_id,
            EventKind::DebateComplete {
                summary,
                rounds: session.current_round,
            },
        );

        match self.registry.get(debate_id) {
            Some(finished) => self.hand_off(&finished).await,
            None => warn!(debate_id, "Session evicted before hand-off"),
        }
        Ok(())
    }

    /// Save history and agent insights. Failures are logged and swallowed.
    async fn hand_off(&self, session: &DebateSession) {
        if let Some(history) = &self.history {
            let saved = match FinishedDebateRecord::from_session(session) {
                Ok(record) => history.save(&record).await,
                Err(e) => Err(e),
            };
            if let Err(e) = saved {
                warn!(debate_id = %session.id, "Failed to save debate history: {}", e);
            }
        }
        if let Some(memory) = &self.memory {
            let recorded = record_debate_insights(memory.as_ref(), session).await;
            debug!(debate_id = %session.id, recorded, "Agent insights recorded");
        }
    }
}

//! The one entry point HTTP handlers and tests talk to.
//!
//! Owns the registry, the event bus, the pause controller and the round
//! orchestrator, and keeps track of the round task spawned for each debate.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::DebateConfig;
use crate::debate::{
    AgentMemoryStore, AgentTurnProvider, BranchManager, GuardrailConfig, HistoryStore,
    ModeratorEngine, ModeratorProvider, ModeratorToolbox, PauseController, RoundOrchestrator,
    RunOutcome, SharedPauseController, SharedRoundOrchestrator, TranscriptTools,
};
use crate::error::{ArenaError, ArenaResult};
use crate::events::{DebateEvent, EventBus, EventKind, SharedEventBus, Subscription};
use crate::session::{
    decode_share_code, AgentId, DebateId, DebateListing, DebateSpec, ReactionKind,
    ReactionOutcome, SessionRegistry, SessionSnapshot, SharedSessionRegistry, SourceDocument,
    ViewerId,
};

/// Request to open a new debate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDebate {
    pub topic: String,
    pub agent_ids: Vec<AgentId>,
    #[serde(default)]
    pub max_rounds: Option<u32>,
    #[serde(default)]
    pub document: Option<SourceDocument>,
}

/// Shared reference to DebateArena
pub type SharedDebateArena = Arc<DebateArena>;

pub struct DebateArena {
    config: DebateConfig,
    registry: SharedSessionRegistry,
    bus: SharedEventBus,
    pause: SharedPauseController,
    orchestrator: SharedRoundOrchestrator,
    branches: BranchManager,
    tasks: Mutex<HashMap<DebateId, JoinHandle<RunOutcome>>>,
}

/// Builder wiring providers and optional stores into a [`DebateArena`]
pub struct DebateArenaBuilder {
    config: DebateConfig,
    agents: Arc<dyn AgentTurnProvider>,
    moderator: Arc<dyn ModeratorProvider>,
    toolbox: Arc<dyn ModeratorToolbox>,
    history: Option<Arc<dyn HistoryStore>>,
    memory: Option<Arc<dyn AgentMemoryStore>>,
}

impl DebateArenaBuilder {
    pub fn config(mut self, config: DebateConfig) -> Self {
        self.config = config;
        self
    }

    pub fn toolbox(mut self, toolbox: Arc<dyn ModeratorToolbox>) -> Self {
        self.toolbox = toolbox;
        self
    }

    pub fn history(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn memory(mut self, memory: Arc<dyn AgentMemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn build(self) -> DebateArena {
        let registry = SessionRegistry::new().shared();
        let bus = EventBus::with_capacity(self.config.event_channel_capacity).shared();
        let pause = PauseController::new(registry.clone(), bus.clone()).shared();
        let engine = ModeratorEngine::new(
            self.moderator,
            self.toolbox,
            GuardrailConfig::from(&self.config),
        );
        let mut orchestrator = RoundOrchestrator::new(
            registry.clone(),
            bus.clone(),
            pause.clone(),
            self.agents,
            engine,
        );
        if let Some(history) = self.history {
            orchestrator = orchestrator.with_history(history);
        }
        if let Some(memory) = self.memory {
            orchestrator = orchestrator.with_memory(memory);
        }

        DebateArena {
            config: self.config,
            branches: BranchManager::new(registry.clone()),
            registry,
            bus,
            pause,
            orchestrator: orchestrator.shared(),
            tasks: Mutex::new(HashMap::new()),
        }
    }
}

impl DebateArena {
    pub fn builder(
        agents: Arc<dyn AgentTurnProvider>,
        moderator: Arc<dyn ModeratorProvider>,
    ) -> DebateArenaBuilder {
        DebateArenaBuilder {
            config: DebateConfig::default(),
            agents,
            moderator,
            toolbox: Arc::new(TranscriptTools),
            history: None,
            memory: None,
        }
    }

    /// Create a shared reference to this arena
    pub fn shared(self) -> SharedDebateArena {
        Arc::new(self)
    }

    pub fn config(&self) -> &DebateConfig {
        &self.config
    }

    pub fn registry(&self) -> &SharedSessionRegistry {
        &self.registry
    }

    pub fn bus(&self) -> &SharedEventBus {
        &self.bus
    }

    pub fn pause_controller(&self) -> &SharedPauseController {
        &self.pause
    }

    fn publish(&self, debate_id: &str, kind: EventKind) {
        self.bus.publish(DebateEvent::new(debate_id, kind));
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Register a debate without starting it. Rejected before any session
    /// exists if fewer than two agents are named.
    pub fn create_debate(&self, request: NewDebate) -> ArenaResult<SessionSnapshot> {
        let max_rounds = self.config.resolve_max_rounds(request.max_rounds);
        let mut spec = DebateSpec::new(request.topic.trim(), request.agent_ids, max_rounds);
        if let Some(document) = request.document {
            spec = spec.with_document(document);
        }
        self.registry.create(spec)
    }

    /// idle → loading, then spawn the round task which claims the session.
    pub fn start_debate(&self, debate_id: &str) -> ArenaResult<()> {
        self.registry.mark_loading(debate_id)?;
        let handle = self.orchestrator.spawn(debate_id);
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|_, task| !task.is_finished());
        tasks.insert(debate_id.to_string(), handle);
        info!(debate_id, "Round task spawned");
        Ok(())
    }

    /// Wait for a debate's round task to finish. `None` if none was started.
    pub async fn wait(&self, debate_id: &str) -> Option<RunOutcome> {
        let handle = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(debate_id)?;
        match handle.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!(debate_id, "Round task did not finish cleanly: {}", e);
                None
            }
        }
    }

    pub fn pause(&self, debate_id: &str) -> ArenaResult<()> {
        self.pause.request_pause(debate_id)
    }

    pub fn resume(&self, debate_id: &str) -> ArenaResult<()> {
        self.pause.request_resume(debate_id)
    }

    /// Discard the session and close its event channel. An in-flight call
    /// is not interrupted; the round task exits at its next registry write
    /// and can still be awaited with [`DebateArena::wait`].
    pub fn end_debate(&self, debate_id: &str) -> ArenaResult<()> {
        let session = self.registry.evict(debate_id)?;
        self.pause.release(debate_id);
        self.bus.close(debate_id);
        info!(debate_id, status = %session.status, "Debate ended");
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn snapshot(&self, debate_id: &str) -> ArenaResult<SessionSnapshot> {
        self.registry.snapshot(debate_id)
    }

    pub fn list(&self) -> ArenaResult<Vec<DebateListing>> {
        self.registry.list()
    }

    /// Live deltas for a debate. Fetch a snapshot first.
    pub fn subscribe(&self, debate_id: &str) -> ArenaResult<Subscription> {
        if !self.registry.contains(debate_id) {
            return Err(ArenaError::NotFound(debate_id.to_string()));
        }
        Ok(self.bus.subscribe(debate_id))
    }

    // =========================================================================
    // Collaboration
    // =========================================================================

    /// Add a viewer, generating an id when none is given.
    pub fn join(&self, debate_id: &str, viewer_id: Option<ViewerId>) -> ArenaResult<(ViewerId, usize)> {
        let viewer_id = viewer_id
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let viewer_count = self.registry.add_viewer(debate_id, &viewer_id)?;
        self.publish(
            debate_id,
            EventKind::ViewerJoined {
                viewer_id: viewer_id.clone(),
                viewer_count,
            },
        );
        Ok((viewer_id, viewer_count))
    }

    /// Remove a viewer. `viewer_left` is published only by the call that
    /// actually removed it.
    pub fn leave(&self, debate_id: &str, viewer_id: &str) -> ArenaResult<usize> {
        let (viewer_count, removed) = self.registry.remove_viewer(debate_id, viewer_id)?;
        if removed {
            self.publish(
                debate_id,
                EventKind::ViewerLeft {
                    viewer_id: viewer_id.to_string(),
                    viewer_count,
                },
            );
        }
        Ok(viewer_count)
    }

    pub fn react(
        &self,
        debate_id: &str,
        argument_id: &str,
        viewer_id: &str,
        kind: ReactionKind,
    ) -> ArenaResult<ReactionOutcome> {
        let outcome = self
            .registry
            .add_reaction(debate_id, argument_id, viewer_id, kind)?;
        self.publish(
            debate_id,
            EventKind::ReactionAdded {
                argument_id: argument_id.to_string(),
                viewer_id: viewer_id.to_string(),
                active: outcome.active,
                tally: outcome.tally.clone(),
            },
        );
        Ok(outcome)
    }

    /// Create a debate from a prefix of `parent_id`'s transcript, optionally
    /// starting it right away.
    pub fn branch(
        &self,
        parent_id: &str,
        round: u32,
        argument_index: usize,
        topic: Option<String>,
        autostart: bool,
    ) -> ArenaResult<SessionSnapshot> {
        let branch = self
            .branches
            .create_branch(parent_id, round, argument_index, topic)?;
        let snapshot = self.registry.create(branch.debate)?;
        if autostart {
            self.start_debate(&snapshot.id)?;
            return self.registry.snapshot(&snapshot.id);
        }
        Ok(snapshot)
    }

    pub fn share_code(&self, debate_id: &str) -> ArenaResult<String> {
        self.registry.share_code(debate_id)
    }

    /// Snapshot of the debate behind a share code.
    pub fn resolve_share_code(&self, code: &str) -> ArenaResult<SessionSnapshot> {
        let debate_id = decode_share_code(code)?;
        self.registry.snapshot(&debate_id)
    }
}

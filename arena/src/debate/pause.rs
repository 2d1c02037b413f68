//! Cooperative pause/resume for running debates.
//!
//! The registry status is the flag; a watch channel per debate wakes a round
//! loop parked at its checkpoint. Checkpoints sit between turns only, so a
//! pause takes effect after at most one in-flight agent or moderator call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::{ArenaError, ArenaResult};
use crate::events::{DebateEvent, EventKind, SharedEventBus};
use crate::session::{DebateId, DebateStatus, SharedSessionRegistry};

/// What the round loop should do after a checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    /// Take the next turn.
    Proceed,
    /// The session was discarded or finished; exit quietly.
    Discarded,
}

/// Shared reference to PauseController
pub type SharedPauseController = Arc<PauseController>;

pub struct PauseController {
    registry: SharedSessionRegistry,
    bus: SharedEventBus,
    gates: Mutex<HashMap<DebateId, watch::Sender<bool>>>,
}

impl PauseController {
    pub fn new(registry: SharedSessionRegistry, bus: SharedEventBus) -> Self {
        Self {
            registry,
            bus,
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Create a shared reference to this controller
    pub fn shared(self) -> SharedPauseController {
        Arc::new(self)
    }

    fn with_gate<T>(&self, debate_id: &str, f: impl FnOnce(&watch::Sender<bool>) -> T) -> T {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        let gate = gates
            .entry(debate_id.to_string())
            .or_insert_with(|| watch::channel(false).0);
        f(gate)
    }

    /// Subscribe to a debate's gate, creating it only while the session
    /// exists. A release racing with this call still wakes the receiver.
    fn subscribe_gate(&self, debate_id: &str) -> Option<watch::Receiver<bool>> {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(gate) = gates.get(debate_id) {
            return Some(gate.subscribe());
        }
        if !self.registry.contains(debate_id) {
            return None;
        }
        let gate = gates
            .entry(debate_id.to_string())
            .or_insert_with(|| watch::channel(false).0);
        Some(gate.subscribe())
    }

    /// debating → paused. Fails with `InvalidTransition` in any other status.
    pub fn request_pause(&self, debate_id: &str) -> ArenaResult<()> {
        self.registry.pause(debate_id)?;
        self.with_gate(debate_id, |gate| gate.send_replace(true));
        let round = self.current_round(debate_id);
        info!(debate_id, round, "Debate paused");
        self.bus
            .publish(DebateEvent::new(debate_id, EventKind::DebatePaused { round }));
        Ok(())
    }

    /// paused → debating. The round loop continues exactly where it stopped.
    pub fn request_resume(&self, debate_id: &str) -> ArenaResult<()> {
        self.registry.resume(debate_id)?;
        self.with_gate(debate_id, |gate| gate.send_replace(false));
        let round = self.current_round(debate_id);
        info!(debate_id, round, "Debate resumed");
        self.bus
            .publish(DebateEvent::new(debate_id, EventKind::DebateResumed { round }));
        Ok(())
    }

    fn current_round(&self, debate_id: &str) -> u32 {
        self.registry
            .get(debate_id)
            .map(|s| s.current_round)
            .unwrap_or(0)
    }

    /// Wait here while the debate is paused.
    ///
    /// Returns `Discarded` if the session disappears (or its gate is
    /// released) while waiting.
    pub async fn checkpoint(&self, debate_id: &str) -> ArenaResult<Checkpoint> {
        // Subscribe before reading the status so a resume in between is not missed.
        let Some(mut wake) = self.subscribe_gate(debate_id) else {
            return Ok(Checkpoint::Discarded);
        };
        loop {
            match self.registry.status(debate_id) {
                Ok(DebateStatus::Paused) => {
                    debug!(debate_id, "Round loop parked at checkpoint");
                }
                Ok(status) if status.is_terminal() => return Ok(Checkpoint::Discarded),
                Ok(_) => return Ok(Checkpoint::Proceed),
                Err(ArenaError::NotFound(_)) => return Ok(Checkpoint::Discarded),
                Err(e) => return Err(e),
            }
            if wake.changed().await.is_err() {
                return Ok(Checkpoint::Discarded);
            }
        }
    }

    /// Drop the gate for a debate, waking any parked loop.
    pub fn release(&self, debate_id: &str) {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        gates.remove(debate_id);
    }

    /// Number of debates with a live gate
    pub fn gate_count(&self) -> usize {
        self.gates.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_paused(&self, debate_id: &str) -> bool {
        matches!(self.registry.status(debate_id), Ok(DebateStatus::Paused))
    }
}

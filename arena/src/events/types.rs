//! Live debate events
//!
//! One event per state change, serialized as
//! `{"type": ..., "debate_id": ..., "timestamp": ..., "payload": {...}}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{
    AgentId, ArgumentId, BranchOrigin, DebateArgument, DebateId, DebateSummary, Decision,
    ModeratorStep, ReactionKind, ReactionTally, ViewerId,
};

/// A delta published for one debate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateEvent {
    pub debate_id: DebateId,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Event type tag and payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum EventKind {
    /// The round loop claimed the session
    DebateStarted {
        topic: String,
        agent_ids: Vec<AgentId>,
        max_rounds: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        branched_from: Option<BranchOrigin>,
    },

    /// A round opened
    RoundStarted { round: u32 },

    /// An agent became the speaking agent
    AgentThinking { round: u32, agent_id: AgentId },

    /// An agent reported using a tool for its argument
    AgentToolUse {
        round: u32,
        agent_id: AgentId,
        tool: String,
    },

    /// An argument was appended
    AgentArgument { argument: DebateArgument },

    /// The moderator produced a step
    ModeratorStep { round: u32, step: ModeratorStep },

    /// A round closed with a decision
    RoundComplete {
        round: u32,
        decision: Decision,
        forced: bool,
    },

    /// The final summary was produced
    DebateComplete { summary: DebateSummary, rounds: u32 },

    /// An agent or moderator call failed; the debate is over
    DebateError {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        round: Option<u32>,
    },

    DebatePaused { round: u32 },

    DebateResumed { round: u32 },

    ViewerJoined {
        viewer_id: ViewerId,
        viewer_count: usize,
    },

    ViewerLeft {
        viewer_id: ViewerId,
        viewer_count: usize,
    },

    /// A viewer reacted to an argument
    ReactionAdded {
        argument_id: ArgumentId,
        viewer_id: ViewerId,
        active: Option<ReactionKind>,
        tally: ReactionTally,
    },
}

impl DebateEvent {
    /// Stamp a new event for a debate
    pub fn new(debate_id: impl Into<DebateId>, kind: EventKind) -> Self {
        Self {
            debate_id: debate_id.into(),
            timestamp: Utc::now(),
            kind,
        }
    }

    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    /// Whether no further events follow this one for the debate
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            EventKind::DebateComplete { .. } | EventKind::DebateError { .. }
        )
    }

    /// Round this event belongs to, if any
    pub fn round(&self) -> Option<u32> {
        match &self.kind {
            EventKind::RoundStarted { round }
            | EventKind::AgentThinking { round, .. }
            | EventKind::AgentToolUse { round, .. }
            | EventKind::ModeratorStep { round, .. }
            | EventKind::RoundComplete { round, .. }
            | EventKind::DebatePaused { round }
            | EventKind::DebateResumed { round } => Some(*round),
            EventKind::AgentArgument { argument } => Some(argument.round),
            EventKind::DebateError { round, .. } => *round,
            _ => None,
        }
    }
}

impl EventKind {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::DebateStarted { .. } => "debate_started",
            Self::RoundStarted { .. } => "round_started",
            Self::AgentThinking { .. } => "agent_thinking",
            Self::AgentToolUse { .. } => "agent_tool_use",
            Self::AgentArgument { .. } => "agent_argument",
            Self::ModeratorStep { .. } => "moderator_step",
            Self::RoundComplete { .. } => "round_complete",
            Self::DebateComplete { .. } => "debate_complete",
            Self::DebateError { .. } => "debate_error",
            Self::DebatePaused { .. } => "debate_paused",
            Self::DebateResumed { .. } => "debate_resumed",
            Self::ViewerJoined { .. } => "viewer_joined",
            Self::ViewerLeft { .. } => "viewer_left",
            Self::ReactionAdded { .. } => "reaction_added",
        }
    }
}

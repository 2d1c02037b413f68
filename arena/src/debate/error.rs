//! Errors raised while driving a debate.

use thiserror::Error;

use super::provider::ProviderError;
use crate::error::ArenaError;
use crate::session::AgentId;

/// Which external call failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamStage {
    AgentTurn { agent_id: AgentId, round: u32 },
    ModeratorStep { round: u32 },
    Summary,
}

impl UpstreamStage {
    pub fn round(&self) -> Option<u32> {
        match self {
            Self::AgentTurn { round, .. } | Self::ModeratorStep { round } => Some(*round),
            Self::Summary => None,
        }
    }
}

impl std::fmt::Display for UpstreamStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AgentTurn { agent_id, round } => {
                write!(f, "agent '{}' turn in round {}", agent_id, round)
            }
            Self::ModeratorStep { round } => write!(f, "moderator evaluation of round {}", round),
            Self::Summary => write!(f, "final summary"),
        }
    }
}

/// Result type for the round loop
pub type DebateResult<T> = Result<T, DebateError>;

/// Errors that abort a debate's round loop
#[derive(Debug, Error)]
pub enum DebateError {
    /// An agent or moderator call failed. Fatal to the debate, never retried.
    #[error("{stage} failed: {source}")]
    UpstreamFailure {
        stage: UpstreamStage,
        #[source]
        source: ProviderError,
    },

    #[error(transparent)]
    Arena(#[from] ArenaError),
}

impl DebateError {
    pub fn upstream(stage: UpstreamStage, source: ProviderError) -> Self {
        Self::UpstreamFailure { stage, source }
    }

    /// Round the failure happened in, if known.
    pub fn round(&self) -> Option<u32> {
        match self {
            Self::UpstreamFailure { stage, .. } => stage.round(),
            Self::Arena(_) => None,
        }
    }

    /// Whether the session was discarded underneath the round loop.
    pub fn is_discarded(&self) -> bool {
        matches!(self, Self::Arena(e) if e.is_not_found())
    }
}

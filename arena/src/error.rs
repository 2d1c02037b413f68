//! Control-surface error taxonomy shared by the registry, the bus and the facade.

use thiserror::Error;

use crate::session::types::DebateStatus;

/// Result type for registry and control-surface operations
pub type ArenaResult<T> = Result<T, ArenaError>;

/// Errors raised by session bookkeeping and the control surface
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArenaError {
    #[error("Debate not found: {0}")]
    NotFound(String),

    #[error("Debate already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid transition {from} → {to}")]
    InvalidTransition { from: DebateStatus, to: DebateStatus },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Round {attempted} is out of order (last round {last}, open: {open})")]
    RoundOutOfOrder { attempted: u32, last: u32, open: bool },

    #[error("Invalid moderator step sequence in round {round}: {reason}")]
    InvalidStepSequence { round: u32, reason: String },

    #[error("Argument not found: {0}")]
    ArgumentNotFound(String),

    #[error("Invalid branch point round {round}, argument {argument_index}: {reason}")]
    InvalidBranchPoint {
        round: u32,
        argument_index: usize,
        reason: String,
    },

    #[error("Invalid share code: {0}")]
    InvalidShareCode(String),

    #[error("Lock poisoned")]
    LockPoisoned,
}

impl ArenaError {
    /// Status the session was in when a transition was refused.
    pub fn current_status(&self) -> Option<DebateStatus> {
        match self {
            Self::InvalidTransition { from, .. } => Some(*from),
            _ => None,
        }
    }

    /// Whether the session this error refers to no longer exists.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

//! Round ceiling and moderator iteration guardrails.

use serde::{Deserialize, Serialize};

use crate::config::DebateConfig;

/// Outcome when guardrails trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuardrailOutcome {
    /// No guardrail triggered.
    Continue,
    /// The round just closed is the last one allowed.
    RoundCeilingReached { round: u32, ceiling: u32 },
    /// The moderator used up its think/act/observe budget for this round.
    IterationBudgetExhausted { iterations: u32 },
}

impl GuardrailOutcome {
    /// Whether the guarded loop should stop.
    pub fn should_stop(&self) -> bool {
        !matches!(self, Self::Continue)
    }
}

impl std::fmt::Display for GuardrailOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Continue => write!(f, "continue"),
            Self::RoundCeilingReached { round, ceiling } => {
                write!(f, "round ceiling reached ({}/{})", round, ceiling)
            }
            Self::IterationBudgetExhausted { iterations } => {
                write!(f, "moderator iteration budget exhausted ({})", iterations)
            }
        }
    }
}

/// Guardrail limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailConfig {
    /// Moderator moves allowed per round before a verdict is forced.
    pub max_iterations: u32,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self { max_iterations: 6 }
    }
}

impl From<&DebateConfig> for GuardrailConfig {
    fn from(config: &DebateConfig) -> Self {
        Self {
            max_iterations: config.moderator_max_iterations.max(1),
        }
    }
}

/// Evaluates guardrails for the round loop and the moderator loop.
#[derive(Debug, Clone, Copy)]
pub struct GuardrailEngine {
    config: GuardrailConfig,
}

impl GuardrailEngine {
    pub fn new(config: GuardrailConfig) -> Self {
        Self { config }
    }

    pub fn max_iterations(&self) -> u32 {
        self.config.max_iterations
    }

    /// Check the ceiling after `round` closes. The ceiling is a hard cap.
    pub fn evaluate_round(&self, round: u32, ceiling: u32) -> GuardrailOutcome {
        if round >= ceiling {
            GuardrailOutcome::RoundCeilingReached { round, ceiling }
        } else {
            GuardrailOutcome::Continue
        }
    }

    /// Check the moderator budget before requesting another move.
    pub fn evaluate_iterations(&self, iterations: u32) -> GuardrailOutcome {
        if iterations >= self.config.max_iterations {
            GuardrailOutcome::IterationBudgetExhausted { iterations }
        } else {
            GuardrailOutcome::Continue
        }
    }
}

impl Default for GuardrailEngine {
    fn default() -> Self {
        Self::new(GuardrailConfig::default())
    }
}

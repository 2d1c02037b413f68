//! Seams to the language-model side: agent turns and moderator moves.
//!
//! Prompt construction and transport live behind these traits. The engine
//! only sees structured requests and structured answers.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::session::{
    AgentId, DebateArgument, DebateId, DebateSummary, Decision, ModeratorStep, SourceDocument,
};

/// Result type for provider calls
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Failure reported by an external collaborator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Tool '{tool}' failed: {reason}")]
    Tool { tool: String, reason: String },

    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}

/// Everything an agent needs to produce its next argument
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTurnRequest {
    pub debate_id: DebateId,
    pub agent_id: AgentId,
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<SourceDocument>,
    pub round: u32,
    pub max_rounds: u32,
    /// Prior rounds plus the current round's arguments so far.
    pub transcript: Vec<DebateArgument>,
}

/// Raw argument as reported by an agent, before normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTurn {
    #[serde(default)]
    pub agent_name: String,
    #[serde(default)]
    pub agent_color: String,
    pub content: String,
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub tools_used: Vec<String>,
}

const DEFAULT_AGENT_COLOR: &str = "#6b7280";

impl AgentTurn {
    /// Minimal turn with only content.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            agent_name: String::new(),
            agent_color: String::new(),
            content: content.into(),
            score: None,
            confidence: None,
            tools_used: Vec::new(),
        }
    }

    /// Normalize into an argument for `agent_id` in `round`: confidence is
    /// clamped to 0–1, scores outside 1–5 are dropped, blank tool names are
    /// removed and a fresh id is assigned.
    pub fn into_argument(self, agent_id: &str, round: u32) -> DebateArgument {
        let score = match self.score {
            Some(s) if (1..=5).contains(&s) => Some(s as u8),
            Some(s) => {
                warn!(agent_id, round, score = s, "Dropping out-of-range argument score");
                None
            }
            None => None,
        };
        let confidence = self
            .confidence
            .filter(|c| c.is_finite())
            .map(|c| c.clamp(0.0, 1.0) as f32);
        let tools_used = self
            .tools_used
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        let agent_name = if self.agent_name.trim().is_empty() {
            agent_id.to_string()
        } else {
            self.agent_name
        };
        let agent_color = if self.agent_color.trim().is_empty() {
            DEFAULT_AGENT_COLOR.to_string()
        } else {
            self.agent_color
        };

        DebateArgument {
            id: uuid::Uuid::new_v4().to_string(),
            agent_id: agent_id.to_string(),
            agent_name,
            agent_color,
            round,
            content: self.content,
            score,
            confidence,
            tools_used,
            created_at: Utc::now(),
        }
    }
}

/// Produces one argument per call
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AgentTurnProvider: Send + Sync {
    async fn take_turn(&self, request: &AgentTurnRequest) -> ProviderResult<AgentTurn>;
}

/// Transcript state handed to the moderator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeratorContext {
    pub debate_id: DebateId,
    pub topic: String,
    pub round: u32,
    pub max_rounds: u32,
    /// Full transcript through the current round.
    pub transcript: Vec<DebateArgument>,
    /// Tool names the moderator may call.
    #[serde(default)]
    pub tools: Vec<String>,
}

impl ModeratorContext {
    pub fn is_final_round(&self) -> bool {
        self.round >= self.max_rounds
    }
}

/// The moderator's next move in its evaluation loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModeratorMove {
    Think {
        content: String,
    },
    UseTool {
        tool: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    Decide {
        decision: Decision,
        #[serde(default)]
        reasoning: String,
    },
}

/// Input to the final summary call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryRequest {
    pub debate_id: DebateId,
    pub topic: String,
    pub rounds_completed: u32,
    pub transcript: Vec<DebateArgument>,
}

/// Moderator model: one move per call, plus the closing summary
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModeratorProvider: Send + Sync {
    /// Next move given the steps already taken this round.
    async fn next_move(
        &self,
        context: &ModeratorContext,
        steps: &[ModeratorStep],
    ) -> ProviderResult<ModeratorMove>;

    async fn summarize(&self, request: &SummaryRequest) -> ProviderResult<DebateSummary>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization_clamps_and_drops() {
        let turn = AgentTurn {
            agent_name: "Skeptic".to_string(),
            agent_color: String::new(),
            content: "No.".to_string(),
            score: Some(9),
            confidence: Some(1.7),
            tools_used: vec!["search".to_string(), "  ".to_string()],
        };
        let arg = turn.into_argument("skeptic", 2);
        assert_eq!(arg.score, None);
        assert_eq!(arg.confidence, Some(1.0));
        assert_eq!(arg.tools_used, vec!["search".to_string()]);
        assert_eq!(arg.round, 2);
        assert_eq!(arg.agent_color, DEFAULT_AGENT_COLOR);
        assert!(!arg.id.is_empty());
    }

    #[test]
    fn test_normalization_keeps_valid_values_and_fills_name() {
        let mut turn = AgentTurn::text("Yes.");
        turn.score = Some(4);
        turn.confidence = Some(f64::NAN);
        let arg = turn.into_argument("optimist", 1);
        assert_eq!(arg.score, Some(4));
        assert_eq!(arg.confidence, None);
        assert_eq!(arg.agent_name, "optimist");
    }

    #[test]
    fn test_fresh_ids_per_argument() {
        let a = AgentTurn::text("x").into_argument("a", 1);
        let b = AgentTurn::text("x").into_argument("a", 1);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_moderator_move_wire_format() {
        let mv: ModeratorMove =
            serde_json::from_str(r#"{"type":"use_tool","tool":"score_breakdown"}"#).unwrap();
        assert_eq!(
            mv,
            ModeratorMove::UseTool {
                tool: "score_breakdown".to_string(),
                input: serde_json::Value::Null,
            }
        );
        let mv: ModeratorMove =
            serde_json::from_str(r#"{"type":"decide","decision":"conclude"}"#).unwrap();
        assert!(matches!(
            mv,
            ModeratorMove::Decide {
                decision: Decision::Conclude,
                ..
            }
        ));
    }
}

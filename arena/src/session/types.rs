//! Debate session model: statuses, transitions, rounds and the moderator step log.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::collab::{ReactionBook, ReactionTally, ViewerSet};
use crate::config::MAX_ROUND_CEILING;
use crate::error::{ArenaError, ArenaResult};

/// Unique identifier for a debate
pub type DebateId = String;
/// Identifier of a participating agent persona
pub type AgentId = String;
/// Identifier of a single argument
pub type ArgumentId = String;
/// Opaque viewer identifier
pub type ViewerId = String;

/// Lifecycle status of a debate session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebateStatus {
    /// Created, not started.
    Idle,
    /// Start requested; the round task has not claimed the session yet.
    Loading,
    /// Rounds are running.
    Debating,
    /// Progression halted at the next turn boundary.
    Paused,
    /// Round loop stopped, waiting for the final summary.
    Concluding,
    /// Summary produced.
    Complete,
    /// An agent or moderator call failed.
    Error,
}

impl DebateStatus {
    /// Whether this is a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }

    /// Whether arguments and moderator steps may still be written.
    ///
    /// A turn that was in flight when a pause arrived is allowed to land.
    pub fn accepts_content(self) -> bool {
        matches!(self, Self::Debating | Self::Paused)
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(self) -> &'static [DebateStatus] {
        match self {
            Self::Idle => &[Self::Loading, Self::Debating, Self::Error],
            Self::Loading => &[Self::Debating, Self::Error],
            Self::Debating => &[Self::Paused, Self::Concluding, Self::Error],
            Self::Paused => &[Self::Debating, Self::Error],
            Self::Concluding => &[Self::Complete, Self::Error],
            Self::Complete | Self::Error => &[],
        }
    }
}

impl std::fmt::Display for DebateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Loading => write!(f, "loading"),
            Self::Debating => write!(f, "debating"),
            Self::Paused => write!(f, "paused"),
            Self::Concluding => write!(f, "concluding"),
            Self::Complete => write!(f, "complete"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Moderator verdict for a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Continue,
    Conclude,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Continue => write!(f, "continue"),
            Self::Conclude => write!(f, "conclude"),
        }
    }
}

/// One agent's contribution to a round. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateArgument {
    pub id: ArgumentId,
    pub agent_id: AgentId,
    pub agent_name: String,
    pub agent_color: String,
    pub round: u32,
    pub content: String,
    /// Self-assessed strength, 1–5.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
    /// Self-assessed confidence, 0–1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools_used: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// A single transition of the moderator's think/act/observe loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModeratorStep {
    Thinking {
        content: String,
    },
    Acting {
        tool: String,
        input: serde_json::Value,
    },
    Observing {
        tool: String,
        result: String,
    },
    Decision {
        decision: Decision,
        reasoning: String,
        /// Set when the engine, not the moderator, determined the verdict.
        #[serde(default)]
        forced: bool,
    },
}

impl ModeratorStep {
    /// Step kind as used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Thinking { .. } => "thinking",
            Self::Acting { .. } => "acting",
            Self::Observing { .. } => "observing",
            Self::Decision { .. } => "decision",
        }
    }

    /// Verdict carried by a decision step.
    pub fn decision(&self) -> Option<Decision> {
        match self {
            Self::Decision { decision, .. } => Some(*decision),
            _ => None,
        }
    }

    /// Check that this step may directly follow `previous` within one round.
    pub fn may_follow(&self, previous: Option<&ModeratorStep>) -> Result<(), String> {
        match (previous, self) {
            (Some(Self::Decision { .. }), _) => {
                Err(format!("{} after the round's decision", self.kind()))
            }
            (Some(Self::Acting { tool, .. }), Self::Observing { tool: observed, .. }) => {
                if tool == observed {
                    Ok(())
                } else {
                    Err(format!("observing '{}' after acting '{}'", observed, tool))
                }
            }
            (Some(Self::Acting { tool, .. }), _) => Err(format!(
                "{} before the observation of '{}'",
                self.kind(),
                tool
            )),
            (_, Self::Observing { tool, .. }) => {
                Err(format!("observing '{}' without a preceding acting step", tool))
            }
            _ => Ok(()),
        }
    }
}

/// Validate a complete round's step log: every transition legal, exactly one
/// terminating decision.
pub fn validate_step_sequence(steps: &[ModeratorStep]) -> Result<Decision, String> {
    let mut previous = None;
    for step in steps {
        step.may_follow(previous)?;
        previous = Some(step);
    }
    previous
        .and_then(ModeratorStep::decision)
        .ok_or_else(|| "sequence does not end in a decision".to_string())
}

/// One round: every agent speaks once, then the moderator evaluates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateRound {
    /// Round number (1-indexed).
    pub round: u32,
    pub arguments: Vec<DebateArgument>,
    pub moderator_steps: Vec<ModeratorStep>,
    /// Absent while the round is open.
    pub decision: Option<Decision>,
    pub started_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl DebateRound {
    pub fn new(round: u32) -> Self {
        Self {
            round,
            arguments: Vec::new(),
            moderator_steps: Vec::new(),
            decision: None,
            started_at: Utc::now(),
            closed_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.decision.is_none()
    }

    /// Whether the closing decision was forced by the engine.
    pub fn was_forced(&self) -> bool {
        self.moderator_steps
            .iter()
            .rev()
            .any(|s| matches!(s, ModeratorStep::Decision { forced: true, .. }))
    }
}

/// Final consensus summary, produced exactly once at conclusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateSummary {
    /// Consensus percentage, 0–100. Out-of-range or fractional values are
    /// clamped and rounded on the way in.
    #[serde(deserialize_with = "deserialize_consensus")]
    pub consensus: u8,
    #[serde(default)]
    pub agreements: Vec<String>,
    #[serde(default)]
    pub disagreements: Vec<String>,
    pub recommendation: String,
    #[serde(default)]
    pub reasoning: String,
}

fn deserialize_consensus<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    if !raw.is_finite() {
        return Ok(0);
    }
    Ok(raw.round().clamp(0.0, 100.0) as u8)
}

impl DebateSummary {
    /// Clamp provider-reported values into range.
    pub fn normalized(mut self) -> Self {
        self.consensus = self.consensus.min(100);
        self
    }
}

/// Optional source material the debate is grounded in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    #[serde(default)]
    pub name: Option<String>,
    pub content: String,
}

/// Where a branched debate was cut from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchOrigin {
    pub parent_id: DebateId,
    pub round: u32,
    pub argument_index: usize,
}

/// Everything needed to create a session.
#[derive(Debug, Clone)]
pub struct DebateSpec {
    pub id: DebateId,
    pub topic: String,
    pub document: Option<SourceDocument>,
    pub agent_ids: Vec<AgentId>,
    pub max_rounds: u32,
    /// Pre-seeded transcript prefix (branches only).
    pub seed_rounds: Vec<DebateRound>,
    pub branched_from: Option<BranchOrigin>,
}

impl DebateSpec {
    /// New spec with a generated id.
    pub fn new(topic: impl Into<String>, agent_ids: Vec<AgentId>, max_rounds: u32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            topic: topic.into(),
            document: None,
            agent_ids,
            max_rounds,
            seed_rounds: Vec::new(),
            branched_from: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_document(mut self, document: SourceDocument) -> Self {
        self.document = Some(document);
        self
    }

    /// Reject specs that cannot be debated. Runs before any session exists.
    pub fn validate(&self) -> ArenaResult<()> {
        if self.id.trim().is_empty() {
            return Err(ArenaError::Validation("debate id is empty".to_string()));
        }
        if self.topic.trim().is_empty() {
            return Err(ArenaError::Validation("topic is empty".to_string()));
        }
        if self.agent_ids.len() < 2 {
            return Err(ArenaError::Validation(format!(
                "at least 2 agents are required, got {}",
                self.agent_ids.len()
            )));
        }
        let mut seen = HashSet::new();
        for agent in &self.agent_ids {
            if agent.trim().is_empty() || !seen.insert(agent.as_str()) {
                return Err(ArenaError::Validation(format!(
                    "agent ids must be unique and non-empty ('{}')",
                    agent
                )));
            }
        }
        if self.max_rounds == 0 || self.max_rounds > MAX_ROUND_CEILING {
            return Err(ArenaError::Validation(format!(
                "max_rounds must be within 1..={}, got {}",
                MAX_ROUND_CEILING, self.max_rounds
            )));
        }
        self.validate_seed()
    }

    fn validate_seed(&self) -> ArenaResult<()> {
        let last = self.seed_rounds.len();
        if last as u32 > self.max_rounds {
            return Err(ArenaError::Validation(format!(
                "seeded transcript has {} rounds, ceiling is {}",
                last, self.max_rounds
            )));
        }
        for (i, round) in self.seed_rounds.iter().enumerate() {
            if round.round != i as u32 + 1 {
                return Err(ArenaError::Validation(format!(
                    "seeded round {} found at position {}",
                    round.round,
                    i + 1
                )));
            }
            if round.is_open() && i + 1 != last {
                return Err(ArenaError::Validation(format!(
                    "seeded round {} is open but not last",
                    round.round
                )));
            }
            if round.arguments.len() > self.agent_ids.len() {
                return Err(ArenaError::Validation(format!(
                    "seeded round {} has more arguments than agents",
                    round.round
                )));
            }
        }
        Ok(())
    }
}

/// The authoritative in-memory record of one debate.
#[derive(Debug, Clone)]
pub struct DebateSession {
    pub id: DebateId,
    pub status: DebateStatus,
    pub topic: String,
    pub document: Option<SourceDocument>,
    /// Speaking order.
    pub agent_ids: Vec<AgentId>,
    pub current_round: u32,
    pub max_rounds: u32,
    pub speaking_agent: Option<AgentId>,
    pub rounds: Vec<DebateRound>,
    pub summary: Option<DebateSummary>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub viewers: ViewerSet,
    pub reactions: ReactionBook,
    pub share_code: Option<String>,
    pub branched_from: Option<BranchOrigin>,
}

impl DebateSession {
    /// Build a fresh idle session from a validated spec.
    pub fn from_spec(spec: DebateSpec) -> Self {
        let current_round = spec.seed_rounds.last().map(|r| r.round).unwrap_or(0);
        Self {
            id: spec.id,
            status: DebateStatus::Idle,
            topic: spec.topic,
            document: spec.document,
            agent_ids: spec.agent_ids,
            current_round,
            max_rounds: spec.max_rounds,
            speaking_agent: None,
            rounds: spec.seed_rounds,
            summary: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
            viewers: ViewerSet::default(),
            reactions: ReactionBook::default(),
            share_code: None,
            branched_from: spec.branched_from,
        }
    }

    /// Move to a new status, refusing transitions the lifecycle does not allow.
    pub fn transition(&mut self, to: DebateStatus) -> ArenaResult<()> {
        if !self.status.valid_transitions().contains(&to) {
            return Err(ArenaError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        if to.is_terminal() {
            self.completed_at = Some(Utc::now());
            self.speaking_agent = None;
        }
        Ok(())
    }

    /// Transition that also accepts any of `from` as the source status.
    pub(crate) fn transition_from(
        &mut self,
        from: &[DebateStatus],
        to: DebateStatus,
    ) -> ArenaResult<()> {
        if !from.contains(&self.status) {
            return Err(ArenaError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.transition(to)
    }

    pub fn last_round(&self) -> Option<&DebateRound> {
        self.rounds.last()
    }

    /// Every argument so far, in speaking order.
    pub fn transcript(&self) -> Vec<DebateArgument> {
        self.rounds
            .iter()
            .flat_map(|r| r.arguments.iter().cloned())
            .collect()
    }

    pub fn argument_count(&self) -> usize {
        self.rounds.iter().map(|r| r.arguments.len()).sum()
    }

    pub fn find_argument(&self, argument_id: &str) -> Option<&DebateArgument> {
        self.rounds
            .iter()
            .flat_map(|r| r.arguments.iter())
            .find(|a| a.id == argument_id)
    }

    /// Round and agent index where the round loop picks up.
    pub fn resume_point(&self) -> (u32, usize) {
        match self.rounds.last() {
            None => (1, 0),
            Some(r) if r.is_open() => (r.round, r.arguments.len()),
            Some(r) => (r.round + 1, 0),
        }
    }

    /// Point-in-time view with the document redacted to a presence flag.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id.clone(),
            status: self.status,
            topic: self.topic.clone(),
            has_document: self.document.is_some(),
            document_name: self.document.as_ref().and_then(|d| d.name.clone()),
            agent_ids: self.agent_ids.clone(),
            current_round: self.current_round,
            max_rounds: self.max_rounds,
            speaking_agent: self.speaking_agent.clone(),
            rounds: self.rounds.clone(),
            summary: self.summary.clone(),
            error: self.error.clone(),
            created_at: self.created_at,
            completed_at: self.completed_at,
            viewer_count: self.viewers.count(),
            reactions: self.reactions.all(),
            share_code: self.share_code.clone(),
            branched_from: self.branched_from.clone(),
        }
    }

    /// Lightweight listing entry.
    pub fn listing(&self) -> DebateListing {
        DebateListing {
            id: self.id.clone(),
            status: self.status,
            topic: self.topic.clone(),
            current_round: self.current_round,
            max_rounds: self.max_rounds,
            viewer_count: self.viewers.count(),
            created_at: self.created_at,
        }
    }

    /// Compact status line.
    pub fn status_line(&self) -> String {
        format!(
            "[{}] round {}/{} | {} arguments | {} viewers | debate={}",
            self.status,
            self.current_round,
            self.max_rounds,
            self.argument_count(),
            self.viewers.count(),
            self.id
        )
    }
}

/// Snapshot read returned to clients before they subscribe for deltas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: DebateId,
    pub status: DebateStatus,
    pub topic: String,
    pub has_document: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_name: Option<String>,
    pub agent_ids: Vec<AgentId>,
    pub current_round: u32,
    pub max_rounds: u32,
    pub speaking_agent: Option<AgentId>,
    pub rounds: Vec<DebateRound>,
    pub summary: Option<DebateSummary>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub viewer_count: usize,
    pub reactions: HashMap<ArgumentId, ReactionTally>,
    pub share_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branched_from: Option<BranchOrigin>,
}

impl SessionSnapshot {
    pub fn transcript_len(&self) -> usize {
        self.rounds.iter().map(|r| r.arguments.len()).sum()
    }
}

/// Listing entry for the session index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateListing {
    pub id: DebateId,
    pub status: DebateStatus,
    pub topic: String,
    pub current_round: u32,
    pub max_rounds: u32,
    pub viewer_count: usize,
    pub created_at: DateTime<Utc>,
}

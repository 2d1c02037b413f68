//! Debate Orchestration — Multi-Agent Rounds with a ReAct Moderator
//!
//! Each round every agent speaks once, in order; then the moderator runs a
//! bounded think/act/observe loop and decides whether to continue. The round
//! ceiling is a hard cap. After the loop stops the moderator writes a single
//! consensus summary and the debate is handed off to history and memory.
//!
//! # Debate Flow
//!
//! ```text
//! Idle → Loading → Debating ──▶ round r: agent 1 … agent n → moderator
//!                    │  ▲                                        │
//!                    ▼  │                 continue, r < ceiling ─┤
//!                  Paused                                        │
//!                                          conclude / ceiling ───┴─▶ Concluding → Complete
//!
//! agent or moderator failure at any point ─▶ Error
//! ```

pub mod branch;
pub mod error;
pub mod guardrails;
pub mod memory_bridge;
pub mod moderator;
pub mod orchestrator;
pub mod pause;
pub mod persistence;
pub mod provider;
pub mod tools;

pub use branch::{BranchManager, BranchSpec};
pub use error::{DebateError, DebateResult, UpstreamStage};
pub use guardrails::{GuardrailConfig, GuardrailEngine, GuardrailOutcome};
pub use memory_bridge::{
    record_debate_insights, AgentInsight, AgentMemoryStore, InMemoryAgentMemory, InsightContext,
};
pub use moderator::{ModeratorEngine, ModeratorVerdict, StepSink};
pub use orchestrator::{RoundOrchestrator, RoundPhase, RunOutcome, SharedRoundOrchestrator};
pub use pause::{Checkpoint, PauseController, SharedPauseController};
pub use persistence::{
    FinishedDebateRecord, HistoryStore, InMemoryHistoryStore, JsonFileHistoryStore,
    PersistenceError,
};
pub use provider::{
    AgentTurn, AgentTurnProvider, AgentTurnRequest, ModeratorContext, ModeratorMove,
    ModeratorProvider, ProviderError, ProviderResult, SummaryRequest,
};
pub use tools::{ModeratorToolbox, TranscriptTools};

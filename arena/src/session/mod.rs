//! Debate sessions and their registry.
//!
//! A session is the authoritative record of one debate: status, transcript,
//! moderator step log, summary and collaboration counters. The registry owns
//! every session and enforces the lifecycle:
//!
//! ```text
//! Idle ─▶ Loading ─▶ Debating ◀─▶ Paused
//!   │                   │
//!   │                   ▼
//!   │               Concluding ─▶ Complete
//!   │
//!   └─── any non-terminal ─▶ Error
//! ```

pub mod collab;
pub mod registry;
pub mod types;

pub use collab::{
    decode_share_code, encode_share_code, ReactionBook, ReactionKind, ReactionOutcome,
    ReactionTally, Viewer, ViewerSet,
};
pub use registry::{SessionRegistry, SharedSessionRegistry};
pub use types::{
    validate_step_sequence, AgentId, ArgumentId, BranchOrigin, DebateArgument, DebateId,
    DebateListing, DebateRound, DebateSession, DebateSpec, DebateStatus, DebateSummary, Decision,
    ModeratorStep, SessionSnapshot, SourceDocument, ViewerId,
};

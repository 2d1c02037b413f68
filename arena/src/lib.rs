//! Debate Arena — multi-agent debate orchestration and live events
//!
//! Several agents argue a topic round by round while a moderator decides
//! after each round whether to continue. Any number of viewers can watch a
//! debate live, react to arguments and branch new debates from any point of
//! the transcript.
//!
//! # Components
//!
//! - [`session`]: authoritative per-debate records and their lifecycle
//! - [`events`]: per-debate broadcast of live deltas
//! - [`debate`]: round loop, moderator engine, pause/resume, branching and
//!   the hand-off to history and agent memory
//! - [`service`]: the [`DebateArena`] control surface tying them together
//!
//! # Usage
//!
//! ```ignore
//! use arena::{DebateArena, NewDebate};
//!
//! let arena = DebateArena::builder(agents, moderator).build();
//! let snapshot = arena.create_debate(NewDebate {
//!     topic: "Should we adopt a monorepo?".to_string(),
//!     agent_ids: vec!["pragmatist".into(), "skeptic".into()],
//!     max_rounds: Some(3),
//!     document: None,
//! })?;
//! let mut events = arena.subscribe(&snapshot.id)?;
//! arena.start_debate(&snapshot.id)?;
//! while let Some(event) = events.recv().await {
//!     println!("{}", event.event_type());
//! }
//! ```

pub mod config;
pub mod debate;
pub mod error;
pub mod events;
pub mod service;
pub mod session;

pub use config::{DebateConfig, MAX_ROUND_CEILING};
pub use error::{ArenaError, ArenaResult};
pub use events::{DebateEvent, EventBus, EventKind, SharedEventBus, Subscription};
pub use service::{DebateArena, DebateArenaBuilder, NewDebate, SharedDebateArena};
pub use session::{
    DebateArgument, DebateId, DebateRound, DebateSession, DebateSpec, DebateStatus,
    DebateSummary, Decision, ModeratorStep, ReactionKind, SessionRegistry, SessionSnapshot,
    SourceDocument,
};

//! Live event streaming for debate viewers
//!
//! The bus carries deltas only. A client first fetches a snapshot from the
//! session registry, then subscribes for the events that follow it:
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Round task   │────▶│  Event Bus   │────▶│  Viewers     │
//! │ (publish)    │     │ (per debate) │     │  (recv)      │
//! └──────────────┘     └──────────────┘     └──────────────┘
//! ```
//!
//! Within one debate events arrive in publish order: `round_started`, each
//! `agent_argument` in speaking order, each `moderator_step`,
//! `round_complete`, repeated, then `debate_complete`.

pub mod bus;
pub mod types;

pub use bus::{EventBus, SharedEventBus, Subscription, CHANNEL_CAPACITY};
pub use types::{DebateEvent, EventKind};

//! Viewer presence, per-argument reactions and share codes.

use std::collections::{BTreeMap, HashMap};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{ArgumentId, DebateId, ViewerId};
use crate::error::{ArenaError, ArenaResult};

/// A connected viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewer {
    pub id: ViewerId,
    pub joined_at: DateTime<Utc>,
}

/// Set of viewers currently watching a debate.
#[derive(Debug, Clone, Default)]
pub struct ViewerSet {
    viewers: HashMap<ViewerId, Viewer>,
}

impl ViewerSet {
    /// Add a viewer; rejoining keeps the original join time. Returns the count.
    pub fn join(&mut self, viewer_id: &str) -> usize {
        self.viewers
            .entry(viewer_id.to_string())
            .or_insert_with(|| Viewer {
                id: viewer_id.to_string(),
                joined_at: Utc::now(),
            });
        self.viewers.len()
    }

    /// Remove a viewer; unknown ids are a no-op. Returns whether the viewer
    /// was present.
    pub fn leave(&mut self, viewer_id: &str) -> bool {
        self.viewers.remove(viewer_id).is_some()
    }

    pub fn count(&self) -> usize {
        self.viewers.len()
    }

    pub fn contains(&self, viewer_id: &str) -> bool {
        self.viewers.contains_key(viewer_id)
    }
}

/// Reaction a viewer can leave on an argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionKind {
    Like,
    Insightful,
    Agree,
    Disagree,
}

impl std::fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Like => write!(f, "like"),
            Self::Insightful => write!(f, "insightful"),
            Self::Agree => write!(f, "agree"),
            Self::Disagree => write!(f, "disagree"),
        }
    }
}

/// Reaction counts for one argument.
pub type ReactionTally = BTreeMap<ReactionKind, u32>;

/// Result of a reaction request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionOutcome {
    /// The viewer's reaction after the request (`None` when toggled off).
    pub active: Option<ReactionKind>,
    pub tally: ReactionTally,
}

/// Reaction table: counts per argument, plus the one counted reaction each
/// viewer holds per argument.
#[derive(Debug, Clone, Default)]
pub struct ReactionBook {
    tallies: HashMap<ArgumentId, ReactionTally>,
    by_viewer: HashMap<(ViewerId, ArgumentId), ReactionKind>,
}

impl ReactionBook {
    /// Apply a reaction. Repeating the held kind toggles it off; a different
    /// kind replaces the held one. A viewer never counts twice per argument.
    pub fn react(
        &mut self,
        argument_id: &str,
        viewer_id: &str,
        kind: ReactionKind,
    ) -> ReactionOutcome {
        let key = (viewer_id.to_string(), argument_id.to_string());
        let previous = self.by_viewer.remove(&key);

        if let Some(previous) = previous {
            self.decrement(argument_id, previous);
        }

        let active = if previous == Some(kind) {
            None
        } else {
            *self
                .tallies
                .entry(argument_id.to_string())
                .or_default()
                .entry(kind)
                .or_insert(0) += 1;
            self.by_viewer.insert(key, kind);
            Some(kind)
        };

        ReactionOutcome {
            active,
            tally: self.tally(argument_id),
        }
    }

    fn decrement(&mut self, argument_id: &str, kind: ReactionKind) {
        if let Some(tally) = self.tallies.get_mut(argument_id) {
            if let Some(count) = tally.get_mut(&kind) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    tally.remove(&kind);
                }
            }
            if tally.is_empty() {
                self.tallies.remove(argument_id);
            }
        }
    }

    pub fn tally(&self, argument_id: &str) -> ReactionTally {
        self.tallies.get(argument_id).cloned().unwrap_or_default()
    }

    pub fn all(&self) -> HashMap<ArgumentId, ReactionTally> {
        self.tallies.clone()
    }

    /// Reaction a viewer currently holds on an argument.
    pub fn held_by(&self, viewer_id: &str, argument_id: &str) -> Option<ReactionKind> {
        self.by_viewer
            .get(&(viewer_id.to_string(), argument_id.to_string()))
            .copied()
    }
}

/// Encode a debate id as a URL-safe share code.
pub fn encode_share_code(debate_id: &str) -> String {
    URL_SAFE_NO_PAD.encode(debate_id.as_bytes())
}

/// Recover the debate id behind a share code.
pub fn decode_share_code(code: &str) -> ArenaResult<DebateId> {
    let bytes = URL_SAFE_NO_PAD
        .decode(code.trim())
        .map_err(|e| ArenaError::InvalidShareCode(format!("{}: {}", code, e)))?;
    let id = String::from_utf8(bytes)
        .map_err(|_| ArenaError::InvalidShareCode(format!("{}: not utf-8", code)))?;
    if id.is_empty() {
        return Err(ArenaError::InvalidShareCode("empty code".to_string()));
    }
    Ok(id)
}

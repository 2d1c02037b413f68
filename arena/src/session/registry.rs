//! Authoritative map of debate id to session.
//!
//! Each session sits behind its own lock so the owning round task can write
//! while snapshot reads and collaboration calls proceed for other debates.
//! No lock is ever held across an `.await`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use tracing::{debug, info};

use super::collab::{encode_share_code, ReactionKind, ReactionOutcome};
use super::types::{
    DebateArgument, DebateId, DebateListing, DebateRound, DebateSession, DebateSpec,
    DebateStatus, DebateSummary, Decision, ModeratorStep, SessionSnapshot,
};
use crate::error::{ArenaError, ArenaResult};

type SessionCell = Arc<RwLock<DebateSession>>;

/// Shared reference to SessionRegistry
pub type SharedSessionRegistry = Arc<SessionRegistry>;

/// In-memory registry of live debate sessions
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<DebateId, SessionCell>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a shared reference to this registry
    pub fn shared(self) -> SharedSessionRegistry {
        Arc::new(self)
    }

    fn cell(&self, id: &str) -> ArenaResult<SessionCell> {
        let sessions = self.sessions.read().map_err(|_| ArenaError::LockPoisoned)?;
        sessions
            .get(id)
            .cloned()
            .ok_or_else(|| ArenaError::NotFound(id.to_string()))
    }

    fn read<T>(&self, id: &str, f: impl FnOnce(&DebateSession) -> T) -> ArenaResult<T> {
        let cell = self.cell(id)?;
        let session = cell.read().map_err(|_| ArenaError::LockPoisoned)?;
        Ok(f(&session))
    }

    fn write<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut DebateSession) -> ArenaResult<T>,
    ) -> ArenaResult<T> {
        let cell = self.cell(id)?;
        let mut session = cell.write().map_err(|_| ArenaError::LockPoisoned)?;
        f(&mut session)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Register a new session. Fails if the id is taken or the spec is invalid.
    pub fn create(&self, spec: DebateSpec) -> ArenaResult<SessionSnapshot> {
        spec.validate()?;
        let mut sessions = self.sessions.write().map_err(|_| ArenaError::LockPoisoned)?;
        if sessions.contains_key(&spec.id) {
            return Err(ArenaError::AlreadyExists(spec.id));
        }
        let session = DebateSession::from_spec(spec);
        let snapshot = session.snapshot();
        info!(debate_id = %session.id, agents = session.agent_ids.len(), max_rounds = session.max_rounds, "Debate session created");
        sessions.insert(session.id.clone(), Arc::new(RwLock::new(session)));
        Ok(snapshot)
    }

    /// Clone of the full session, if present.
    pub fn get(&self, id: &str) -> Option<DebateSession> {
        self.read(id, DebateSession::clone).ok()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions
            .read()
            .map(|s| s.contains_key(id))
            .unwrap_or(false)
    }

    /// Point-in-time snapshot with the document redacted.
    pub fn snapshot(&self, id: &str) -> ArenaResult<SessionSnapshot> {
        self.read(id, DebateSession::snapshot)
    }

    pub fn status(&self, id: &str) -> ArenaResult<DebateStatus> {
        self.read(id, |s| s.status)
    }

    /// Listing of every live session, newest first.
    pub fn list(&self) -> ArenaResult<Vec<DebateListing>> {
        let cells: Vec<SessionCell> = {
            let sessions = self.sessions.read().map_err(|_| ArenaError::LockPoisoned)?;
            sessions.values().cloned().collect()
        };
        let mut listings = Vec::with_capacity(cells.len());
        for cell in cells {
            let session = cell.read().map_err(|_| ArenaError::LockPoisoned)?;
            listings.push(session.listing());
        }
        listings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(listings)
    }

    /// Discard a session. A round task still running observes `NotFound`
    /// at its next registry write and exits.
    pub fn evict(&self, id: &str) -> ArenaResult<DebateSession> {
        let cell = {
            let mut sessions = self.sessions.write().map_err(|_| ArenaError::LockPoisoned)?;
            sessions
                .remove(id)
                .ok_or_else(|| ArenaError::NotFound(id.to_string()))?
        };
        let session = cell.read().map_err(|_| ArenaError::LockPoisoned)?;
        info!(debate_id = %id, status = %session.status, "Debate session evicted");
        Ok(session.clone())
    }

    /// idle → loading, claimed when a start is requested.
    pub fn mark_loading(&self, id: &str) -> ArenaResult<()> {
        self.write(id, |s| s.transition_from(&[DebateStatus::Idle], DebateStatus::Loading))
    }

    /// idle|loading → debating.
    pub fn start(&self, id: &str) -> ArenaResult<()> {
        self.write(id, |s| {
            s.transition_from(
                &[DebateStatus::Idle, DebateStatus::Loading],
                DebateStatus::Debating,
            )
        })
    }

    /// debating → paused.
    pub fn pause(&self, id: &str) -> ArenaResult<()> {
        self.write(id, |s| {
            s.transition_from(&[DebateStatus::Debating], DebateStatus::Paused)
        })
    }

    /// paused → debating.
    pub fn resume(&self, id: &str) -> ArenaResult<()> {
        self.write(id, |s| {
            s.transition_from(&[DebateStatus::Paused], DebateStatus::Debating)
        })
    }

    /// debating → concluding, once the round loop has stopped.
    pub fn begin_concluding(&self, id: &str) -> ArenaResult<()> {
        self.write(id, |s| {
            s.speaking_agent = None;
            s.transition_from(&[DebateStatus::Debating], DebateStatus::Concluding)
        })
    }

    /// concluding → complete, storing the summary.
    pub fn complete(&self, id: &str, summary: DebateSummary) -> ArenaResult<()> {
        self.write(id, |s| {
            s.transition_from(&[DebateStatus::Concluding], DebateStatus::Complete)?;
            s.summary = Some(summary);
            info!(debate_id = %s.id, rounds = s.rounds.len(), "Debate complete");
            Ok(())
        })
    }

    /// Any non-terminal status → error. Terminal.
    pub fn set_error(&self, id: &str, message: &str) -> ArenaResult<()> {
        self.write(id, |s| {
            s.transition(DebateStatus::Error)?;
            s.error = Some(message.to_string());
            Ok(())
        })
    }

    // =========================================================================
    // Debate content (written only by the owning round task)
    // =========================================================================

    pub fn set_speaking(&self, id: &str, agent_id: Option<&str>) -> ArenaResult<()> {
        self.write(id, |s| {
            if let Some(agent) = agent_id {
                if !s.agent_ids.iter().any(|a| a == agent) {
                    return Err(ArenaError::Validation(format!(
                        "agent '{}' is not a participant",
                        agent
                    )));
                }
            }
            s.speaking_agent = agent_id.map(str::to_string);
            Ok(())
        })
    }

    /// Append an argument, opening the round record when this is its first
    /// argument. Rounds must start at 1 and follow each other without gaps,
    /// and a new round only opens once the previous one is closed.
    pub fn append_argument(
        &self,
        id: &str,
        round: u32,
        mut argument: DebateArgument,
    ) -> ArenaResult<()> {
        self.write(id, |s| {
            ensure_accepts_content(s)?;
            if round > s.max_rounds {
                return Err(ArenaError::Validation(format!(
                    "round {} exceeds the ceiling of {}",
                    round, s.max_rounds
                )));
            }
            if !s.agent_ids.iter().any(|a| *a == argument.agent_id) {
                return Err(ArenaError::Validation(format!(
                    "agent '{}' is not a participant",
                    argument.agent_id
                )));
            }
            let agents = s.agent_ids.len();
            argument.round = round;

            let tail = s
                .rounds
                .last()
                .map(|r| (r.round, r.is_open(), r.arguments.len()));
            match tail {
                Some((last, true, held)) if last == round => {
                    if held >= agents {
                        return Err(ArenaError::Validation(format!(
                            "round {} already holds {} arguments",
                            round, agents
                        )));
                    }
                    if let Some(record) = s.rounds.last_mut() {
                        record.arguments.push(argument);
                    }
                }
                Some((last, false, _)) if round == last + 1 => {
                    s.rounds.push(opened_with(round, argument));
                }
                None if round == 1 => {
                    s.rounds.push(opened_with(round, argument));
                }
                Some((last, open, _)) => {
                    return Err(ArenaError::RoundOutOfOrder {
                        attempted: round,
                        last,
                        open,
                    })
                }
                None => {
                    return Err(ArenaError::RoundOutOfOrder {
                        attempted: round,
                        last: 0,
                        open: false,
                    })
                }
            }
            s.current_round = round;
            debug!(debate_id = %s.id, round, "Argument appended");
            Ok(())
        })
    }

    /// Record a moderator step against the open round, enforcing the
    /// acting → observing alternation and the single terminating decision.
    pub fn record_moderator_step(
        &self,
        id: &str,
        round: u32,
        step: ModeratorStep,
    ) -> ArenaResult<()> {
        self.write(id, |s| {
            ensure_accepts_content(s)?;
            let record = open_round_mut(s, round)?;
            step.may_follow(record.moderator_steps.last())
                .map_err(|reason| ArenaError::InvalidStepSequence { round, reason })?;
            record.moderator_steps.push(step);
            Ok(())
        })
    }

    /// Close the round. Its last moderator step must be the matching decision.
    pub fn close_round(&self, id: &str, round: u32, decision: Decision) -> ArenaResult<()> {
        self.write(id, |s| {
            ensure_accepts_content(s)?;
            let record = open_round_mut(s, round)?;
            match record.moderator_steps.last().and_then(ModeratorStep::decision) {
                Some(recorded) if recorded == decision => {}
                Some(recorded) => {
                    return Err(ArenaError::InvalidStepSequence {
                        round,
                        reason: format!("closing with {} but moderator decided {}", decision, recorded),
                    })
                }
                None => {
                    return Err(ArenaError::InvalidStepSequence {
                        round,
                        reason: "round has no decision step".to_string(),
                    })
                }
            }
            record.decision = Some(decision);
            record.closed_at = Some(Utc::now());
            Ok(())
        })
    }

    // =========================================================================
    // Collaboration (independent counters, any status)
    // =========================================================================

    pub fn add_viewer(&self, id: &str, viewer_id: &str) -> ArenaResult<usize> {
        self.write(id, |s| Ok(s.viewers.join(viewer_id)))
    }

    /// Returns the remaining count and whether this call removed the viewer.
    /// Unknown viewers are a no-op.
    pub fn remove_viewer(&self, id: &str, viewer_id: &str) -> ArenaResult<(usize, bool)> {
        self.write(id, |s| {
            let removed = s.viewers.leave(viewer_id);
            Ok((s.viewers.count(), removed))
        })
    }

    pub fn add_reaction(
        &self,
        id: &str,
        argument_id: &str,
        viewer_id: &str,
        kind: ReactionKind,
    ) -> ArenaResult<ReactionOutcome> {
        self.write(id, |s| {
            if s.find_argument(argument_id).is_none() {
                return Err(ArenaError::ArgumentNotFound(argument_id.to_string()));
            }
            Ok(s.reactions.react(argument_id, viewer_id, kind))
        })
    }

    /// Share code for the debate, generated on first request and cached.
    pub fn share_code(&self, id: &str) -> ArenaResult<String> {
        self.write(id, |s| {
            if let Some(code) = &s.share_code {
                return Ok(code.clone());
            }
            let code = encode_share_code(&s.id);
            s.share_code = Some(code.clone());
            Ok(code)
        })
    }
}

fn opened_with(round: u32, argument: DebateArgument) -> DebateRound {
    let mut record = DebateRound::new(round);
    record.arguments.push(argument);
    record
}

fn ensure_accepts_content(session: &DebateSession) -> ArenaResult<()> {
    if session.status.accepts_content() {
        Ok(())
    } else {
        Err(ArenaError::Validation(format!(
            "debate {} does not accept content while {}",
            session.id, session.status
        )))
    }
}

fn open_round_mut(session: &mut DebateSession, round: u32) -> ArenaResult<&mut DebateRound> {
    match session.rounds.last_mut() {
        Some(last) if last.round == round && last.is_open() => Ok(last),
        Some(last) => Err(ArenaError::RoundOutOfOrder {
            attempted: round,
            last: last.round,
            open: last.is_open(),
        }),
        None => Err(ArenaError::RoundOutOfOrder {
            attempted: round,
            last: 0,
            open: false,
        }),
    }
}

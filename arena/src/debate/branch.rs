//! Seed a new debate from a prefix of an existing transcript.

use tracing::info;

use crate::error::{ArenaError, ArenaResult};
use crate::session::{BranchOrigin, DebateRound, DebateSpec, SharedSessionRegistry};

/// A new debate derived from a parent's transcript prefix.
#[derive(Debug, Clone)]
pub struct BranchSpec {
    pub origin: BranchOrigin,
    /// Replacement topic, if one was given.
    pub topic: Option<String>,
    /// Ready to pass to `SessionRegistry::create`.
    pub debate: DebateSpec,
}

impl BranchSpec {
    /// Arguments carried over from the parent.
    pub fn prefix_len(&self) -> usize {
        self.debate
            .seed_rounds
            .iter()
            .map(|r| r.arguments.len())
            .sum()
    }
}

/// Derives branch specs. Never starts anything itself.
pub struct BranchManager {
    registry: SharedSessionRegistry,
}

impl BranchManager {
    pub fn new(registry: SharedSessionRegistry) -> Self {
        Self { registry }
    }

    /// Cut the parent's transcript after `argument_index` arguments of
    /// `round`. Earlier rounds are kept whole; the cut round is reopened so
    /// the branch picks up at its next unspoken agent.
    pub fn create_branch(
        &self,
        parent_id: &str,
        round: u32,
        argument_index: usize,
        topic: Option<String>,
    ) -> ArenaResult<BranchSpec> {
        let parent = self
            .registry
            .get(parent_id)
            .ok_or_else(|| ArenaError::NotFound(parent_id.to_string()))?;

        let invalid = |reason: String| ArenaError::InvalidBranchPoint {
            round,
            argument_index,
            reason,
        };

        let highest = parent.rounds.last().map(|r| r.round).unwrap_or(0);
        if round == 0 || round > highest {
            return Err(invalid(format!(
                "round must be within 1..={} for this transcript",
                highest
            )));
        }
        let cut = round as usize - 1;
        let cut_round = &parent.rounds[cut];
        if argument_index > cut_round.arguments.len() {
            return Err(invalid(format!(
                "round {} has {} arguments",
                round,
                cut_round.arguments.len()
            )));
        }

        let mut seed_rounds: Vec<DebateRound> = parent.rounds[..cut].to_vec();
        if argument_index > 0 {
            let mut reopened = DebateRound::new(round);
            reopened.started_at = cut_round.started_at;
            reopened.arguments = cut_round.arguments[..argument_index].to_vec();
            seed_rounds.push(reopened);
        }

        let topic = topic
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        let origin = BranchOrigin {
            parent_id: parent.id.clone(),
            round,
            argument_index,
        };
        let debate = DebateSpec {
            id: uuid::Uuid::new_v4().to_string(),
            topic: topic.clone().unwrap_or_else(|| parent.topic.clone()),
            document: parent.document.clone(),
            agent_ids: parent.agent_ids.clone(),
            max_rounds: parent.max_rounds,
            seed_rounds,
            branched_from: Some(origin.clone()),
        };

        info!(parent_id, branch_id = %debate.id, round, argument_index, "Branch derived");
        Ok(BranchSpec {
            origin,
            topic,
            debate,
        })
    }
}

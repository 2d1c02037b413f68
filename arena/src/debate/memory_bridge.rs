//! Debate-memory integration — records each agent's arguments as insights
//! in its long-term memory once a debate completes.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::warn;

use super::persistence::PersistenceError;
use crate::session::{AgentId, DebateId, DebateSession};

/// Where an insight came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightContext {
    pub debate_id: DebateId,
    pub round: u32,
}

/// One remembered insight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentInsight {
    pub agent_id: AgentId,
    pub topic: String,
    pub insight: String,
    pub context: InsightContext,
    pub recorded_at: DateTime<Utc>,
}

/// Long-term memory for agent personas
#[async_trait]
pub trait AgentMemoryStore: Send + Sync {
    async fn add_insight(
        &self,
        agent_id: &str,
        topic: &str,
        insight: &str,
        context: &InsightContext,
    ) -> Result<(), PersistenceError>;
}

/// Agent memory kept in process memory.
#[derive(Default)]
pub struct InMemoryAgentMemory {
    insights: RwLock<HashMap<AgentId, Vec<AgentInsight>>>,
}

impl InMemoryAgentMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insights_for(&self, agent_id: &str) -> Vec<AgentInsight> {
        self.insights
            .read()
            .await
            .get(agent_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn total(&self) -> usize {
        self.insights.read().await.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl AgentMemoryStore for InMemoryAgentMemory {
    async fn add_insight(
        &self,
        agent_id: &str,
        topic: &str,
        insight: &str,
        context: &InsightContext,
    ) -> Result<(), PersistenceError> {
        self.insights
            .write()
            .await
            .entry(agent_id.to_string())
            .or_default()
            .push(AgentInsight {
                agent_id: agent_id.to_string(),
                topic: topic.to_string(),
                insight: insight.to_string(),
                context: context.clone(),
                recorded_at: Utc::now(),
            });
        Ok(())
    }
}

/// Whether the argument at `position` in `round` was copied from the parent
/// debate when this one was branched.
fn is_seeded(session: &DebateSession, round: u32, position: usize) -> bool {
    match &session.branched_from {
        Some(origin) => {
            round < origin.round || (round == origin.round && position < origin.argument_index)
        }
        None => false,
    }
}

/// Record one insight per argument this debate produced. Arguments inherited
/// by a branch were recorded when their own debate finished and are skipped.
/// Failures are logged and skipped. Returns the number recorded.
pub async fn record_debate_insights(store: &dyn AgentMemoryStore, session: &DebateSession) -> usize {
    let mut recorded = 0;
    for round in &session.rounds {
        for (position, argument) in round.arguments.iter().enumerate() {
            if is_seeded(session, round.round, position) {
                continue;
            }
            let context = InsightContext {
                debate_id: session.id.clone(),
                round: argument.round,
            };
            match store
                .add_insight(&argument.agent_id, &session.topic, &argument.content, &context)
                .await
            {
                Ok(()) => recorded += 1,
                Err(e) => {
                    warn!(debate_id = %session.id, agent_id = %argument.agent_id, round = argument.round, "Failed to record agent insight: {}", e);
                }
            }
        }
    }
    recorded
}

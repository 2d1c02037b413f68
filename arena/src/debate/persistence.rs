//! Record handed off to history once a debate completes.
//!
//! Saving is fire-and-forget from the round loop's point of view: failures
//! are logged by the caller and never reach viewers.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use crate::session::{
    AgentId, BranchOrigin, DebateId, DebateRound, DebateSession, DebateStatus, DebateSummary,
};

/// Error during persistence operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    #[error("serialize failed: {reason}")]
    SerializeFailed { reason: String },

    #[error("deserialize failed: {reason}")]
    DeserializeFailed { reason: String },

    #[error("version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("debate {debate_id} is not complete")]
    Incomplete { debate_id: DebateId },

    #[error("io error at {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("memory store rejected insight: {0}")]
    Memory(String),
}

/// A completed debate, as written to history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishedDebateRecord {
    /// Schema version for forward compatibility.
    pub version: u32,
    pub debate_id: DebateId,
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_name: Option<String>,
    pub agent_ids: Vec<AgentId>,
    pub rounds: Vec<DebateRound>,
    pub summary: DebateSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branched_from: Option<BranchOrigin>,
    pub created_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl FinishedDebateRecord {
    /// Current schema version.
    pub const CURRENT_VERSION: u32 = 1;

    /// Build the record for a completed session.
    pub fn from_session(session: &DebateSession) -> Result<Self, PersistenceError> {
        let summary = match (&session.status, &session.summary) {
            (DebateStatus::Complete, Some(summary)) => summary.clone(),
            _ => {
                return Err(PersistenceError::Incomplete {
                    debate_id: session.id.clone(),
                })
            }
        };
        Ok(Self {
            version: Self::CURRENT_VERSION,
            debate_id: session.id.clone(),
            topic: session.topic.clone(),
            document_name: session.document.as_ref().and_then(|d| d.name.clone()),
            agent_ids: session.agent_ids.clone(),
            rounds: session.rounds.clone(),
            summary,
            branched_from: session.branched_from.clone(),
            created_at: session.created_at,
            completed_at: session.completed_at.unwrap_or_else(Utc::now),
        })
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, PersistenceError> {
        serde_json::to_string_pretty(self).map_err(|e| PersistenceError::SerializeFailed {
            reason: e.to_string(),
        })
    }

    /// Deserialize from JSON string.
    pub fn from_json(json: &str) -> Result<Self, PersistenceError> {
        let record: Self =
            serde_json::from_str(json).map_err(|e| PersistenceError::DeserializeFailed {
                reason: e.to_string(),
            })?;

        if record.version > Self::CURRENT_VERSION {
            return Err(PersistenceError::VersionMismatch {
                expected: Self::CURRENT_VERSION,
                found: record.version,
            });
        }

        Ok(record)
    }
}

/// Long-term store for finished debates
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn save(&self, record: &FinishedDebateRecord) -> Result<(), PersistenceError>;
}

/// History kept in process memory.
#[derive(Default)]
pub struct InMemoryHistoryStore {
    records: RwLock<Vec<FinishedDebateRecord>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<FinishedDebateRecord> {
        self.records.read().await.clone()
    }

    pub async fn get(&self, debate_id: &str) -> Option<FinishedDebateRecord> {
        self.records
            .read()
            .await
            .iter()
            .find(|r| r.debate_id == debate_id)
            .cloned()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn save(&self, record: &FinishedDebateRecord) -> Result<(), PersistenceError> {
        let mut records = self.records.write().await;
        records.retain(|r| r.debate_id != record.debate_id);
        records.push(record.clone());
        Ok(())
    }
}

/// History written as one pretty-printed JSON file per debate.
pub struct JsonFileHistoryStore {
    dir: PathBuf,
}

impl JsonFileHistoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, debate_id: &str) -> PathBuf {
        let safe: String = debate_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", safe))
    }

    /// Load a previously saved debate.
    pub async fn load(&self, debate_id: &str) -> Result<FinishedDebateRecord, PersistenceError> {
        let path = self.path_for(debate_id);
        let json = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| io_error(&path, e))?;
        FinishedDebateRecord::from_json(&json)
    }
}

fn io_error(path: &Path, e: std::io::Error) -> PersistenceError {
    PersistenceError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

#[async_trait]
impl HistoryStore for JsonFileHistoryStore {
    async fn save(&self, record: &FinishedDebateRecord) -> Result<(), PersistenceError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error(&self.dir, e))?;
        let path = self.path_for(&record.debate_id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, record.to_json()?)
            .await
            .map_err(|e| io_error(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| io_error(&path, e))?;
        debug!(debate_id = %record.debate_id, path = %path.display(), "Debate history saved");
        Ok(())
    }
}

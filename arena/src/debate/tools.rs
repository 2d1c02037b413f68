//! Tools the moderator can call while evaluating a round.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::provider::{ModeratorContext, ProviderError, ProviderResult};
use crate::session::DebateArgument;

/// Tool surface available to the moderator loop
#[async_trait]
pub trait ModeratorToolbox: Send + Sync {
    fn tool_names(&self) -> Vec<String>;

    /// Run `tool` and return its observation text.
    async fn invoke(
        &self,
        tool: &str,
        input: &Value,
        context: &ModeratorContext,
    ) -> ProviderResult<String>;
}

pub const SCORE_BREAKDOWN: &str = "score_breakdown";
pub const ROUND_ARGUMENTS: &str = "round_arguments";
pub const AGENT_POSITIONS: &str = "agent_positions";

/// Read-only tools over the transcript
#[derive(Debug, Clone, Copy, Default)]
pub struct TranscriptTools;

#[async_trait]
impl ModeratorToolbox for TranscriptTools {
    fn tool_names(&self) -> Vec<String> {
        [SCORE_BREAKDOWN, ROUND_ARGUMENTS, AGENT_POSITIONS]
            .iter()
            .map(|t| t.to_string())
            .collect()
    }

    async fn invoke(
        &self,
        tool: &str,
        input: &Value,
        context: &ModeratorContext,
    ) -> ProviderResult<String> {
        let output = match tool {
            SCORE_BREAKDOWN => score_breakdown(&context.transcript, round_filter(input)),
            ROUND_ARGUMENTS => {
                let round = round_filter(input).ok_or_else(|| ProviderError::Tool {
                    tool: tool.to_string(),
                    reason: "input must contain a numeric \"round\"".to_string(),
                })?;
                round_arguments(&context.transcript, round)
            }
            AGENT_POSITIONS => agent_positions(&context.transcript),
            other => return Err(ProviderError::UnknownTool(other.to_string())),
        };
        serde_json::to_string_pretty(&output).map_err(|e| ProviderError::Tool {
            tool: tool.to_string(),
            reason: e.to_string(),
        })
    }
}

fn round_filter(input: &Value) -> Option<u32> {
    input
        .get("round")
        .and_then(Value::as_u64)
        .and_then(|r| u32::try_from(r).ok())
}

#[derive(Default)]
struct AgentTotals {
    name: String,
    arguments: u32,
    score_sum: f64,
    scored: u32,
    confidence_sum: f64,
    rated: u32,
}

fn mean(sum: f64, n: u32) -> Value {
    if n == 0 {
        Value::Null
    } else {
        json!((sum / n as f64 * 100.0).round() / 100.0)
    }
}

fn score_breakdown(transcript: &[DebateArgument], round: Option<u32>) -> Value {
    let mut totals: BTreeMap<&str, AgentTotals> = BTreeMap::new();
    for arg in transcript
        .iter()
        .filter(|a| round.map_or(true, |r| a.round == r))
    {
        let entry = totals.entry(arg.agent_id.as_str()).or_default();
        entry.name = arg.agent_name.clone();
        entry.arguments += 1;
        if let Some(score) = arg.score {
            entry.score_sum += f64::from(score);
            entry.scored += 1;
        }
        if let Some(confidence) = arg.confidence {
            entry.confidence_sum += f64::from(confidence);
            entry.rated += 1;
        }
    }
    let agents: Vec<Value> = totals
        .into_iter()
        .map(|(agent_id, t)| {
            json!({
                "agent_id": agent_id,
                "agent_name": t.name,
                "arguments": t.arguments,
                "mean_score": mean(t.score_sum, t.scored),
                "mean_confidence": mean(t.confidence_sum, t.rated),
            })
        })
        .collect();
    json!({ "round": round, "agents": agents })
}

fn round_arguments(transcript: &[DebateArgument], round: u32) -> Value {
    let arguments: Vec<Value> = transcript
        .iter()
        .filter(|a| a.round == round)
        .map(|a| json!({ "agent_id": a.agent_id, "agent_name": a.agent_name, "content": a.content }))
        .collect();
    json!({ "round": round, "arguments": arguments })
}

fn agent_positions(transcript: &[DebateArgument]) -> Value {
    let mut latest: BTreeMap<&str, &DebateArgument> = BTreeMap::new();
    for arg in transcript {
        latest.insert(arg.agent_id.as_str(), arg);
    }
    let positions: Vec<Value> = latest
        .into_values()
        .map(|a| {
            json!({
                "agent_id": a.agent_id,
                "agent_name": a.agent_name,
                "round": a.round,
                "position": a.content,
            })
        })
        .collect();
    json!({ "positions": positions })
}

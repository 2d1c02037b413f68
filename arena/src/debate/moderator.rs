//! Per-round moderator loop: think, act, observe, decide.
//!
//! The loop is an explicit state machine. Every transition emits exactly one
//! [`ModeratorStep`] through the caller's sink, so the step log of a round is
//! always a legal sequence:
//!
//! ```text
//! Requesting ──▶ Thinking ──▶ Requesting
//!     │
//!     ├────────▶ Acting ──▶ Observing ──▶ Requesting
//!     │
//!     └────────▶ Deciding ──▶ (verdict)
//! ```
//!
//! The engine, not the moderator, has the last word at the round ceiling:
//! a `continue` there becomes a forced `conclude`.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::error::{DebateError, DebateResult, UpstreamStage};
use super::guardrails::{GuardrailConfig, GuardrailEngine};
use super::provider::{ModeratorContext, ModeratorMove, ModeratorProvider, SummaryRequest};
use super::tools::ModeratorToolbox;
use crate::error::ArenaError;
use crate::session::{DebateSummary, Decision, ModeratorStep};

/// Receives each step as it is produced. An error aborts the evaluation.
pub type StepSink<'a> = dyn FnMut(&ModeratorStep) -> Result<(), ArenaError> + Send + 'a;

/// Verdict for one round.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeratorVerdict {
    pub decision: Decision,
    pub reasoning: String,
    /// The engine overrode or supplied the verdict.
    pub forced: bool,
    /// Moderator moves requested this round.
    pub iterations: u32,
}

enum EnginePhase {
    Requesting,
    Thinking { content: String },
    Acting { tool: String, input: Value },
    Observing { tool: String, result: String },
    Deciding {
        decision: Decision,
        reasoning: String,
        forced: bool,
    },
}

/// Drives the moderator provider and toolbox for one round at a time.
pub struct ModeratorEngine {
    provider: Arc<dyn ModeratorProvider>,
    toolbox: Arc<dyn ModeratorToolbox>,
    guardrails: GuardrailEngine,
}

impl ModeratorEngine {
    pub fn new(
        provider: Arc<dyn ModeratorProvider>,
        toolbox: Arc<dyn ModeratorToolbox>,
        config: GuardrailConfig,
    ) -> Self {
        Self {
            provider,
            toolbox,
            guardrails: GuardrailEngine::new(config),
        }
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.toolbox.tool_names()
    }

    /// Evaluate a round, emitting every step through `sink`.
    pub async fn evaluate(
        &self,
        context: &ModeratorContext,
        sink: &mut StepSink<'_>,
    ) -> DebateResult<ModeratorVerdict> {
        let round = context.round;
        let mut steps: Vec<ModeratorStep> = Vec::new();
        let mut iterations = 0u32;
        let mut phase = EnginePhase::Requesting;

        loop {
            phase = match phase {
                EnginePhase::Requesting => {
                    let budget = self.guardrails.evaluate_iterations(iterations);
                    if budget.should_stop() {
                        warn!(debate_id = %context.debate_id, round, %budget, "Forcing moderator verdict");
                        EnginePhase::Deciding {
                            decision: Decision::Continue,
                            reasoning: format!("No verdict reached: {}", budget),
                            forced: true,
                        }
                    } else {
                        iterations += 1;
                        let next = self
                            .provider
                            .next_move(context, &steps)
                            .await
                            .map_err(|e| {
                                DebateError::upstream(UpstreamStage::ModeratorStep { round }, e)
                            })?;
                        match next {
                            ModeratorMove::Think { content } => EnginePhase::Thinking { content },
                            ModeratorMove::UseTool { tool, input } => {
                                EnginePhase::Acting { tool, input }
                            }
                            ModeratorMove::Decide {
                                decision,
                                reasoning,
                            } => EnginePhase::Deciding {
                                decision,
                                reasoning,
                                forced: false,
                            },
                        }
                    }
                }

                EnginePhase::Thinking { content } => {
                    emit(&mut steps, sink, ModeratorStep::Thinking { content })?;
                    EnginePhase::Requesting
                }

                EnginePhase::Acting { tool, input } => {
                    emit(
                        &mut steps,
                        sink,
                        ModeratorStep::Acting {
                            tool: tool.clone(),
                            input: input.clone(),
                        },
                    )?;
                    let result = match self.toolbox.invoke(&tool, &input, context).await {
                        Ok(result) => result,
                        Err(e) => {
                            warn!(debate_id = %context.debate_id, round, tool = %tool, "Moderator tool failed: {}", e);
                            format!("error: {}", e)
                        }
                    };
                    EnginePhase::Observing { tool, result }
                }

                EnginePhase::Observing { tool, result } => {
                    emit(&mut steps, sink, ModeratorStep::Observing { tool, result })?;
                    EnginePhase::Requesting
                }

                EnginePhase::Deciding {
                    decision,
                    reasoning,
                    forced,
                } => {
                    let ceiling = self.guardrails.evaluate_round(round, context.max_rounds);
                    let (decision, reasoning, forced) =
                        if ceiling.should_stop() && decision == Decision::Continue {
                            info!(debate_id = %context.debate_id, round, "Round ceiling forces conclude");
                            let reasoning = if reasoning.is_empty() {
                                ceiling.to_string()
                            } else {
                                format!("{}; moderator said: {}", ceiling, reasoning)
                            };
                            (Decision::Conclude, reasoning, true)
                        } else {
                            (decision, reasoning, forced)
                        };

                    emit(
                        &mut steps,
                        sink,
                        ModeratorStep::Decision {
                            decision,
                            reasoning: reasoning.clone(),
                            forced,
                        },
                    )?;
                    debug!(debate_id = %context.debate_id, round, %decision, forced, iterations, "Moderator verdict");
                    return Ok(ModeratorVerdict {
                        decision,
                        reasoning,
                        forced,
                        iterations,
                    });
                }
            };
        }
    }

    /// Produce the closing summary. Called once, after the round loop stops.
    pub async fn summarize(&self, request: &SummaryRequest) -> DebateResult<DebateSummary> {
        let summary = self
            .provider
            .summarize(request)
            .await
            .map_err(|e| DebateError::upstream(UpstreamStage::Summary, e))?;
        Ok(summary.normalized())
    }
}

fn emit(
    steps: &mut Vec<ModeratorStep>,
    sink: &mut StepSink<'_>,
    step: ModeratorStep,
) -> DebateResult<()> {
    sink(&step)?;
    steps.push(step);
    Ok(())
}

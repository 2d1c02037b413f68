//! Scripted debate integration test — drives full debates through the
//! arena with deterministic agents and moderator (no LLM calls).
//!
//! Covers: registry ↔ orchestrator ↔ moderator engine ↔ event bus ↔
//! pause controller ↔ branching ↔ history hand-off running together.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use arena::debate::{
    AgentTurn, AgentTurnProvider, AgentTurnRequest, FinishedDebateRecord, HistoryStore,
    InMemoryAgentMemory, InMemoryHistoryStore, ModeratorContext, ModeratorMove,
    ModeratorProvider, PersistenceError, ProviderError, ProviderResult, RunOutcome,
    SummaryRequest,
};
use arena::{
    ArenaError, DebateArena, DebateEvent, DebateStatus, DebateSummary, Decision, ModeratorStep,
    NewDebate, ReactionKind, SharedDebateArena, Subscription,
};

// ── Scripted providers ─────────────────────────────────────────────

/// Agents whose content depends only on (agent, round, transcript length).
#[derive(Default)]
struct ScriptedAgents {
    fail_on: Option<(String, u32)>,
    gate: Option<Arc<Semaphore>>,
    transcript_lens: Mutex<Vec<usize>>,
}

impl ScriptedAgents {
    fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Default::default()
        }
    }

    fn failing(agent: &str, round: u32) -> Self {
        Self {
            fail_on: Some((agent.to_string(), round)),
            ..Default::default()
        }
    }
}

#[async_trait]
impl AgentTurnProvider for ScriptedAgents {
    async fn take_turn(&self, request: &AgentTurnRequest) -> ProviderResult<AgentTurn> {
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| ProviderError::Request(e.to_string()))?
                .forget();
        }
        self.transcript_lens
            .lock()
            .unwrap()
            .push(request.transcript.len());
        if let Some((agent, round)) = &self.fail_on {
            if *agent == request.agent_id && *round == request.round {
                return Err(ProviderError::Status {
                    status: 502,
                    body: "bad gateway".to_string(),
                });
            }
        }
        Ok(AgentTurn {
            agent_name: request.agent_id.to_uppercase(),
            agent_color: "#336699".to_string(),
            content: format!(
                "{} argues in round {} after {} prior arguments",
                request.agent_id,
                request.round,
                request.transcript.len()
            ),
            score: Some(3),
            confidence: Some(0.8),
            tools_used: if request.agent_id == "a" {
                vec!["search".to_string()]
            } else {
                vec![]
            },
        })
    }
}

/// Moderator that thinks, checks the scores, then decides.
#[derive(Default)]
struct ScriptedModerator {
    conclude_at: Option<u32>,
    fail_in_round: Option<u32>,
    fail_summary: bool,
    summaries: AtomicUsize,
}

impl ScriptedModerator {
    fn concluding_at(round: u32) -> Self {
        Self {
            conclude_at: Some(round),
            ..Default::default()
        }
    }

    fn failing_in_round(round: u32) -> Self {
        Self {
            fail_in_round: Some(round),
            ..Default::default()
        }
    }

    fn failing_summary() -> Self {
        Self {
            fail_summary: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl ModeratorProvider for ScriptedModerator {
    async fn next_move(
        &self,
        context: &ModeratorContext,
        steps: &[ModeratorStep],
    ) -> ProviderResult<ModeratorMove> {
        if self.fail_in_round == Some(context.round) {
            return Err(ProviderError::Malformed("moderator returned prose".to_string()));
        }
        Ok(match steps.len() {
            0 => ModeratorMove::Think {
                content: format!("Reviewing round {}", context.round),
            },
            1 => ModeratorMove::UseTool {
                tool: "score_breakdown".to_string(),
                input: serde_json::json!({ "round": context.round }),
            },
            _ => {
                let settled = self.conclude_at.is_some_and(|r| context.round >= r);
                ModeratorMove::Decide {
                    decision: if settled {
                        Decision::Conclude
                    } else {
                        Decision::Continue
                    },
                    reasoning: format!("round {} reviewed", context.round),
                }
            }
        })
    }

    async fn summarize(&self, request: &SummaryRequest) -> ProviderResult<DebateSummary> {
        self.summaries.fetch_add(1, Ordering::SeqCst);
        if self.fail_summary {
            return Err(ProviderError::Status {
                status: 500,
                body: "summary model down".to_string(),
            });
        }
        Ok(DebateSummary {
            consensus: (request.transcript.len() * 10).min(100) as u8,
            agreements: vec!["both sides argued".to_string()],
            disagreements: vec![],
            recommendation: request
                .transcript
                .iter()
                .map(|a| a.content.clone())
                .collect::<Vec<_>>()
                .join(" | "),
            reasoning: format!("{} rounds", request.rounds_completed),
        })
    }
}

struct FailingHistory;

#[async_trait]
impl HistoryStore for FailingHistory {
    async fn save(&self, _record: &FinishedDebateRecord) -> Result<(), PersistenceError> {
        Err(PersistenceError::Io {
            path: "/nowhere".to_string(),
            reason: "disk full".to_string(),
        })
    }
}

// ── Helpers ────────────────────────────────────────────────────────

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

fn arena_with(agents: ScriptedAgents, moderator: Arc<ScriptedModerator>) -> SharedDebateArena {
    init_tracing();
    DebateArena::builder(Arc::new(agents), moderator).build().shared()
}

fn new_debate(agents: &[&str], max_rounds: u32) -> NewDebate {
    NewDebate {
        topic: "Should the team adopt a monorepo?".to_string(),
        agent_ids: agents.iter().map(|a| a.to_string()).collect(),
        max_rounds: Some(max_rounds),
        document: None,
    }
}

async fn collect_until_terminal(sub: &mut Subscription) -> Vec<DebateEvent> {
    let mut events = Vec::new();
    loop {
        let next = tokio::time::timeout(Duration::from_secs(5), sub.recv())
            .await
            .expect("timed out waiting for events");
        match next {
            Some(event) => {
                let done = event.is_terminal();
                events.push(event);
                if done {
                    break;
                }
            }
            None => break,
        }
    }
    events
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

fn types(events: &[DebateEvent]) -> Vec<&'static str> {
    events.iter().map(DebateEvent::event_type).collect()
}

// ── Ceiling: always-continue moderator ─────────────────────────────

#[tokio::test]
async fn test_always_continue_stops_at_ceiling_with_forced_conclude() {
    let moderator = Arc::new(ScriptedModerator::default());
    let arena = arena_with(ScriptedAgents::default(), moderator.clone());
    let id = arena.create_debate(new_debate(&["a", "b"], 3)).unwrap().id;
    let mut sub = arena.subscribe(&id).unwrap();

    arena.start_debate(&id).unwrap();
    assert_eq!(
        arena.wait(&id).await,
        Some(RunOutcome::Completed { rounds: 3 })
    );

    let snapshot = arena.snapshot(&id).unwrap();
    assert_eq!(snapshot.status, DebateStatus::Complete);
    assert_eq!(snapshot.rounds.len(), 3);
    let numbers: Vec<u32> = snapshot.rounds.iter().map(|r| r.round).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    assert_eq!(snapshot.rounds[0].decision, Some(Decision::Continue));
    assert_eq!(snapshot.rounds[1].decision, Some(Decision::Continue));
    assert_eq!(snapshot.rounds[2].decision, Some(Decision::Conclude));
    assert!(snapshot.rounds[2].was_forced());
    assert!(!snapshot.rounds[0].was_forced());
    assert!(snapshot.summary.is_some());
    assert!(snapshot.speaking_agent.is_none());
    assert_eq!(moderator.summaries.load(Ordering::SeqCst), 1);

    for round in &snapshot.rounds {
        let decisions = round
            .moderator_steps
            .iter()
            .filter(|s| s.decision().is_some())
            .count();
        assert_eq!(decisions, 1);
        assert_eq!(
            arena::session::validate_step_sequence(&round.moderator_steps),
            Ok(round.decision.unwrap())
        );
    }

    let events = collect_until_terminal(&mut sub).await;
    let kinds = types(&events);
    assert_eq!(
        &kinds[..12],
        &[
            "debate_started",
            "round_started",
            "agent_thinking",
            "agent_tool_use",
            "agent_argument",
            "agent_thinking",
            "agent_argument",
            "moderator_step",
            "moderator_step",
            "moderator_step",
            "moderator_step",
            "round_complete",
        ]
    );
    assert_eq!(kinds.last(), Some(&"debate_complete"));
    assert_eq!(kinds.iter().filter(|k| **k == "round_started").count(), 3);
    assert_eq!(kinds.iter().filter(|k| **k == "debate_complete").count(), 1);
    assert_eq!(kinds.len(), 35);

    assert_eq!(arena.pause_controller().gate_count(), 0);

    let last_round_complete = events
        .iter()
        .rev()
        .find(|e| e.event_type() == "round_complete")
        .unwrap();
    assert_eq!(
        last_round_complete.kind,
        arena::EventKind::RoundComplete {
            round: 3,
            decision: Decision::Conclude,
            forced: true,
        }
    );
}

// ── Early conclusion ───────────────────────────────────────────────

#[tokio::test]
async fn test_moderator_concludes_early() {
    let moderator = Arc::new(ScriptedModerator::concluding_at(2));
    let arena = arena_with(ScriptedAgents::default(), moderator.clone());
    let id = arena.create_debate(new_debate(&["a", "b", "c"], 5)).unwrap().id;

    arena.start_debate(&id).unwrap();
    assert_eq!(
        arena.wait(&id).await,
        Some(RunOutcome::Completed { rounds: 2 })
    );

    let snapshot = arena.snapshot(&id).unwrap();
    assert_eq!(snapshot.rounds.len(), 2);
    assert_eq!(snapshot.transcript_len(), 6);
    assert_eq!(snapshot.rounds[1].decision, Some(Decision::Conclude));
    assert!(!snapshot.rounds[1].was_forced());
    assert_eq!(snapshot.summary.unwrap().consensus, 60);
}

#[tokio::test]
async fn test_agents_see_full_prior_transcript() {
    let agents = Arc::new(ScriptedAgents::default());
    init_tracing();
    let arena = DebateArena::builder(agents.clone(), Arc::new(ScriptedModerator::default()))
        .build();
    let id = arena.create_debate(new_debate(&["a", "b"], 2)).unwrap().id;
    arena.start_debate(&id).unwrap();
    arena.wait(&id).await;

    assert_eq!(*agents.transcript_lens.lock().unwrap(), vec![0, 1, 2, 3]);
}

// ── Upstream failure ───────────────────────────────────────────────

#[tokio::test]
async fn test_agent_failure_marks_error_and_keeps_transcript() {
    let moderator = Arc::new(ScriptedModerator::default());
    let arena = arena_with(ScriptedAgents::failing("b", 2), moderator.clone());
    let id = arena.create_debate(new_debate(&["a", "b"], 3)).unwrap().id;
    let mut sub = arena.subscribe(&id).unwrap();

    arena.start_debate(&id).unwrap();
    let outcome = arena.wait(&id).await.unwrap();
    assert!(matches!(outcome, RunOutcome::Failed { .. }));

    let snapshot = arena.snapshot(&id).unwrap();
    assert_eq!(snapshot.status, DebateStatus::Error);
    assert_eq!(snapshot.transcript_len(), 3);
    let message = snapshot.error.unwrap();
    assert!(message.contains("agent 'b'"));
    assert!(message.contains("502"));
    assert_eq!(moderator.summaries.load(Ordering::SeqCst), 0);

    let events = collect_until_terminal(&mut sub).await;
    let last = events.last().unwrap();
    assert_eq!(last.event_type(), "debate_error");
    assert_eq!(last.round(), Some(2));

    let err = arena.resume(&id).unwrap_err();
    assert_eq!(err.current_status(), Some(DebateStatus::Error));
}

#[tokio::test]
async fn test_moderator_failure_marks_error_mid_debate() {
    let moderator = Arc::new(ScriptedModerator::failing_in_round(2));
    let arena = arena_with(ScriptedAgents::default(), moderator.clone());
    let id = arena.create_debate(new_debate(&["a", "b"], 3)).unwrap().id;
    let mut sub = arena.subscribe(&id).unwrap();

    arena.start_debate(&id).unwrap();
    assert!(matches!(
        arena.wait(&id).await,
        Some(RunOutcome::Failed { .. })
    ));

    let snapshot = arena.snapshot(&id).unwrap();
    assert_eq!(snapshot.status, DebateStatus::Error);
    assert_eq!(snapshot.transcript_len(), 4);
    assert_eq!(snapshot.rounds[0].decision, Some(Decision::Continue));
    assert!(snapshot.rounds[1].is_open());
    assert!(snapshot.error.unwrap().contains("moderator evaluation of round 2"));
    assert!(snapshot.summary.is_none());
    assert_eq!(moderator.summaries.load(Ordering::SeqCst), 0);
    assert_eq!(arena.pause_controller().gate_count(), 0);

    let events = collect_until_terminal(&mut sub).await;
    let last = events.last().unwrap();
    assert_eq!(last.event_type(), "debate_error");
    assert_eq!(last.round(), Some(2));
    assert!(!types(&events).contains(&"debate_complete"));
}

#[tokio::test]
async fn test_summary_failure_marks_error_without_completion() {
    let history = Arc::new(InMemoryHistoryStore::new());
    let moderator = Arc::new(ScriptedModerator::failing_summary());
    init_tracing();
    let arena = DebateArena::builder(Arc::new(ScriptedAgents::default()), moderator.clone())
        .history(history.clone())
        .build();
    let id = arena.create_debate(new_debate(&["a", "b"], 2)).unwrap().id;
    let mut sub = arena.subscribe(&id).unwrap();

    arena.start_debate(&id).unwrap();
    assert!(matches!(
        arena.wait(&id).await,
        Some(RunOutcome::Failed { .. })
    ));

    let snapshot = arena.snapshot(&id).unwrap();
    assert_eq!(snapshot.status, DebateStatus::Error);
    assert_eq!(snapshot.rounds.len(), 2);
    assert!(snapshot.summary.is_none());
    assert!(snapshot.error.unwrap().contains("final summary"));
    assert_eq!(moderator.summaries.load(Ordering::SeqCst), 1);
    assert!(history.get(&id).await.is_none());

    let events = collect_until_terminal(&mut sub).await;
    let kinds = types(&events);
    assert_eq!(kinds.last(), Some(&"debate_error"));
    assert!(!kinds.contains(&"debate_complete"));
    assert_eq!(events.last().unwrap().round(), None);
}

// ── Pause / resume ─────────────────────────────────────────────────

#[tokio::test]
async fn test_pause_resume_matches_uninterrupted_run() {
    // Reference run without a pause.
    let reference = arena_with(
        ScriptedAgents::default(),
        Arc::new(ScriptedModerator::default()),
    );
    let ref_id = reference.create_debate(new_debate(&["a", "b"], 3)).unwrap().id;
    reference.start_debate(&ref_id).unwrap();
    reference.wait(&ref_id).await;
    let expected = reference.snapshot(&ref_id).unwrap();

    let gate = Arc::new(Semaphore::new(0));
    let arena = arena_with(
        ScriptedAgents::gated(gate.clone()),
        Arc::new(ScriptedModerator::default()),
    );
    let id = arena.create_debate(new_debate(&["a", "b"], 3)).unwrap().id;
    let mut sub = arena.subscribe(&id).unwrap();
    arena.start_debate(&id).unwrap();

    gate.add_permits(1);
    wait_for(|| arena.snapshot(&id).unwrap().transcript_len() == 1).await;
    arena.pause(&id).unwrap();
    assert!(arena.pause(&id).is_err());

    // At most the turn already in flight may land.
    gate.add_permits(100);
    tokio::time::sleep(Duration::from_millis(50)).await;
    let held = arena.snapshot(&id).unwrap();
    assert_eq!(held.status, DebateStatus::Paused);
    assert!(held.transcript_len() <= 2);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(arena.snapshot(&id).unwrap().transcript_len(), held.transcript_len());
    assert!(held.rounds[0].moderator_steps.is_empty());

    arena.resume(&id).unwrap();
    assert_eq!(
        arena.wait(&id).await,
        Some(RunOutcome::Completed { rounds: 3 })
    );

    let actual = arena.snapshot(&id).unwrap();
    let contents = |s: &arena::SessionSnapshot| {
        s.rounds
            .iter()
            .flat_map(|r| r.arguments.iter().map(|a| a.content.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(contents(&actual), contents(&expected));
    assert_eq!(actual.summary, expected.summary);

    let kinds = types(&collect_until_terminal(&mut sub).await);
    assert_eq!(kinds.iter().filter(|k| **k == "debate_paused").count(), 1);
    assert_eq!(kinds.iter().filter(|k| **k == "debate_resumed").count(), 1);
    assert_eq!(kinds.iter().filter(|k| **k == "agent_argument").count(), 6);
}

#[tokio::test]
async fn test_end_debate_while_paused_discards_run() {
    let gate = Arc::new(Semaphore::new(0));
    let arena = arena_with(
        ScriptedAgents::gated(gate.clone()),
        Arc::new(ScriptedModerator::default()),
    );
    let id = arena.create_debate(new_debate(&["a", "b"], 3)).unwrap().id;
    let mut sub = arena.subscribe(&id).unwrap();
    arena.start_debate(&id).unwrap();

    gate.add_permits(1);
    wait_for(|| arena.snapshot(&id).unwrap().transcript_len() == 1).await;
    arena.pause(&id).unwrap();
    arena.end_debate(&id).unwrap();
    gate.add_permits(10);

    assert_eq!(arena.wait(&id).await, Some(RunOutcome::Discarded));
    assert!(arena.snapshot(&id).unwrap_err().is_not_found());
    assert!(arena.subscribe(&id).is_err());

    // the stream ends instead of hanging
    let events = collect_until_terminal(&mut sub).await;
    assert!(events.iter().all(|e| !e.is_terminal()));
}

// ── Viewers ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_independent_viewer_streams() {
    let arena = arena_with(
        ScriptedAgents::default(),
        Arc::new(ScriptedModerator::default()),
    );
    let id = arena.create_debate(new_debate(&["a", "b"], 2)).unwrap().id;

    let (v1, count) = arena.join(&id, Some("viewer-1".to_string())).unwrap();
    assert_eq!((v1.as_str(), count), ("viewer-1", 1));
    let (v2, count) = arena.join(&id, None).unwrap();
    assert_eq!(count, 2);

    let mut first = arena.subscribe(&id).unwrap();
    let mut second = arena.subscribe(&id).unwrap();
    let dropped = arena.subscribe(&id).unwrap();
    assert_eq!(arena.bus().subscriber_count(&id), 3);
    drop(dropped);
    assert_eq!(arena.bus().subscriber_count(&id), 2);

    arena.start_debate(&id).unwrap();
    let (a, b) = tokio::join!(
        collect_until_terminal(&mut first),
        collect_until_terminal(&mut second)
    );
    assert_eq!(a, b);
    assert_eq!(a.last().unwrap().event_type(), "debate_complete");
    let rounds: Vec<u32> = a.iter().filter_map(DebateEvent::round).collect();
    assert!(rounds.windows(2).all(|w| w[0] <= w[1]));

    assert_eq!(arena.leave(&id, &v2).unwrap(), 1);
    assert_eq!(arena.leave(&id, "never-joined").unwrap(), 1);
    assert_eq!(arena.snapshot(&id).unwrap().viewer_count, 1);
}

#[tokio::test]
async fn test_concurrent_leaves_publish_once() {
    let arena = arena_with(
        ScriptedAgents::default(),
        Arc::new(ScriptedModerator::default()),
    );
    let id = arena.create_debate(new_debate(&["a", "b"], 1)).unwrap().id;
    arena.join(&id, Some("v1".to_string())).unwrap();
    let mut sub = arena.subscribe(&id).unwrap();

    let leavers: Vec<_> = (0..8)
        .map(|_| {
            let arena = arena.clone();
            let id = id.clone();
            std::thread::spawn(move || arena.leave(&id, "v1").unwrap())
        })
        .collect();
    for leaver in leavers {
        assert_eq!(leaver.join().unwrap(), 0);
    }

    arena.end_debate(&id).unwrap();
    let mut left = 0;
    while let Some(event) = sub.recv().await {
        if event.event_type() == "viewer_left" {
            left += 1;
        }
    }
    assert_eq!(left, 1);
}

#[tokio::test]
async fn test_reactions_and_share_codes() {
    let arena = arena_with(
        ScriptedAgents::default(),
        Arc::new(ScriptedModerator::default()),
    );
    let id = arena.create_debate(new_debate(&["a", "b"], 1)).unwrap().id;
    arena.start_debate(&id).unwrap();
    arena.wait(&id).await;

    let argument_id = arena.snapshot(&id).unwrap().rounds[0].arguments[0].id.clone();
    let mut sub = arena.subscribe(&id).unwrap();

    let first = arena
        .react(&id, &argument_id, "v1", ReactionKind::Insightful)
        .unwrap();
    assert_eq!(first.tally.get(&ReactionKind::Insightful), Some(&1));
    let again = arena
        .react(&id, &argument_id, "v1", ReactionKind::Insightful)
        .unwrap();
    assert_eq!(again.tally.get(&ReactionKind::Insightful), None);
    assert!(matches!(
        arena.react(&id, "no-such-argument", "v1", ReactionKind::Like),
        Err(ArenaError::ArgumentNotFound(_))
    ));
    assert_eq!(sub.recv().await.unwrap().event_type(), "reaction_added");

    let code = arena.share_code(&id).unwrap();
    assert_eq!(arena.share_code(&id).unwrap(), code);
    assert_eq!(arena.resolve_share_code(&code).unwrap().id, id);
    assert!(matches!(
        arena.resolve_share_code("%%%"),
        Err(ArenaError::InvalidShareCode(_))
    ));
}

// ── Validation ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_fewer_than_two_agents_rejected_before_creation() {
    let arena = arena_with(
        ScriptedAgents::default(),
        Arc::new(ScriptedModerator::default()),
    );
    let err = arena.create_debate(new_debate(&["solo"], 3)).unwrap_err();
    assert!(matches!(err, ArenaError::Validation(_)));
    assert!(arena.list().unwrap().is_empty());
}

#[tokio::test]
async fn test_start_twice_is_rejected() {
    let arena = arena_with(
        ScriptedAgents::default(),
        Arc::new(ScriptedModerator::default()),
    );
    let id = arena.create_debate(new_debate(&["a", "b"], 1)).unwrap().id;
    arena.start_debate(&id).unwrap();
    assert!(matches!(
        arena.start_debate(&id),
        Err(ArenaError::InvalidTransition { .. })
    ));
    arena.wait(&id).await;
}

// ── Branching ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_branch_continues_from_cut_point() {
    let arena = arena_with(
        ScriptedAgents::default(),
        Arc::new(ScriptedModerator::default()),
    );
    let parent_id = arena.create_debate(new_debate(&["a", "b"], 3)).unwrap().id;
    arena.start_debate(&parent_id).unwrap();
    arena.wait(&parent_id).await;
    let parent = arena.snapshot(&parent_id).unwrap();

    let branch = arena
        .branch(&parent_id, 2, 1, Some("What if we split repos?".to_string()), false)
        .unwrap();
    assert_eq!(branch.status, DebateStatus::Idle);
    assert_eq!(branch.transcript_len(), 3);
    assert_eq!(branch.topic, "What if we split repos?");

    let mut sub = arena.subscribe(&branch.id).unwrap();
    arena.start_debate(&branch.id).unwrap();
    assert_eq!(
        arena.wait(&branch.id).await,
        Some(RunOutcome::Completed { rounds: 3 })
    );

    let finished = arena.snapshot(&branch.id).unwrap();
    assert_eq!(finished.rounds.len(), 3);
    assert_eq!(finished.rounds[0], parent.rounds[0]);
    assert_eq!(
        finished.rounds[1].arguments[0].id,
        parent.rounds[1].arguments[0].id
    );
    assert_eq!(finished.rounds[1].arguments[1].agent_id, "b");
    assert_ne!(
        finished.rounds[1].arguments[1].id,
        parent.rounds[1].arguments[1].id
    );
    assert_eq!(finished.branched_from.unwrap().parent_id, parent_id);

    let events = collect_until_terminal(&mut sub).await;
    match &events[0].kind {
        arena::EventKind::DebateStarted { branched_from, .. } => {
            assert_eq!(branched_from.as_ref().unwrap().round, 2);
        }
        other => panic!("expected debate_started, got {:?}", other),
    }
    // the reopened round is announced once, then b speaks first
    assert_eq!(events[1].kind, arena::EventKind::RoundStarted { round: 2 });
    assert_eq!(events[2].event_type(), "agent_thinking");

    // parent is untouched
    assert_eq!(arena.snapshot(&parent_id).unwrap().rounds, parent.rounds);
}

#[tokio::test]
async fn test_branch_out_of_range_never_truncates() {
    let arena = arena_with(
        ScriptedAgents::default(),
        Arc::new(ScriptedModerator::default()),
    );
    let parent_id = arena.create_debate(new_debate(&["a", "b"], 2)).unwrap().id;
    arena.start_debate(&parent_id).unwrap();
    arena.wait(&parent_id).await;

    assert!(matches!(
        arena.branch(&parent_id, 3, 0, None, false),
        Err(ArenaError::InvalidBranchPoint { .. })
    ));
    assert!(matches!(
        arena.branch(&parent_id, 1, 5, None, false),
        Err(ArenaError::InvalidBranchPoint { .. })
    ));
    assert!(arena.branch("ghost", 1, 0, None, false).unwrap_err().is_not_found());
    assert_eq!(arena.list().unwrap().len(), 1);
}

#[tokio::test]
async fn test_branch_autostart() {
    let arena = arena_with(
        ScriptedAgents::default(),
        Arc::new(ScriptedModerator::default()),
    );
    let parent_id = arena.create_debate(new_debate(&["a", "b"], 2)).unwrap().id;
    arena.start_debate(&parent_id).unwrap();
    arena.wait(&parent_id).await;

    let branch = arena.branch(&parent_id, 1, 0, None, true).unwrap();
    assert_ne!(branch.status, DebateStatus::Idle);
    assert_eq!(
        arena.wait(&branch.id).await,
        Some(RunOutcome::Completed { rounds: 2 })
    );
}

// ── History / memory hand-off ──────────────────────────────────────

#[tokio::test]
async fn test_hand_off_records_history_and_insights() {
    let history = Arc::new(InMemoryHistoryStore::new());
    let memory = Arc::new(InMemoryAgentMemory::new());
    init_tracing();
    let arena = DebateArena::builder(
        Arc::new(ScriptedAgents::default()),
        Arc::new(ScriptedModerator::default()),
    )
    .history(history.clone())
    .memory(memory.clone())
    .build();

    let id = arena.create_debate(new_debate(&["a", "b"], 2)).unwrap().id;
    arena.start_debate(&id).unwrap();
    arena.wait(&id).await;

    let record = history.get(&id).await.unwrap();
    assert_eq!(record.rounds.len(), 2);
    assert_eq!(record.summary.consensus, 40);
    assert_eq!(memory.total().await, 4);
    assert_eq!(memory.insights_for("a").await.len(), 2);
}

#[tokio::test]
async fn test_branch_records_only_its_own_insights() {
    let memory = Arc::new(InMemoryAgentMemory::new());
    init_tracing();
    let arena = DebateArena::builder(
        Arc::new(ScriptedAgents::default()),
        Arc::new(ScriptedModerator::default()),
    )
    .memory(memory.clone())
    .build();

    let parent_id = arena.create_debate(new_debate(&["a", "b"], 2)).unwrap().id;
    arena.start_debate(&parent_id).unwrap();
    arena.wait(&parent_id).await;
    assert_eq!(memory.total().await, 4);

    // cut after a's round-2 argument: only b's round-2 turn is new
    let branch = arena.branch(&parent_id, 2, 1, None, true).unwrap();
    assert_eq!(
        arena.wait(&branch.id).await,
        Some(RunOutcome::Completed { rounds: 2 })
    );
    assert_eq!(memory.total().await, 5);

    let a = memory.insights_for("a").await;
    assert_eq!(a.len(), 2);
    assert!(a.iter().all(|i| i.context.debate_id == parent_id));
    let b_from_branch: Vec<_> = memory
        .insights_for("b")
        .await
        .into_iter()
        .filter(|i| i.context.debate_id == branch.id)
        .collect();
    assert_eq!(b_from_branch.len(), 1);
    assert_eq!(b_from_branch[0].context.round, 2);
}

#[tokio::test]
async fn test_history_failure_is_swallowed() {
    init_tracing();
    let arena = DebateArena::builder(
        Arc::new(ScriptedAgents::default()),
        Arc::new(ScriptedModerator::default()),
    )
    .history(Arc::new(FailingHistory))
    .build();

    let id = arena.create_debate(new_debate(&["a", "b"], 1)).unwrap().id;
    let mut sub = arena.subscribe(&id).unwrap();
    arena.start_debate(&id).unwrap();

    assert_eq!(
        arena.wait(&id).await,
        Some(RunOutcome::Completed { rounds: 1 })
    );
    assert_eq!(arena.snapshot(&id).unwrap().status, DebateStatus::Complete);
    let kinds = types(&collect_until_terminal(&mut sub).await);
    assert!(!kinds.contains(&"debate_error"));
}

//! Mocked debate integration test: exercises the full debate pipeline
//! with deterministic stub callers (no LLM calls).
//!
//! Covers: orchestrator ↔ enforcer ↔ packets ↔ trace ordering running
//! together in a single pass.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use coordination::debate::{DebateConfig, DebateError, DebateOrchestrator, DebateState, Phase, Role};
use coordination::{BackendError, BackendKind, LlmCaller, StructuredCaller};

/// Helper: which role a system prompt belongs to.
fn role_of(system_prompt: &str) -> Role {
    let first = system_prompt.lines().next().unwrap_or_default();
    match first {
        "You are the Optimist." => Role::Optimist,
        "You are the Skeptic." => Role::Skeptic,
        "You are the Operator." => Role::Operator,
        "You are the Long-term Thinker." => Role::LongTerm,
        "You are the Judge." => Role::Judge,
        other => panic!("unknown system prompt: {other}"),
    }
}

/// Helper: which phase a user prompt belongs to.
fn phase_of(user_prompt: &str) -> Phase {
    if user_prompt.contains("DEBATE PACKET (JSON):") {
        Phase::Verdict
    } else if user_prompt.contains("OTHER AGENTS' OPENINGS (JSON):") {
        Phase::Critique
    } else {
        Phase::Opening
    }
}

/// Helper: a well-formed reply for each role.
fn canned_reply(role: Role) -> Value {
    match role {
        Role::Optimist => json!({"stance": "go", "arguments": ["speed"], "assumptions": [], "questions": []}),
        Role::Skeptic => json!({"stance": "stop", "arguments": ["ops cost"], "assumptions": [], "questions": [], "risks": ["outage"]}),
        Role::Operator => json!({"stance": "pilot", "plan": ["one service"], "constraints": [], "questions": []}),
        Role::LongTerm => json!({"stance": "later", "long_term_effects": [], "regrets": [], "assumptions": [], "questions": []}),
        Role::Judge => json!({"decision": "pilot first", "why": [], "key_assumptions": [], "risks": [], "minority_report": [], "next_steps": []}),
    }
}

/// Stub that answers per role and records every (role, phase) it sees.
struct RoleStub {
    calls: AtomicUsize,
    seen: Mutex<Vec<(Role, Phase)>>,
    prompts: Mutex<Vec<String>>,
}

impl RoleStub {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl LlmCaller for RoleStub {
    fn name(&self) -> &str {
        "role-stub"
    }

    async fn call(&self, system: &str, user: &str) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let role = role_of(system);
        self.seen.lock().unwrap().push((role, phase_of(user)));
        self.prompts.lock().unwrap().push(user.to_string());
        Ok(canned_reply(role).to_string())
    }
}

// ── Happy path ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_microservices_debate_end_to_end() {
    let stub = RoleStub::new();
    let orch = DebateOrchestrator::new(StructuredCaller::new(stub.clone()));

    let state = orch.run("Should we adopt microservices?", "").await.unwrap();

    assert_eq!(state.openings.len(), 4);
    assert_eq!(state.critiques.len(), 4);
    for role in Role::DEBATERS {
        assert!(!state.openings[&role].is_empty(), "{role} opening empty");
        assert!(!state.critiques[&role].is_empty(), "{role} critique empty");
    }
    assert_eq!(state.verdict["decision"], "pilot first");
    assert_eq!(state.trace.len(), 9);
    assert_eq!(stub.calls.load(Ordering::SeqCst), 9);

    let phases: Vec<Phase> = state.trace.iter().map(|e| e.phase).collect();
    assert_eq!(
        phases,
        [
            [Phase::Opening; 4].as_slice(),
            [Phase::Critique; 4].as_slice(),
            [Phase::Verdict].as_slice(),
        ]
        .concat()
    );
}

#[tokio::test]
async fn test_phase_barriers_hold() {
    let stub = RoleStub::new();
    let orch = DebateOrchestrator::new(StructuredCaller::new(stub.clone()));
    orch.run("q", "c").await.unwrap();

    // Every opening call is issued before any critique call, and the
    // verdict call comes last.
    let seen = stub.seen.lock().unwrap();
    assert!(seen[..4].iter().all(|(_, p)| *p == Phase::Opening));
    assert!(seen[4..8].iter().all(|(_, p)| *p == Phase::Critique));
    assert_eq!(seen[8], (Role::Judge, Phase::Verdict));
}

#[tokio::test]
async fn test_critique_and_verdict_prompts_embed_prior_phases() {
    let stub = RoleStub::new();
    let orch = DebateOrchestrator::new(StructuredCaller::new(stub.clone()));
    orch.run("q", "c").await.unwrap();

    let prompts = stub.prompts.lock().unwrap();
    let critique = prompts.iter().find(|p| phase_of(p) == Phase::Critique).unwrap();
    for role in Role::DEBATERS {
        assert!(critique.contains(&format!("\"{role}\"")), "critique packet lacks {role}");
    }
    assert!(critique.contains("\"ops cost\""));

    let verdict = prompts.iter().find(|p| phase_of(p) == Phase::Verdict).unwrap();
    assert!(verdict.contains("\"openings\""));
    assert!(verdict.contains("\"critiques\""));
}

// ── Concurrency keeps trace order ──────────────────────────────────

/// Stub whose latency is inversely proportional to role order, so calls
/// complete in reverse order.
struct ReverseLatency;

#[async_trait]
impl LlmCaller for ReverseLatency {
    fn name(&self) -> &str {
        "reverse-latency"
    }

    async fn call(&self, system: &str, _user: &str) -> Result<String, BackendError> {
        let role = role_of(system);
        let delay = match role {
            Role::Optimist => 40,
            Role::Skeptic => 30,
            Role::Operator => 20,
            Role::LongTerm => 10,
            Role::Judge => 1,
        };
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok(canned_reply(role).to_string())
    }
}

#[tokio::test(start_paused = true)]
async fn test_trace_follows_role_order_not_completion_order() {
    let orch = DebateOrchestrator::new(StructuredCaller::new(Arc::new(ReverseLatency)));
    let state = orch.run("q", "").await.unwrap();

    let roles: Vec<Role> = state.trace.iter().map(|e| e.role).collect();
    let mut expected = Role::DEBATERS.to_vec();
    expected.extend(Role::DEBATERS);
    expected.push(Role::Judge);
    assert_eq!(roles, expected);
}

// ── JSON repair flows through the run ──────────────────────────────

/// Skeptic's first opening is prose; its repair succeeds.
struct ProseOnce {
    calls: AtomicUsize,
    repaired_reply: &'static str,
}

#[async_trait]
impl LlmCaller for ProseOnce {
    fn name(&self) -> &str {
        "prose-once"
    }

    async fn call(&self, system: &str, user: &str) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let role = role_of(system);
        if user.starts_with("Your previous response was not valid JSON") {
            return Ok(self.repaired_reply.to_string());
        }
        if role == Role::Skeptic && phase_of(user) == Phase::Opening {
            return Ok("not json".to_string());
        }
        Ok(canned_reply(role).to_string())
    }
}

#[tokio::test]
async fn test_repaired_output_is_recorded() {
    let stub = Arc::new(ProseOnce {
        calls: AtomicUsize::new(0),
        repaired_reply: r#"{"a":1}"#,
    });
    let orch = DebateOrchestrator::new(StructuredCaller::new(stub.clone()));
    let state = orch.run("q", "").await.unwrap();

    assert_eq!(Value::Object(state.openings[&Role::Skeptic].clone()), json!({"a": 1}));
    assert_eq!(state.trace.len(), 9);
    assert_eq!(stub.calls.load(Ordering::SeqCst), 10);
}

#[tokio::test]
async fn test_sentinel_does_not_abort_and_reaches_critique_packet() {
    let stub = Arc::new(ProseOnce {
        calls: AtomicUsize::new(0),
        repaired_reply: "still prose",
    });
    let orch = DebateOrchestrator::new(StructuredCaller::new(stub.clone()));
    let state = orch.run("q", "").await.unwrap();

    let skeptic = &state.openings[&Role::Skeptic];
    assert_eq!(skeptic["error"], "invalid_json_after_retry");
    assert_eq!(skeptic["raw"], "still prose");
    assert_eq!(skeptic["previous_raw"], "not json");
    assert_eq!(state.critiques.len(), 4);
    assert_eq!(state.trace.len(), 9);
}

// ── Backend errors abort the run ───────────────────────────────────

/// Fails every Critique call for one role.
struct CritiqueOutage {
    failing: Role,
}

#[async_trait]
impl LlmCaller for CritiqueOutage {
    fn name(&self) -> &str {
        "critique-outage"
    }

    async fn call(&self, system: &str, user: &str) -> Result<String, BackendError> {
        let role = role_of(system);
        if role == self.failing && phase_of(user) == Phase::Critique {
            return Err(BackendError::Timeout {
                backend: BackendKind::Remote,
                timeout_secs: 120,
            });
        }
        Ok(canned_reply(role).to_string())
    }
}

#[tokio::test]
async fn test_backend_error_in_critique_aborts_without_partial_state() {
    let orch = DebateOrchestrator::with_config(
        StructuredCaller::new(Arc::new(CritiqueOutage {
            failing: Role::Operator,
        })),
        DebateConfig {
            max_parallel_calls: 2,
            ..Default::default()
        },
    );

    let result: Result<DebateState, DebateError> = orch.run("q", "").await;
    match result {
        Err(DebateError::Call {
            phase,
            role,
            source,
        }) => {
            assert_eq!(phase, Phase::Critique);
            assert_eq!(role, Role::Operator);
            assert!(matches!(source, BackendError::Timeout { .. }));
        }
        other => panic!("expected a critique call failure, got {other:?}"),
    }
}

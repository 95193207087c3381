//! Debate orchestrator: drives the Opening → Critique → Verdict pipeline.
//!
//! Each phase fans its role calls out on a `JoinSet` (bounded by a
//! semaphore), waits for all of them, then records results in fixed role
//! order. The next phase starts only after that barrier.

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::packet;
use super::roles::{Role, RolePrompts};
use super::state::{DebateState, Phase, PhaseTracker, TransitionError};
use crate::caller::BackendError;
use crate::structured::{is_sentinel, RoleOutput, StructuredCaller};

/// Default number of role calls in flight per phase.
pub const DEFAULT_MAX_PARALLEL_CALLS: usize = 4;

/// Configuration for the debate orchestrator.
#[derive(Debug, Clone)]
pub struct DebateConfig {
    /// Upper bound on concurrent role calls within a phase. `1` runs sequentially.
    pub max_parallel_calls: usize,
    /// Log outputs that lack the keys their role instruction asks for.
    pub warn_on_missing_keys: bool,
}

impl Default for DebateConfig {
    fn default() -> Self {
        Self {
            max_parallel_calls: DEFAULT_MAX_PARALLEL_CALLS,
            warn_on_missing_keys: true,
        }
    }
}

/// Error from a debate run. Any error means there is no debate result.
#[derive(Debug, Error)]
pub enum DebateError {
    /// A role call raised a backend error that was not absorbed by fallback.
    #[error("{phase} call for {role} failed: {source}")]
    Call {
        phase: Phase,
        role: Role,
        source: BackendError,
    },

    /// A role task panicked or was cancelled before producing a result.
    #[error("{phase} task for {role} did not complete: {message}")]
    TaskFailed {
        phase: Phase,
        role: Role,
        message: String,
    },

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl DebateError {
    /// The backend error behind this failure, if any.
    pub fn backend_error(&self) -> Option<&BackendError> {
        match self {
            Self::Call { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Runs complete debates over an enforced caller.
///
/// One orchestrator can run many debates; each `run` owns its own
/// [`DebateState`] and never shares it.
pub struct DebateOrchestrator {
    caller: StructuredCaller,
    prompts: Arc<RolePrompts>,
    config: DebateConfig,
}

impl DebateOrchestrator {
    /// Create an orchestrator with default prompts and config.
    pub fn new(caller: StructuredCaller) -> Self {
        Self::with_config(caller, DebateConfig::default())
    }

    pub fn with_config(caller: StructuredCaller, config: DebateConfig) -> Self {
        Self {
            caller,
            prompts: Arc::new(RolePrompts::default()),
            config,
        }
    }

    /// Use a caller-supplied instruction table.
    pub fn with_prompts(mut self, prompts: RolePrompts) -> Self {
        self.prompts = Arc::new(prompts);
        self
    }

    pub fn config(&self) -> &DebateConfig {
        &self.config
    }

    /// Run one debate end-to-end.
    pub async fn run(&self, question: &str, context: &str) -> Result<DebateState, DebateError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("debate", %run_id, backend = self.caller.backend_name());
        self.run_inner(question, context).instrument(span).await
    }

    async fn run_inner(&self, question: &str, context: &str) -> Result<DebateState, DebateError> {
        let started = Instant::now();
        let mut state = DebateState::new(question, context);
        let mut tracker = PhaseTracker::new();
        info!(question_len = question.len(), context_len = context.len(), "debate started");

        for phase in Phase::ORDER {
            tracker.enter(phase)?;
            if let Some(entered) = tracker.transitions().last() {
                info!(
                    from = ?entered.from,
                    to = %entered.to,
                    at = %entered.timestamp.to_rfc3339(),
                    "phase entered"
                );
            }
            let user_prompt = match phase {
                Phase::Opening => packet::opening_prompt(question, context),
                Phase::Critique => packet::critique_prompt(question, context, &state.openings),
                Phase::Verdict => {
                    packet::verdict_prompt(question, context, &state.openings, &state.critiques)
                }
            };

            for (role, output) in self.run_phase(phase, user_prompt).await? {
                state.record(phase, role, output);
            }
            tracker.complete_current();
        }
        state.transitions = tracker.into_transitions();

        info!(
            trace_len = state.trace.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "debate complete"
        );
        Ok(state)
    }

    /// Dispatch every role of `phase` and join them. Results come back in fixed role order.
    async fn run_phase(
        &self,
        phase: Phase,
        user_prompt: String,
    ) -> Result<Vec<(Role, RoleOutput)>, DebateError> {
        let roles = phase.roles();
        let started = Instant::now();
        debug!(%phase, calls = roles.len(), "phase started");

        let sem = Arc::new(Semaphore::new(self.config.max_parallel_calls.max(1)));
        let user_prompt: Arc<str> = Arc::from(user_prompt);
        let mut join_set = JoinSet::new();

        for (idx, role) in roles.iter().copied().enumerate() {
            let caller = self.caller.clone();
            let sem = sem.clone();
            let system_prompt = self.prompts.system_prompt(role).to_string();
            let user_prompt = user_prompt.clone();

            join_set.spawn(async move {
                let _permit = sem.acquire().await.ok();
                let call_started = Instant::now();
                let result = caller.call_json(&system_prompt, &user_prompt).await;
                debug!(
                    %phase,
                    %role,
                    ok = result.is_ok(),
                    elapsed_ms = call_started.elapsed().as_millis() as u64,
                    "role call finished"
                );
                (idx, result)
            });
        }

        // Drain every task: in-flight calls are never cancelled.
        let mut slots: Vec<Option<Result<RoleOutput, BackendError>>> = vec![None; roles.len()];
        let mut task_failures = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((idx, result)) => slots[idx] = Some(result),
                Err(e) => {
                    warn!(%phase, error = %e, "role task did not complete");
                    task_failures.push(e.to_string());
                }
            }
        }

        let mut outputs = Vec::with_capacity(roles.len());
        for (role, slot) in roles.iter().copied().zip(slots) {
            match slot {
                Some(Ok(output)) => {
                    self.inspect_output(phase, role, &output);
                    outputs.push((role, output));
                }
                Some(Err(source)) => {
                    warn!(%phase, %role, error = %source, "backend call failed, aborting debate");
                    return Err(DebateError::Call {
                        phase,
                        role,
                        source,
                    });
                }
                None => {
                    return Err(DebateError::TaskFailed {
                        phase,
                        role,
                        message: task_failures
                            .first()
                            .cloned()
                            .unwrap_or_else(|| "task produced no result".to_string()),
                    });
                }
            }
        }

        info!(
            %phase,
            calls = outputs.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "phase complete"
        );
        Ok(outputs)
    }

    fn inspect_output(&self, phase: Phase, role: Role, output: &RoleOutput) {
        if is_sentinel(output) {
            warn!(%phase, %role, "role output is not valid JSON, recorded sentinel");
            return;
        }
        if self.config.warn_on_missing_keys {
            let missing = role.missing_keys(output);
            if !missing.is_empty() {
                warn!(%phase, %role, ?missing, "role output lacks expected keys");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caller::{BackendKind, LlmCaller};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Echo {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmCaller for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn call(&self, system: &str, _user: &str) -> Result<String, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let first_line = system.lines().next().unwrap_or_default();
            Ok(serde_json::json!({ "stance": first_line }).to_string())
        }
    }

    struct AlwaysDown;

    #[async_trait]
    impl LlmCaller for AlwaysDown {
        fn name(&self) -> &str {
            "down"
        }

        async fn call(&self, _system: &str, _user: &str) -> Result<String, BackendError> {
            Err(BackendError::transport(BackendKind::Local, "connection refused"))
        }
    }

    #[tokio::test]
    async fn test_full_run_records_every_call() {
        let echo = Arc::new(Echo {
            calls: AtomicUsize::new(0),
        });
        let orch = DebateOrchestrator::new(StructuredCaller::new(echo.clone()));

        let state = orch.run("Adopt Rust?", "team of 5").await.unwrap();
        assert_eq!(state.trace.len(), DebateState::expected_trace_len(4));
        assert_eq!(echo.calls.load(Ordering::SeqCst), 9);
        assert_eq!(state.openings[&Role::Operator]["stance"], "You are the Operator.");
        assert_eq!(state.verdict["stance"], "You are the Judge.");
    }

    #[tokio::test]
    async fn test_run_exposes_phase_transitions() {
        let echo = Arc::new(Echo {
            calls: AtomicUsize::new(0),
        });
        let orch = DebateOrchestrator::new(StructuredCaller::new(echo));

        let state = orch.run("q", "").await.unwrap();
        let steps: Vec<(Option<Phase>, Phase)> =
            state.transitions.iter().map(|t| (t.from, t.to)).collect();
        assert_eq!(
            steps,
            vec![
                (None, Phase::Opening),
                (Some(Phase::Opening), Phase::Critique),
                (Some(Phase::Critique), Phase::Verdict),
            ]
        );
        assert!(state
            .transitions
            .windows(2)
            .all(|w| w[0].timestamp <= w[1].timestamp));

        let value = serde_json::to_value(&state).unwrap();
        assert!(value.get("transitions").is_none());
    }

    #[tokio::test]
    async fn test_sequential_config_gives_same_order() {
        let echo = Arc::new(Echo {
            calls: AtomicUsize::new(0),
        });
        let config = DebateConfig {
            max_parallel_calls: 1,
            ..Default::default()
        };
        let orch = DebateOrchestrator::with_config(StructuredCaller::new(echo), config);

        let state = orch.run("q", "").await.unwrap();
        let roles: Vec<Role> = state.trace.iter().map(|e| e.role).collect();
        assert_eq!(&roles[..4], &Role::DEBATERS);
        assert_eq!(&roles[4..8], &Role::DEBATERS);
        assert_eq!(roles[8], Role::Judge);
    }

    #[tokio::test]
    async fn test_backend_error_aborts_in_opening() {
        let orch = DebateOrchestrator::new(StructuredCaller::new(Arc::new(AlwaysDown)));

        let err = orch.run("q", "").await.unwrap_err();
        match &err {
            DebateError::Call { phase, role, .. } => {
                assert_eq!(*phase, Phase::Opening);
                assert_eq!(*role, Role::Optimist);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.backend_error().map(|e| e.backend()), Some(BackendKind::Local));
    }

    #[tokio::test]
    async fn test_custom_prompts_reach_caller() {
        let echo = Arc::new(Echo {
            calls: AtomicUsize::new(0),
        });
        let orch = DebateOrchestrator::new(StructuredCaller::new(echo))
            .with_prompts(RolePrompts::default().with(Role::Judge, "Decide.\nJSON only."));

        let state = orch.run("q", "").await.unwrap();
        assert_eq!(state.verdict["stance"], "Decide.");
    }
}

//! Debate state machine: phases, transitions, and the run's aggregate state.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::roles::Role;
use crate::structured::RoleOutput;

/// Phase of a debate run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Every debater states a position independently.
    Opening,
    /// Every debater critiques the full set of openings.
    Critique,
    /// The Judge decides from openings and critiques.
    Verdict,
}

impl Phase {
    /// All phases in execution order.
    pub const ORDER: [Phase; 3] = [Phase::Opening, Phase::Critique, Phase::Verdict];

    /// The phase that follows this one, if any.
    pub fn next(self) -> Option<Phase> {
        match self {
            Self::Opening => Some(Self::Critique),
            Self::Critique => Some(Self::Verdict),
            Self::Verdict => None,
        }
    }

    /// Roles that speak in this phase.
    pub fn roles(self) -> &'static [Role] {
        match self {
            Self::Opening | Self::Critique => &Role::DEBATERS,
            Self::Verdict => &[Role::Judge],
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Opening => write!(f, "opening"),
            Self::Critique => write!(f, "critique"),
            Self::Verdict => write!(f, "verdict"),
        }
    }
}

/// A phase transition record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseTransition {
    /// Previous phase (`None` when the run starts).
    pub from: Option<Phase>,
    /// New phase.
    pub to: Phase,
    /// When the transition occurred.
    pub timestamp: DateTime<Utc>,
}

/// Error for invalid phase transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: Option<Phase>,
    pub to: Phase,
    pub reason: String,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let from = self
            .from
            .map(|p| p.to_string())
            .unwrap_or_else(|| "start".to_string());
        write!(f, "invalid transition {} → {}: {}", from, self.to, self.reason)
    }
}

impl std::error::Error for TransitionError {}

/// Tracks progress through `Opening → Critique → Verdict`.
///
/// Linear only: each phase is entered once, in order, and a phase cannot be
/// entered until the previous one has been marked complete.
#[derive(Debug, Clone, Default)]
pub struct PhaseTracker {
    current: Option<Phase>,
    current_complete: bool,
    transitions: Vec<PhaseTransition>,
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Phase currently running or last completed.
    pub fn current(&self) -> Option<Phase> {
        self.current
    }

    /// Enter `to`. Fails on skips, repeats, backward moves, or an unfinished predecessor.
    pub fn enter(&mut self, to: Phase) -> Result<(), TransitionError> {
        let expected = match self.current {
            None => Some(Phase::Opening),
            Some(phase) => phase.next(),
        };
        if expected != Some(to) {
            return Err(TransitionError {
                from: self.current,
                to,
                reason: match expected {
                    Some(next) => format!("expected {next}"),
                    None => "debate already reached its final phase".to_string(),
                },
            });
        }
        if self.current.is_some() && !self.current_complete {
            return Err(TransitionError {
                from: self.current,
                to,
                reason: "previous phase has not completed".to_string(),
            });
        }

        self.transitions.push(PhaseTransition {
            from: self.current,
            to,
            timestamp: Utc::now(),
        });
        self.current = Some(to);
        self.current_complete = false;
        Ok(())
    }

    /// Mark the current phase as complete (its join barrier has passed).
    pub fn complete_current(&mut self) {
        if self.current.is_some() {
            self.current_complete = true;
        }
    }

    /// Whether the Verdict phase has completed.
    pub fn is_finished(&self) -> bool {
        self.current == Some(Phase::Verdict) && self.current_complete
    }

    pub fn transitions(&self) -> &[PhaseTransition] {
        &self.transitions
    }

    /// Consume the tracker, keeping its transition log.
    pub fn into_transitions(self) -> Vec<PhaseTransition> {
        self.transitions
    }
}

/// One recorded call: which phase, which role, what it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub phase: Phase,
    pub role: Role,
    pub output: RoleOutput,
}

/// Aggregate result of one debate run.
///
/// Serialises as `{question, context, openings, critiques, verdict, trace}`.
/// Maps are keyed by role and iterate in fixed role order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DebateState {
    pub question: String,
    pub context: String,
    pub openings: BTreeMap<Role, RoleOutput>,
    pub critiques: BTreeMap<Role, RoleOutput>,
    pub verdict: RoleOutput,
    pub trace: Vec<TraceEntry>,
    /// Timestamped phase entries of the run. Not part of the serialised result.
    #[serde(skip)]
    pub transitions: Vec<PhaseTransition>,
}

impl DebateState {
    pub fn new(question: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            context: context.into(),
            ..Default::default()
        }
    }

    /// Store `output` for `role` in `phase` and append the trace entry.
    pub fn record(&mut self, phase: Phase, role: Role, output: RoleOutput) {
        match phase {
            Phase::Opening => {
                self.openings.insert(role, output.clone());
            }
            Phase::Critique => {
                self.critiques.insert(role, output.clone());
            }
            Phase::Verdict => self.verdict = output.clone(),
        }
        self.trace.push(TraceEntry {
            phase,
            role,
            output,
        });
    }

    /// Trace entries belonging to `phase`, in recorded order.
    pub fn trace_for(&self, phase: Phase) -> impl Iterator<Item = &TraceEntry> {
        self.trace.iter().filter(move |e| e.phase == phase)
    }

    /// Trace length of a completed run with `debaters` participants.
    pub fn expected_trace_len(debaters: usize) -> usize {
        2 * debaters + 1
    }

    /// Compact status line.
    pub fn status_line(&self) -> String {
        let decision = self
            .verdict
            .get("decision")
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        format!(
            "{} openings | {} critiques | {} trace entries | decision={}",
            self.openings.len(),
            self.critiques.len(),
            self.trace.len(),
            decision
        )
    }
}

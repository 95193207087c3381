//! Debate roles and their system instructions.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::structured::RoleOutput;

/// A debate persona, or the Judge that synthesises the verdict.
///
/// Declaration order is the fixed role ordering used for the trace and for
/// packet serialisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Argues for the most ambitious, beneficial option.
    Optimist,
    /// Argues against and exposes hidden risks.
    Skeptic,
    /// Makes the best option executable.
    Operator,
    /// Optimises for 6–24 months and minimal regret.
    LongTerm,
    /// Reads every output and decides. Verdict phase only.
    Judge,
}

impl Role {
    /// The debate participants, in fixed order.
    pub const DEBATERS: [Role; 4] = [Role::Optimist, Role::Skeptic, Role::Operator, Role::LongTerm];

    pub fn is_debater(self) -> bool {
        self != Role::Judge
    }

    /// Keys the role's instruction asks it to emit. Not enforced.
    pub fn expected_keys(self) -> &'static [&'static str] {
        match self {
            Self::Optimist => &["stance", "arguments", "assumptions", "questions"],
            Self::Skeptic => &["stance", "arguments", "assumptions", "questions", "risks"],
            Self::Operator => &["stance", "plan", "constraints", "questions"],
            Self::LongTerm => &[
                "stance",
                "long_term_effects",
                "regrets",
                "assumptions",
                "questions",
            ],
            Self::Judge => &[
                "decision",
                "why",
                "key_assumptions",
                "risks",
                "minority_report",
                "next_steps",
            ],
        }
    }

    /// Expected keys absent from `output`.
    pub fn missing_keys(self, output: &RoleOutput) -> Vec<&'static str> {
        self.expected_keys()
            .iter()
            .copied()
            .filter(|key| !output.contains_key(*key))
            .collect()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Optimist => write!(f, "Optimist"),
            Self::Skeptic => write!(f, "Skeptic"),
            Self::Operator => write!(f, "Operator"),
            Self::LongTerm => write!(f, "LongTerm"),
            Self::Judge => write!(f, "Judge"),
        }
    }
}

const OPTIMIST_PROMPT: &str = r#"You are the Optimist.
Your job is to argue FOR the most ambitious, beneficial option.

Rules:
- Output ONLY valid JSON. No markdown. No commentary.
- Be decisive; no hedging.
- Use 3–6 crisp bullets in arguments.
- Explicitly list assumptions.

Return JSON exactly matching:
{"stance": "...", "arguments": [...], "assumptions": [...], "questions": [...]}"#;

const SKEPTIC_PROMPT: &str = r#"You are the Skeptic.
Your job is to argue AGAINST the proposed direction and expose hidden risks.

Rules:
- Output ONLY valid JSON. No markdown. No commentary.
- Attack assumptions directly.
- Name failure modes.

Return JSON exactly matching:
{"stance": "...", "arguments": [...], "assumptions": [...], "questions": [...], "risks": [...]}"#;

const OPERATOR_PROMPT: &str = r#"You are the Operator.
Your job is to make the best option executable.

Rules:
- Output ONLY valid JSON. No markdown. No commentary.
- Provide concrete steps and constraints.
- Mention cost/time/effort when relevant.

Return JSON exactly matching:
{"stance": "...", "plan": [...], "constraints": [...], "questions": [...]}"#;

const LONG_TERM_PROMPT: &str = r#"You are the Long-term Thinker.
Your job is to optimize for 6–24 months and minimize regret.

Rules:
- Output ONLY valid JSON. No markdown. No commentary.
- Include second-order effects.
- Include what happens if the plan fails.

Return JSON exactly matching:
{"stance": "...", "long_term_effects": [...], "regrets": [...], "assumptions": [...], "questions": [...]}"#;

const JUDGE_PROMPT: &str = r#"You are the Judge.
You read all agent outputs and produce a final decision.

Rules:
- Output ONLY valid JSON. No markdown. No commentary.
- Choose one path, or a clear conditional rule.
- Include a minority report.

Return JSON exactly matching:
{
  "decision":"...",
  "why":[...],
  "key_assumptions":[...],
  "risks":[...],
  "minority_report":[...],
  "next_steps":[...]
}"#;

/// Immutable role → system instruction table.
///
/// Built once (usually via `Default`) and shared read-only by every call of
/// a run. Collaborators that supply their own wording use [`RolePrompts::with`]
/// before handing the table to the orchestrator.
#[derive(Debug, Clone)]
pub struct RolePrompts {
    prompts: HashMap<Role, String>,
}

impl Default for RolePrompts {
    fn default() -> Self {
        let prompts = [
            (Role::Optimist, OPTIMIST_PROMPT),
            (Role::Skeptic, SKEPTIC_PROMPT),
            (Role::Operator, OPERATOR_PROMPT),
            (Role::LongTerm, LONG_TERM_PROMPT),
            (Role::Judge, JUDGE_PROMPT),
        ]
        .into_iter()
        .map(|(role, text)| (role, text.to_string()))
        .collect();
        Self { prompts }
    }
}

impl RolePrompts {
    /// Replace one role's instruction.
    pub fn with(mut self, role: Role, prompt: impl Into<String>) -> Self {
        self.prompts.insert(role, prompt.into());
        self
    }

    /// System instruction for `role`.
    pub fn system_prompt(&self, role: Role) -> &str {
        // Every role is populated by `Default` and `with` only overwrites.
        self.prompts.get(&role).map(String::as_str).unwrap_or_default()
    }
}

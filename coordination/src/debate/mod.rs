//! Debate Orchestration: Opening / Critique / Verdict pipeline
//!
//! Four debaters and a Judge, driven through three strictly ordered phases.
//! Every call goes through the structured-output enforcer, so each role's
//! output is a JSON object even when the model misbehaves.
//!
//! # Debate Flow
//!
//! ```text
//! Opening   Optimist ┐
//!           Skeptic  ├─ concurrent, join barrier ──► openings packet
//!           Operator │
//!           LongTerm ┘
//!                                   │
//! Critique  (same four roles, each sees every opening) ──► critiques
//!                                   │
//! Verdict   Judge(openings + critiques) ──► verdict
//! ```
//!
//! A backend error in any call aborts the whole run. Malformed JSON never
//! does: it is recorded as a sentinel object and passed along.

pub mod orchestrator;
pub mod packet;
pub mod roles;
pub mod state;

pub use orchestrator::{DebateConfig, DebateError, DebateOrchestrator, DEFAULT_MAX_PARALLEL_CALLS};
pub use roles::{Role, RolePrompts};
pub use state::{DebateState, Phase, PhaseTracker, PhaseTransition, TraceEntry, TransitionError};

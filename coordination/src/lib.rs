//! Debate Coordination Library
//!
//! This library provides the deterministic half of the debate engine:
//! - The `LlmCaller` seam every backend implements, with a typed `BackendError`
//! - Structured output enforcement (JSON-object contract with one repair round-trip)
//! - The phase orchestrator that runs Opening → Critique → Verdict
//!
//! Network backends and provider routing live in the `debate-agents` crate;
//! nothing here performs I/O other than through an `LlmCaller`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use coordination::{DebateOrchestrator, StructuredCaller};
//!
//! let caller = StructuredCaller::new(router_output);
//! let state = DebateOrchestrator::new(caller)
//!     .run("Should we adopt microservices?", "")
//!     .await?;
//! println!("{}", state.status_line());
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod caller;
pub mod debate;
pub mod structured;

// Re-export key caller types
pub use caller::{BackendError, BackendKind, LlmCaller};

// Re-export key enforcement types
pub use structured::{RoleOutput, StructuredCaller, DEFAULT_REPAIR_BUDGET};

// Re-export key debate types
pub use debate::{
    DebateConfig, DebateError, DebateOrchestrator, DebateState, Phase, Role, RolePrompts,
    TraceEntry,
};

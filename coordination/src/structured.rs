//! Structured output enforcement: turns a text caller into a JSON-object caller.
//!
//! ```text
//! call(system, user) ──► parse ──ok(object)──► return
//!                          │
//!                          └─ not an object, budget left
//!                                 │
//!                                 ▼
//!              call(system, repair_prompt(previous text)) ──► parse ──► …
//!                                 │
//!                                 └─ budget exhausted ──► sentinel object
//! ```
//!
//! Malformed model output never becomes an error here. Backend errors from
//! the wrapped caller are passed through untouched.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::caller::{BackendError, LlmCaller};

/// A role's structured output: always a JSON object.
pub type RoleOutput = Map<String, Value>;

/// Sentinel `error` value after the repair budget is spent.
pub const INVALID_JSON_AFTER_RETRY: &str = "invalid_json_after_retry";
/// Sentinel `error` value when no repair was allowed.
pub const INVALID_JSON: &str = "invalid_json";

/// Default number of repair round-trips.
pub const DEFAULT_REPAIR_BUDGET: u32 = 1;

/// Parse `text` as a JSON object. Arrays, scalars and invalid JSON yield `None`.
pub fn parse_object(text: &str) -> Option<RoleOutput> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Build the user prompt for a repair round-trip.
pub fn repair_prompt(previous: &str) -> String {
    format!(
        "Your previous response was not valid JSON.\n\
         Return ONLY valid JSON (no markdown, no commentary).\n\
         Do not wrap in backticks.\n\n\
         Previous output:\n{previous}"
    )
}

/// Whether an output is the enforcer's failure sentinel.
pub fn is_sentinel(output: &RoleOutput) -> bool {
    matches!(
        output.get("error").and_then(Value::as_str),
        Some(INVALID_JSON_AFTER_RETRY) | Some(INVALID_JSON)
    )
}

fn sentinel(last: String, previous: Option<String>) -> RoleOutput {
    let mut out = Map::new();
    match previous {
        Some(previous) => {
            out.insert("error".into(), Value::from(INVALID_JSON_AFTER_RETRY));
            out.insert("raw".into(), Value::from(last));
            out.insert("previous_raw".into(), Value::from(previous));
        }
        None => {
            out.insert("error".into(), Value::from(INVALID_JSON));
            out.insert("raw".into(), Value::from(last));
        }
    }
    out
}

/// Wraps a caller so that every result is a JSON object.
#[derive(Clone)]
pub struct StructuredCaller {
    inner: Arc<dyn LlmCaller>,
    repair_budget: u32,
}

impl StructuredCaller {
    /// Wrap `inner` with the default single repair attempt.
    pub fn new(inner: Arc<dyn LlmCaller>) -> Self {
        Self {
            inner,
            repair_budget: DEFAULT_REPAIR_BUDGET,
        }
    }

    /// Override the number of repair round-trips.
    pub fn with_repair_budget(mut self, budget: u32) -> Self {
        self.repair_budget = budget;
        self
    }

    pub fn repair_budget(&self) -> u32 {
        self.repair_budget
    }

    /// Name of the wrapped caller.
    pub fn backend_name(&self) -> &str {
        self.inner.name()
    }

    /// Call the wrapped caller and return a JSON object.
    ///
    /// Issues at most `1 + repair_budget` calls. When every attempt fails to
    /// parse, returns the sentinel object carrying the last two raw texts.
    pub async fn call_json(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<RoleOutput, BackendError> {
        let mut raw = self.inner.call(system_prompt, user_prompt).await?;
        if let Some(parsed) = parse_object(&raw) {
            return Ok(parsed);
        }

        let mut previous = None;
        for attempt in 1..=self.repair_budget {
            debug!(
                backend = self.inner.name(),
                attempt,
                raw_len = raw.len(),
                "output is not a JSON object, requesting repair"
            );
            let repaired = self
                .inner
                .call(system_prompt, &repair_prompt(&raw))
                .await?;
            if let Some(parsed) = parse_object(&repaired) {
                return Ok(parsed);
            }
            previous = Some(std::mem::replace(&mut raw, repaired));
        }

        warn!(
            backend = self.inner.name(),
            repair_budget = self.repair_budget,
            "output still not a JSON object after repair, recording sentinel"
        );
        Ok(sentinel(raw, previous))
    }
}

//! Runtime for the debate engine: backend adapters, provider routing and
//! configuration. The orchestration itself lives in `coordination`.

pub mod config;
pub mod error;
pub mod providers;
pub mod router;

pub use config::{AgentsConfig, DebateSettings, OllamaConfig, OpenAiConfig};
pub use error::ConfigError;
pub use providers::{OllamaAdapter, OpenAiAdapter};
pub use router::{route, HybridCaller, ProviderRouter, ProviderSelection};

use coordination::{BackendError, LlmCaller};

/// System prompt of the connectivity check.
pub const WARMUP_SYSTEM_PROMPT: &str = "Return ONLY valid JSON.";
/// User prompt of the connectivity check.
pub const WARMUP_USER_PROMPT: &str = r#"{"warmup":true}"#;

/// One throwaway call so the first real phase does not pay for model loading.
pub async fn warmup(caller: &dyn LlmCaller) -> Result<(), BackendError> {
    let start = std::time::Instant::now();
    caller.call(WARMUP_SYSTEM_PROMPT, WARMUP_USER_PROMPT).await?;
    tracing::info!(
        backend = caller.name(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "warmup complete"
    );
    Ok(())
}

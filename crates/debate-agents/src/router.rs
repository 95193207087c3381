//! Provider Router
//!
//! Turns a provider selection into a single [`LlmCaller`].
//!
//! # Selection
//!
//! ```text
//! Selection | Composition
//! ----------|-------------------------------------------------------------
//! ollama    | local adapter, errors propagate
//! openai    | remote adapter, errors propagate
//! hybrid    | local once; on a fallback-eligible error → remote once
//! ```
//!
//! Resolution order: explicit value → configured value (`LLM_PROVIDER`,
//! config file) → `ollama`. Unknown values fail while the router is being
//! built, before any adapter exists.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use coordination::{BackendError, LlmCaller};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{AgentsConfig, ENV_PROVIDER};
use crate::error::ConfigError;
use crate::providers::{OllamaAdapter, OpenAiAdapter};

/// Which backend(s) serve a debate run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderSelection {
    /// Local model only (`"ollama"`).
    Local,
    /// Remote API only (`"openai"`).
    Remote,
    /// Local first, remote on failure (`"hybrid"`).
    Hybrid,
}

impl ProviderSelection {
    /// Resolve against the process environment.
    pub fn resolve(explicit: Option<&str>) -> Result<Self, ConfigError> {
        let configured = std::env::var(ENV_PROVIDER).ok();
        Self::resolve_from(explicit, configured.as_deref())
    }

    /// First non-blank of `explicit`, `configured`; `Local` when both are blank.
    pub fn resolve_from(explicit: Option<&str>, configured: Option<&str>) -> Result<Self, ConfigError> {
        [explicit, configured]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|value| !value.is_empty())
            .map_or(Ok(Self::Local), str::parse)
    }

    pub fn needs_local(self) -> bool {
        matches!(self, Self::Local | Self::Hybrid)
    }

    pub fn needs_remote(self) -> bool {
        matches!(self, Self::Remote | Self::Hybrid)
    }
}

impl FromStr for ProviderSelection {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Local),
            "openai" => Ok(Self::Remote),
            "hybrid" => Ok(Self::Hybrid),
            _ => Err(ConfigError::UnknownProvider(s.trim().to_string())),
        }
    }
}

impl fmt::Display for ProviderSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "ollama"),
            Self::Remote => write!(f, "openai"),
            Self::Hybrid => write!(f, "hybrid"),
        }
    }
}

/// Local-first caller with a single remote fallback.
///
/// The local backend is never retried; each backend is tried at most once
/// per call. Only errors whose [`BackendError::allows_fallback`] is true
/// reach the remote backend.
pub struct HybridCaller {
    local: Arc<dyn LlmCaller>,
    remote: Arc<dyn LlmCaller>,
}

impl HybridCaller {
    pub fn new(local: Arc<dyn LlmCaller>, remote: Arc<dyn LlmCaller>) -> Self {
        Self { local, remote }
    }
}

#[async_trait]
impl LlmCaller for HybridCaller {
    fn name(&self) -> &str {
        "hybrid"
    }

    async fn call(&self, system_prompt: &str, user_prompt: &str) -> Result<String, BackendError> {
        match self.local.call(system_prompt, user_prompt).await {
            Ok(text) => Ok(text),
            Err(err) if err.allows_fallback() => {
                warn!(
                    local = self.local.name(),
                    remote = self.remote.name(),
                    error = %err,
                    "local backend failed, falling back to remote"
                );
                self.remote.call(system_prompt, user_prompt).await
            }
            Err(err) => Err(err),
        }
    }
}

/// Compose already-built callers according to `selection`.
pub fn route(
    selection: ProviderSelection,
    local: Arc<dyn LlmCaller>,
    remote: Arc<dyn LlmCaller>,
) -> Arc<dyn LlmCaller> {
    match selection {
        ProviderSelection::Local => local,
        ProviderSelection::Remote => remote,
        ProviderSelection::Hybrid => Arc::new(HybridCaller::new(local, remote)),
    }
}

/// Builds the caller for a run from configuration.
pub struct ProviderRouter;

impl ProviderRouter {
    /// Resolve the selection from `config.provider` and build only the adapters it needs.
    pub fn from_config(config: &AgentsConfig) -> Result<Arc<dyn LlmCaller>, ConfigError> {
        let selection = ProviderSelection::resolve_from(None, config.provider.as_deref())?;
        Self::build(selection, config)
    }

    /// Build the caller for an already-resolved selection.
    pub fn build(
        selection: ProviderSelection,
        config: &AgentsConfig,
    ) -> Result<Arc<dyn LlmCaller>, ConfigError> {
        let local = if selection.needs_local() {
            Some(Arc::new(OllamaAdapter::new(&config.ollama)?) as Arc<dyn LlmCaller>)
        } else {
            None
        };
        let remote = if selection.needs_remote() {
            let adapter = OpenAiAdapter::new(&config.openai)?;
            if !adapter.has_api_key() {
                warn!("remote backend selected but no API key is configured; its calls will fail");
            }
            Some(Arc::new(adapter) as Arc<dyn LlmCaller>)
        } else {
            None
        };

        info!(
            provider = %selection,
            ollama_model = local.as_ref().map(|_| config.ollama.model.as_str()),
            openai_model = remote.as_ref().map(|_| config.openai.model.as_str()),
            "provider router built"
        );

        Ok(match (selection, local, remote) {
            (ProviderSelection::Hybrid, Some(local), Some(remote)) => {
                Arc::new(HybridCaller::new(local, remote)) as Arc<dyn LlmCaller>
            }
            (_, Some(local), None) => local,
            (_, None, Some(remote)) => remote,
            // `needs_local`/`needs_remote` guarantee at least one adapter.
            (_, local, remote) => {
                return Err(ConfigError::invalid(
                    "provider",
                    format!(
                        "selection {selection} produced local={} remote={}",
                        local.is_some(),
                        remote.is_some()
                    ),
                ))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_supported_names_case_insensitively() {
        assert_eq!("ollama".parse::<ProviderSelection>().unwrap(), ProviderSelection::Local);
        assert_eq!(" OpenAI ".parse::<ProviderSelection>().unwrap(), ProviderSelection::Remote);
        assert_eq!("Hybrid".parse::<ProviderSelection>().unwrap(), ProviderSelection::Hybrid);
    }

    #[test]
    fn test_unknown_name_is_config_error() {
        let err = "foobar".parse::<ProviderSelection>().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProvider(ref s) if s == "foobar"));
    }

    #[test]
    fn test_resolution_order() {
        use ProviderSelection::*;
        assert_eq!(ProviderSelection::resolve_from(Some("openai"), Some("hybrid")).unwrap(), Remote);
        assert_eq!(ProviderSelection::resolve_from(None, Some("hybrid")).unwrap(), Hybrid);
        assert_eq!(ProviderSelection::resolve_from(Some("  "), Some("hybrid")).unwrap(), Hybrid);
        assert_eq!(ProviderSelection::resolve_from(None, None).unwrap(), Local);
        assert_eq!(ProviderSelection::resolve_from(Some(""), Some("")).unwrap(), Local);
        assert!(ProviderSelection::resolve_from(Some("foobar"), Some("ollama")).is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for sel in [ProviderSelection::Local, ProviderSelection::Remote, ProviderSelection::Hybrid] {
            assert_eq!(sel.to_string().parse::<ProviderSelection>().unwrap(), sel);
        }
    }

    #[test]
    fn test_build_picks_adapters_by_selection() {
        let config = AgentsConfig::default();
        let local = ProviderRouter::build(ProviderSelection::Local, &config).unwrap();
        assert_eq!(local.name(), "ollama");
        let remote = ProviderRouter::build(ProviderSelection::Remote, &config).unwrap();
        assert_eq!(remote.name(), "openai");
        let hybrid = ProviderRouter::build(ProviderSelection::Hybrid, &config).unwrap();
        assert_eq!(hybrid.name(), "hybrid");
    }

    #[test]
    fn test_from_config_rejects_unknown_provider() {
        let config = AgentsConfig {
            provider: Some("foobar".into()),
            ..AgentsConfig::default()
        };
        assert!(matches!(
            ProviderRouter::from_config(&config),
            Err(ConfigError::UnknownProvider(_))
        ));
    }
}

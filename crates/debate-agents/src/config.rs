//! Runtime configuration for backends and debate runs.
//!
//! ## Precedence (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Optional TOML file (`--config`)
//! 3. Environment variables (table below)
//! 4. CLI flags, applied by the binary
//!
//! | Variable              | Setting             | Default                     |
//! |-----------------------|---------------------|-----------------------------|
//! | `LLM_PROVIDER`        | provider selection  | `ollama`                    |
//! | `OLLAMA_MODEL`        | local model         | `llama3.2:latest`           |
//! | `OLLAMA_URL`          | local base URL      | `http://localhost:11434`    |
//! | `OLLAMA_TIMEOUT_SECS` | local timeout       | 60                          |
//! | `OPENAI_MODEL`        | remote model        | `gpt-5.2`                   |
//! | `OPENAI_BASE_URL`     | remote base URL     | `https://api.openai.com/v1` |
//! | `OPENAI_TIMEOUT_SECS` | remote timeout      | 120                         |
//! | `OPENAI_API_KEY`      | remote credential   | unset                       |
//!
//! Each backend's settings are independent; nothing set for one is read by
//! the other.

use std::path::Path;

use coordination::debate::{DebateConfig, DEFAULT_MAX_PARALLEL_CALLS};
use coordination::DEFAULT_REPAIR_BUDGET;
use serde::Deserialize;

use crate::error::ConfigError;

pub const ENV_PROVIDER: &str = "LLM_PROVIDER";
pub const ENV_OLLAMA_MODEL: &str = "OLLAMA_MODEL";
pub const ENV_OLLAMA_URL: &str = "OLLAMA_URL";
pub const ENV_OLLAMA_TIMEOUT: &str = "OLLAMA_TIMEOUT_SECS";
pub const ENV_OPENAI_MODEL: &str = "OPENAI_MODEL";
pub const ENV_OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";
pub const ENV_OPENAI_TIMEOUT: &str = "OPENAI_TIMEOUT_SECS";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";

const DEFAULT_OLLAMA_MODEL: &str = "llama3.2:latest";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_OLLAMA_TIMEOUT_SECS: u64 = 60;
const DEFAULT_OPENAI_MODEL: &str = "gpt-5.2";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OPENAI_TIMEOUT_SECS: u64 = 120;

/// Local Ollama backend settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
    /// Sent as `options.temperature` when set.
    pub temperature: Option<f64>,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_OLLAMA_MODEL.to_string(),
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            timeout_secs: DEFAULT_OLLAMA_TIMEOUT_SECS,
            temperature: None,
        }
    }
}

/// Remote OpenAI-compatible backend settings.
#[derive(Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub temperature: Option<f64>,
    /// Usually left out of files and supplied through `OPENAI_API_KEY`.
    pub api_key: Option<String>,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_OPENAI_MODEL.to_string(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            timeout_secs: DEFAULT_OPENAI_TIMEOUT_SECS,
            temperature: None,
            api_key: None,
        }
    }
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Debate run settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DebateSettings {
    /// Concurrent role calls per phase; 1 runs them one at a time.
    pub max_parallel_calls: usize,
    /// JSON repair round-trips per call.
    pub repair_budget: u32,
    pub warn_on_missing_keys: bool,
}

impl Default for DebateSettings {
    fn default() -> Self {
        Self {
            max_parallel_calls: DEFAULT_MAX_PARALLEL_CALLS,
            repair_budget: DEFAULT_REPAIR_BUDGET,
            warn_on_missing_keys: true,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    /// `"ollama"`, `"openai"` or `"hybrid"`. Unset means `ollama`.
    pub provider: Option<String>,
    pub ollama: OllamaConfig,
    pub openai: OpenAiConfig,
    pub debate: DebateSettings,
}

impl AgentsConfig {
    /// Defaults, then the optional file, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Parse a TOML file. Missing tables and keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlay the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay values from `lookup`; empty values are ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(provider) = get(ENV_PROVIDER) {
            self.provider = Some(provider);
        }

        if let Some(model) = get(ENV_OLLAMA_MODEL) {
            self.ollama.model = model;
        }
        if let Some(url) = get(ENV_OLLAMA_URL) {
            self.ollama.base_url = url;
        }
        if let Some(secs) = get(ENV_OLLAMA_TIMEOUT) {
            self.ollama.timeout_secs = parse_secs(ENV_OLLAMA_TIMEOUT, &secs)?;
        }

        if let Some(model) = get(ENV_OPENAI_MODEL) {
            self.openai.model = model;
        }
        if let Some(url) = get(ENV_OPENAI_BASE_URL) {
            self.openai.base_url = url;
        }
        if let Some(secs) = get(ENV_OPENAI_TIMEOUT) {
            self.openai.timeout_secs = parse_secs(ENV_OPENAI_TIMEOUT, &secs)?;
        }
        if let Some(key) = get(ENV_OPENAI_API_KEY) {
            self.openai.api_key = Some(key);
        }
        Ok(())
    }

    /// Validate every section; the first problem wins.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_backend("ollama", &self.ollama.model, &self.ollama.base_url, self.ollama.timeout_secs)?;
        validate_backend("openai", &self.openai.model, &self.openai.base_url, self.openai.timeout_secs)?;
        for (key, temperature) in [
            ("ollama.temperature", self.ollama.temperature),
            ("openai.temperature", self.openai.temperature),
        ] {
            if let Some(t) = temperature {
                if !(0.0..=2.0).contains(&t) {
                    return Err(ConfigError::invalid(key, format!("must be in [0, 2], got {t}")));
                }
            }
        }
        if self.debate.max_parallel_calls == 0 {
            return Err(ConfigError::invalid("debate.max_parallel_calls", "must be > 0"));
        }
        Ok(())
    }

    /// Orchestrator settings derived from this config.
    pub fn debate_config(&self) -> DebateConfig {
        DebateConfig {
            max_parallel_calls: self.debate.max_parallel_calls,
            warn_on_missing_keys: self.debate.warn_on_missing_keys,
        }
    }
}

fn parse_secs(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::invalid(key, format!("'{value}' is not a whole number of seconds ({e})")))
}

fn validate_backend(section: &str, model: &str, base_url: &str, timeout_secs: u64) -> Result<(), ConfigError> {
    if model.trim().is_empty() {
        return Err(ConfigError::invalid(format!("{section}.model"), "must not be empty"));
    }
    let url = base_url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::invalid(
            format!("{section}.base_url"),
            format!("'{url}' must start with http:// or https://"),
        ));
    }
    if timeout_secs == 0 {
        return Err(ConfigError::invalid(format!("{section}.timeout_secs"), "must be > 0"));
    }
    Ok(())
}

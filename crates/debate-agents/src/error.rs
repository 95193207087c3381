//! Configuration error taxonomy.
//!
//! Every variant is raised while the runtime is being assembled, before any
//! backend is contacted. None of them is retriable and none is ever absorbed
//! by the hybrid router.

use std::path::PathBuf;

use coordination::BackendKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Provider selection string is not one of the supported values.
    #[error("Unknown provider '{0}'. Expected one of: ollama, openai, hybrid.")]
    UnknownProvider(String),

    /// A setting has an unusable value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// The config file could not be read.
    #[error("Cannot read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this schema.
    #[error("Cannot parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// The HTTP client for a backend could not be constructed.
    #[error("Cannot build HTTP client for {backend} backend: {message}")]
    HttpClient {
        backend: BackendKind,
        message: String,
    },
}

impl ConfigError {
    /// Build an `InvalidValue` variant conveniently.
    pub fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_provider_lists_choices() {
        let err = ConfigError::UnknownProvider("foobar".into());
        assert_eq!(
            err.to_string(),
            "Unknown provider 'foobar'. Expected one of: ollama, openai, hybrid."
        );
    }

    #[test]
    fn test_invalid_value_names_key() {
        let err = ConfigError::invalid("OLLAMA_TIMEOUT_SECS", "must be > 0");
        assert_eq!(err.to_string(), "Invalid value for OLLAMA_TIMEOUT_SECS: must be > 0");
    }
}

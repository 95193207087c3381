//! Caller seam: the uniform `(system_prompt, user_prompt) → text` contract.
//!
//! Every text-generation backend, the provider router, and test stubs all
//! implement [`LlmCaller`]. Failures are reported through [`BackendError`],
//! never as empty strings, so fallback and abort decisions can be made on
//! the error variant alone.
//!
//! ## Fallback classification
//!
//! | Variant           | Cause                                   | Allows fallback |
//! |-------------------|-----------------------------------------|-----------------|
//! | Transport         | connection refused, reset, DNS, TLS      | yes             |
//! | Timeout           | request exceeded the configured timeout  | yes             |
//! | Status            | non-success HTTP status                  | yes             |
//! | MalformedEnvelope | response body not the expected shape     | yes             |
//! | EmptyContent      | success envelope without usable text     | yes             |
//! | MissingCredential | backend needs a key that is not set      | yes             |
//! | InvalidRequest    | request could not be constructed         | no              |

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identity of a text-generation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Local model service (Ollama).
    Local,
    /// Remote API service (OpenAI-compatible).
    Remote,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

/// Failure raised by a backend call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("{backend} backend transport failure: {message}")]
    Transport {
        backend: BackendKind,
        message: String,
    },

    #[error("{backend} backend timed out after {timeout_secs}s")]
    Timeout {
        backend: BackendKind,
        timeout_secs: u64,
    },

    #[error("{backend} backend returned HTTP {status}: {body}")]
    Status {
        backend: BackendKind,
        status: u16,
        body: String,
    },

    #[error("{backend} backend response could not be decoded: {message}")]
    MalformedEnvelope {
        backend: BackendKind,
        message: String,
    },

    #[error("{backend} backend returned no usable content ({detail})")]
    EmptyContent {
        backend: BackendKind,
        detail: String,
    },

    #[error("{backend} backend credential not configured: {variable}")]
    MissingCredential {
        backend: BackendKind,
        variable: String,
    },

    #[error("{backend} backend request could not be built: {message}")]
    InvalidRequest {
        backend: BackendKind,
        message: String,
    },
}

impl BackendError {
    /// Shorthand for a transport failure.
    pub fn transport(backend: BackendKind, message: impl Into<String>) -> Self {
        Self::Transport {
            backend,
            message: message.into(),
        }
    }

    /// Shorthand for a success response with nothing usable in it.
    pub fn empty(backend: BackendKind, detail: impl Into<String>) -> Self {
        Self::EmptyContent {
            backend,
            detail: detail.into(),
        }
    }

    /// Backend that raised this error.
    pub fn backend(&self) -> BackendKind {
        match self {
            Self::Transport { backend, .. }
            | Self::Timeout { backend, .. }
            | Self::Status { backend, .. }
            | Self::MalformedEnvelope { backend, .. }
            | Self::EmptyContent { backend, .. }
            | Self::MissingCredential { backend, .. }
            | Self::InvalidRequest { backend, .. } => *backend,
        }
    }

    /// Whether a hybrid router may answer this failure with the secondary backend.
    ///
    /// Request-construction failures point at a local bug, not at an
    /// unavailable service, so they are surfaced instead of masked.
    pub fn allows_fallback(&self) -> bool {
        !matches!(self, Self::InvalidRequest { .. })
    }
}

/// A text-producing call: `(system_prompt, user_prompt) → text`.
#[async_trait]
pub trait LlmCaller: Send + Sync {
    /// Short name used in logs (e.g. `"ollama"`, `"hybrid"`).
    fn name(&self) -> &str;

    /// Issue one call. Implementations never return an empty string on success.
    async fn call(&self, system_prompt: &str, user_prompt: &str) -> Result<String, BackendError>;
}

#[async_trait]
impl<T: LlmCaller + ?Sized> LlmCaller for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn call(&self, system_prompt: &str, user_prompt: &str) -> Result<String, BackendError> {
        (**self).call(system_prompt, user_prompt).await
    }
}

//! Backend adapters, one per text-generation service.
//!
//! Each adapter owns exactly one wire contract: building the request body,
//! issuing the HTTP call under its own timeout, and pulling the generated
//! text out of the response envelope. Every failure is a typed
//! [`BackendError`]; an adapter never returns an empty string.

use std::time::Duration;

use coordination::{BackendError, BackendKind};
use reqwest::{Client, Response};
use serde_json::Value;

use crate::error::ConfigError;

pub mod ollama;
pub mod openai;

pub use ollama::OllamaAdapter;
pub use openai::OpenAiAdapter;

/// Appended to every system prompt to reduce formatting drift.
pub const JSON_ONLY_SUFFIX: &str = "\n\nReturn ONLY valid JSON.";

/// Longest error body kept in a `Status` error.
const MAX_ERROR_BODY: usize = 512;

/// Build an HTTP client with the adapter's request timeout.
pub(crate) fn http_client(backend: BackendKind, timeout: Duration) -> Result<Client, ConfigError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ConfigError::HttpClient {
            backend,
            message: e.to_string(),
        })
}

/// Map a reqwest failure onto the backend error taxonomy.
pub(crate) fn classify_send_error(
    backend: BackendKind,
    base_url: &str,
    timeout: Duration,
    err: reqwest::Error,
) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout {
            backend,
            timeout_secs: timeout.as_secs(),
        }
    } else if err.is_builder() {
        BackendError::InvalidRequest {
            backend,
            message: err.to_string(),
        }
    } else if err.is_connect() {
        BackendError::transport(backend, format!("cannot connect to {base_url}: {err}"))
    } else {
        BackendError::transport(backend, err.to_string())
    }
}

/// Check the status and decode the body as JSON.
pub(crate) async fn read_json_envelope(
    backend: BackendKind,
    base_url: &str,
    timeout: Duration,
    response: Response,
) -> Result<Value, BackendError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| classify_send_error(backend, base_url, timeout, e))?;

    if !status.is_success() {
        return Err(BackendError::Status {
            backend,
            status: status.as_u16(),
            body: truncate(&body, MAX_ERROR_BODY),
        });
    }

    serde_json::from_str(&body).map_err(|e| BackendError::MalformedEnvelope {
        backend,
        message: e.to_string(),
    })
}

/// Top-level keys of an envelope, for diagnostics on empty content.
pub(crate) fn top_level_keys(envelope: &Value) -> String {
    match envelope.as_object() {
        Some(map) => format!("top-level keys: {:?}", map.keys().collect::<Vec<_>>()),
        None => "envelope is not an object".to_string(),
    }
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

/// Strip trailing slashes so paths can be appended.
pub(crate) fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

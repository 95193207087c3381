//! Ollama adapter for local models via `POST /api/chat`.
//!
//! Ollama runs models on the local machine, typically at
//! `http://localhost:11434`. No API key is involved. Streaming is disabled
//! so one request yields one complete message.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use coordination::{BackendError, BackendKind, LlmCaller};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use super::{
    classify_send_error, http_client, normalize_base_url, read_json_envelope, top_level_keys,
    JSON_ONLY_SUFFIX,
};
use crate::config::OllamaConfig;
use crate::error::ConfigError;

const BACKEND: BackendKind = BackendKind::Local;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    stream: bool,
    messages: [ChatMessage; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerationOptions>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct GenerationOptions {
    temperature: f64,
}

/// Calls a local Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaAdapter {
    base_url: String,
    model: String,
    timeout: Duration,
    temperature: Option<f64>,
    client: Client,
}

impl OllamaAdapter {
    pub fn new(config: &OllamaConfig) -> Result<Self, ConfigError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        Ok(Self {
            base_url: normalize_base_url(&config.base_url),
            model: config.model.clone(),
            timeout,
            temperature: config.temperature,
            client: http_client(BACKEND, timeout)?,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    fn request<'a>(&'a self, system_prompt: &str, user_prompt: &str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            stream: false,
            messages: [
                ChatMessage {
                    role: "system",
                    content: format!("{}{}", system_prompt.trim(), JSON_ONLY_SUFFIX),
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt.trim().to_string(),
                },
            ],
            options: self
                .temperature
                .map(|temperature| GenerationOptions { temperature }),
        }
    }
}

/// Pull `message.content` out of an `/api/chat` envelope.
fn extract_content(envelope: &Value) -> Result<String, BackendError> {
    let content = envelope
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if content.is_empty() {
        return Err(BackendError::empty(BACKEND, top_level_keys(envelope)));
    }
    Ok(content.to_string())
}

impl OllamaAdapter {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, BackendError> {
        let request = self.request(system_prompt, user_prompt);
        tracing::debug!(
            model = %self.model,
            system_chars = request.messages[0].content.len(),
            user_chars = request.messages[1].content.len(),
            "ollama request"
        );

        let start = Instant::now();
        let response = self
            .client
            .post(self.chat_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_send_error(BACKEND, &self.base_url, self.timeout, e))?;

        let envelope = read_json_envelope(BACKEND, &self.base_url, self.timeout, response).await?;
        let content = extract_content(&envelope)?;

        tracing::info!(
            model = %self.model,
            elapsed_ms = start.elapsed().as_millis() as u64,
            chars = content.len(),
            "ollama response received"
        );
        Ok(content)
    }
}

#[async_trait]
impl LlmCaller for OllamaAdapter {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn call(&self, system_prompt: &str, user_prompt: &str) -> Result<String, BackendError> {
        self.complete(system_prompt, user_prompt)
            .await
            .inspect_err(|e| tracing::warn!(model = %self.model, error = %e, "ollama call failed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn adapter() -> OllamaAdapter {
        OllamaAdapter::new(&OllamaConfig {
            base_url: "http://localhost:11434/".into(),
            temperature: Some(0.2),
            ..OllamaConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_request_body_matches_chat_contract() {
        let adapter = adapter();
        let body = serde_json::to_value(adapter.request("  Be terse.  ", "\nQ?\n")).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "llama3.2:latest",
                "stream": false,
                "messages": [
                    {"role": "system", "content": "Be terse.\n\nReturn ONLY valid JSON."},
                    {"role": "user", "content": "Q?"},
                ],
                "options": {"temperature": 0.2},
            })
        );
        assert_eq!(adapter.chat_url(), "http://localhost:11434/api/chat");
    }

    #[test]
    fn test_options_omitted_without_temperature() {
        let adapter = OllamaAdapter::new(&OllamaConfig::default()).unwrap();
        let body = serde_json::to_value(adapter.request("s", "u")).unwrap();
        assert!(body.get("options").is_none());
    }

    #[test]
    fn test_content_is_trimmed() {
        let envelope = json!({"message": {"role": "assistant", "content": "  {\"a\":1}\n"}});
        assert_eq!(extract_content(&envelope).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn test_blank_content_is_an_error() {
        let envelope = json!({"model": "llama3.2", "message": {"content": "   "}, "done": true});
        let err = extract_content(&envelope).unwrap_err();
        assert!(matches!(err, BackendError::EmptyContent { backend: BackendKind::Local, .. }));
        assert!(err.to_string().contains("done"));
    }
}

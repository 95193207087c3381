//! OpenAI-compatible adapter for `POST {base_url}/chat/completions`.
//!
//! Works against api.openai.com and any server exposing the same Chat
//! Completions contract. The API key is checked at call time so that a
//! hybrid router can still be built on machines without one.

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
use crate::config::{OpenAiConfig, ENV_OPENAI_API_KEY};
use crate::error::ConfigError;

const BACKEND: BackendKind = BackendKind::Remote;

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: [CompletionMessage; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Serialize)]
struct CompletionMessage {
    role: &'static str,
    content: String,
}

/// Calls a remote Chat Completions API.
#[derive(Clone)]
pub struct OpenAiAdapter {
    base_url: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
    temperature: Option<f64>,
    client: Client,
}

impl std::fmt::Debug for OpenAiAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiAdapter")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl OpenAiAdapter {
    pub fn new(config: &OpenAiConfig) -> Result<Self, ConfigError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        Ok(Self {
            base_url: normalize_base_url(&config.base_url),
            model: config.model.clone(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            timeout,
            temperature: config.temperature,
            client: http_client(BACKEND, timeout)?,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn request<'a>(&'a self, system_prompt: &str, user_prompt: &str) -> CompletionRequest<'a> {
        CompletionRequest {
            model: &self.model,
            messages: [
                CompletionMessage {
                    role: "system",
                    content: format!("{system_prompt}{JSON_ONLY_SUFFIX}"),
                },
                CompletionMessage {
                    role: "user",
                    content: user_prompt.to_string(),
                },
            ],
            temperature: self.temperature,
        }
    }
}

/// Pull `choices[0].message.content` out of a completion envelope.
fn extract_content(envelope: &Value) -> Result<String, BackendError> {
    let choice = &envelope["choices"][0];
    let content = choice["message"]["content"]
        .as_str()
        .map(str::trim)
        .unwrap_or_default();
    if content.is_empty() {
        let detail = match choice["finish_reason"].as_str() {
            Some(reason) => format!("finish_reason: {reason}"),
            None => top_level_keys(envelope),
        };
        return Err(BackendError::empty(BACKEND, detail));
    }
    Ok(content.to_string())
}

impl OpenAiAdapter {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, BackendError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| BackendError::MissingCredential {
                backend: BACKEND,
                variable: ENV_OPENAI_API_KEY.to_string(),
            })?;

        let request = self.request(system_prompt, user_prompt);
        tracing::debug!(
            model = %self.model,
            system_chars = request.messages[0].content.len(),
            user_chars = request.messages[1].content.len(),
            "openai request"
        );

        let start = Instant::now();
        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(api_key)
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
            "openai response received"
        );
        Ok(content)
    }
}

#[async_trait]
impl LlmCaller for OpenAiAdapter {
    fn name(&self) -> &str {
        "openai"
    }

    async fn call(&self, system_prompt: &str, user_prompt: &str) -> Result<String, BackendError> {
        self.complete(system_prompt, user_prompt)
            .await
            .inspect_err(|e| tracing::warn!(model = %self.model, error = %e, "openai call failed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_body_matches_completions_contract() {
        let adapter = OpenAiAdapter::new(&OpenAiConfig::default()).unwrap();
        let body = serde_json::to_value(adapter.request("Judge.", "packet")).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "gpt-5.2",
                "messages": [
                    {"role": "system", "content": "Judge.\n\nReturn ONLY valid JSON."},
                    {"role": "user", "content": "packet"},
                ],
            })
        );
        assert_eq!(adapter.completions_url(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_blank_key_counts_as_missing() {
        let adapter = OpenAiAdapter::new(&OpenAiConfig {
            api_key: Some("  ".into()),
            ..OpenAiConfig::default()
        })
        .unwrap();
        assert!(!adapter.has_api_key());
    }

    #[test]
    fn test_debug_output_redacts_key() {
        let adapter = OpenAiAdapter::new(&OpenAiConfig {
            api_key: Some("sk-secret".into()),
            ..OpenAiConfig::default()
        })
        .unwrap();
        let printed = format!("{adapter:?}");
        assert!(!printed.contains("sk-secret"));
        assert!(printed.contains("<redacted>"));
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_any_request() {
        let adapter = OpenAiAdapter::new(&OpenAiConfig {
            api_key: None,
            // Unroutable: a request here would fail differently.
            base_url: "http://127.0.0.1:9".into(),
            ..OpenAiConfig::default()
        })
        .unwrap();
        let err = adapter.call("s", "u").await.unwrap_err();
        assert!(matches!(err, BackendError::MissingCredential { .. }));
    }

    #[test]
    fn test_empty_choice_reports_finish_reason() {
        let envelope = json!({"choices": [{"message": {"content": ""}, "finish_reason": "length"}]});
        let err = extract_content(&envelope).unwrap_err();
        assert!(err.to_string().contains("finish_reason: length"));

        let envelope = json!({"error": {"message": "overloaded"}});
        assert!(extract_content(&envelope).is_err());
    }

    #[test]
    fn test_content_is_trimmed() {
        let envelope = json!({"choices": [{"message": {"role": "assistant", "content": " OK \n"}}]});
        assert_eq!(extract_content(&envelope).unwrap(), "OK");
    }
}

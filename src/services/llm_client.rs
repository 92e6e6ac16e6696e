use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{error, info};

use crate::services::analysis::types::ModelEndpoint;

pub type LlmBoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub purpose: String,
}

pub trait CompletionClient: Send + Sync {
    fn complete<'a>(&'a self, request: CompletionRequest) -> LlmBoxFuture<'a, Result<String, String>>;
}

/// Chat-completions client for OpenAI-compatible servers (OpenAI, Ollama, vLLM).
#[derive(Clone)]
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    endpoint: ModelEndpoint,
}

impl OpenAiCompatClient {
    pub fn new(endpoint: ModelEndpoint) -> Result<Self, String> {
        if endpoint.base_url.trim().is_empty() {
            return Err("LLM base url is not configured".to_string());
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(endpoint.timeout_seconds.max(1)))
            .build()
            .map_err(|e| format!("build http client failed: {e}"))?;
        Ok(Self { client, endpoint })
    }

    async fn send(&self, request: CompletionRequest) -> Result<String, String> {
        let payload = build_payload(&self.endpoint, &request);
        let url = format!(
            "{}/chat/completions",
            self.endpoint.base_url.trim_end_matches('/')
        );

        info!(
            "[LLM] request start: purpose={}, model={}, baseURL={}",
            request.purpose, self.endpoint.model, self.endpoint.base_url
        );

        let mut builder = self.client.post(&url).json(&payload);
        if !self.endpoint.api_key.trim().is_empty() {
            builder = builder.bearer_auth(&self.endpoint.api_key);
        }
        let resp = builder.send().await.map_err(|e| e.to_string())?;

        let status = resp.status();
        let raw = resp.text().await.map_err(|e| e.to_string())?;
        if !status.is_success() {
            let err_text = truncate_log(&raw, 2000);
            error!("[LLM] request failed: status={}, error={}", status, err_text);
            return Err(format!("status {}: {}", status, err_text));
        }

        let text = parse_completion_text(&raw)?;
        info!(
            "[LLM] request done: purpose={}, chars={}",
            request.purpose,
            text.chars().count()
        );
        Ok(text)
    }
}

impl CompletionClient for OpenAiCompatClient {
    fn complete<'a>(&'a self, request: CompletionRequest) -> LlmBoxFuture<'a, Result<String, String>> {
        Box::pin(self.send(request))
    }
}

fn build_payload(endpoint: &ModelEndpoint, request: &CompletionRequest) -> Value {
    let mut payload = json!({
        "model": endpoint.model,
        "messages": [
            {"role": "system", "content": request.system_prompt},
            {"role": "user", "content": request.user_prompt},
        ],
        "temperature": endpoint.temperature,
        "stream": false,
    });
    if let Some(max_tokens) = endpoint.max_tokens {
        payload["max_tokens"] = Value::from(max_tokens);
    }
    payload
}

fn parse_completion_text(raw: &str) -> Result<String, String> {
    let val: Value = serde_json::from_str(raw).map_err(|err| {
        format!(
            "invalid JSON response: {}; body_preview={}",
            err,
            truncate_log(raw, 1200)
        )
    })?;

    let message = val
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .cloned()
        .unwrap_or(Value::Null);
    let content = message
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim()
        .to_string();
    if content.is_empty() {
        return Err("model returned no text content".to_string());
    }
    Ok(content)
}

fn truncate_log(value: &str, max_len: usize) -> String {
    match value.char_indices().nth(max_len) {
        Some((cut, _)) => format!("{}...[truncated]", &value[..cut]),
        None => value.to_string(),
    }
}

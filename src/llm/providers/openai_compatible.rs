//! OpenAI-compatible chat completion provider (`/v1/chat/completions`).
//!
//! Exposes a single `complete(system, user, temperature, max_tokens)`
//! round-trip matching the rest of the backend abstraction. All OpenAI wire
//! types are private to this module — callers never see them.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::llm::ProviderError;

/// Adapter for any HTTP endpoint implementing `/v1/chat/completions`.
///
/// Covers OpenAI, OpenAI-compatible local servers (Ollama, LM Studio…), and
/// hosted alternatives. Constructed once at startup, then cheaply cloned
/// because `reqwest::Client` is an `Arc` internally.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleProvider {
    client: Client,
    api_base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiCompatibleProvider {
    /// Build a provider from config values and an optional API key.
    ///
    /// `api_key` is `None` for keyless local models. When present it is sent
    /// as `Authorization: Bearer <key>` on every request.
    pub fn new(
        api_base_url: String,
        model: String,
        timeout_seconds: u64,
        api_key: Option<String>,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, api_base_url, model, api_key })
    }

    pub async fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, ProviderError> {
        let payload = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                Message { role: "system".into(), content: system.to_string() },
                Message { role: "user".into(), content: user.to_string() },
            ],
            temperature,
            max_tokens,
        };

        debug!(
            model = %payload.model,
            temperature = payload.temperature,
            content_len = user.len(),
            "sending LLM request"
        );

        let mut req = self.client.post(&self.api_base_url).json(&payload);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| {
            error!(url = %self.api_base_url, error = %e, "LLM HTTP request failed (transport)");
            ProviderError::Request(e.to_string())
        })?;

        let response = check_status(response).await?;

        let parsed = response.json::<ChatCompletionResponse>().await.map_err(|e| {
            error!(error = %e, "failed to deserialize LLM response");
            ProviderError::Request(format!("failed to parse response body: {e}"))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ProviderError::Request("empty or missing content in response".into()))
    }
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// Error envelope used by OpenAI and compatible APIs.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

/// Consume the response and return it if successful, or a structured error.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());

    let message = if let Ok(env) = serde_json::from_str::<ErrorEnvelope>(&body) {
        let code = env
            .error
            .code
            .map(|v| match v {
                serde_json::Value::String(s) => format!(" [code={s}]"),
                other => format!(" [code={other}]"),
            })
            .unwrap_or_default();
        format!("HTTP {status}{code}: {}", env.error.message)
    } else {
        format!("HTTP {status}: {body}")
    };

    error!(%status, %message, "LLM request returned HTTP error");
    Err(ProviderError::Request(message))
}

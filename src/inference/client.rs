//! OpenAI-compatible inference client.
//!
//! Sends non-streaming chat completion requests and parses the reply into
//! a [`ModelResponse`]. The agent loop only sees the [`ChatModel`] trait.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;

use super::config::ModelConfig;
use super::errors::InferenceError;
use super::response::parse_chat_response;
use super::types::{ChatCompletionRequest, ChatMessage, ModelResponse, ToolDefinition};

// ─── Constants ───────────────────────────────────────────────────────────────

/// TCP connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ─── ChatModel ───────────────────────────────────────────────────────────────

/// One round with the model: history plus catalog in, one response out.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ModelResponse, InferenceError>;

    /// Model identifier, for logs and the startup report.
    fn model_name(&self) -> &str;
}

// ─── InferenceClient ─────────────────────────────────────────────────────────

/// Client for an OpenAI-compatible chat completions endpoint.
pub struct InferenceClient {
    http: HttpClient,
    config: ModelConfig,
    /// Resolved at construction so a missing model fails early.
    model: String,
}

impl InferenceClient {
    /// Create a client from validated configuration.
    ///
    /// Does NOT check connectivity; that happens on the first request.
    pub fn new(config: ModelConfig) -> Result<Self, InferenceError> {
        config.validate()?;
        let model = config.model_name()?.to_string();

        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| InferenceError::ConnectionFailed {
                endpoint: config.endpoint_base().to_string(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            config,
            model,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.endpoint_base())
    }

    fn build_request(&self, messages: &[ChatMessage], tools: &[ToolDefinition]) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            tools: if tools.is_empty() {
                None
            } else {
                Some(tools.to_vec())
            },
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        }
    }

    fn map_send_error(&self, url: &str, e: reqwest::Error) -> InferenceError {
        if e.is_timeout() {
            InferenceError::Timeout {
                duration_secs: self.config.request_timeout_secs,
            }
        } else {
            InferenceError::ConnectionFailed {
                endpoint: url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl ChatModel for InferenceClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ModelResponse, InferenceError> {
        let url = self.completions_url();
        let body = self.build_request(messages, tools);

        // Log the request metadata (not the full body, it can be huge)
        tracing::info!(
            url = %url,
            model = %body.model,
            message_count = body.messages.len(),
            tool_count = tools.len(),
            "=== LLM REQUEST ==="
        );

        let mut request = self.http.post(&url).json(&body);
        if let Some(key) = self.config.api_key.as_deref() {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.map_send_error(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "model endpoint returned an error");
            return Err(InferenceError::HttpError {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let body_text = response
            .text()
            .await
            .map_err(|e| self.map_send_error(&url, e))?;

        let parsed = parse_chat_response(&body_text)?;
        tracing::info!(
            finish_reason = parsed.finish_reason.as_deref().unwrap_or("none"),
            tool_calls = parsed.tool_calls.len(),
            "=== LLM RESPONSE ==="
        );
        Ok(parsed)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

//! Shared types for the inference client.
//!
//! These mirror the OpenAI Chat Completions API types, used for both
//! request building and response parsing.

use serde::{Deserialize, Serialize};

use crate::mcp_client::registry::NormalizedToolDescriptor;

// ─── Request Types ───────────────────────────────────────────────────────────

/// A single message in the conversation.
///
/// Serialization notes:
/// - `content` is `""` (not `null`) for assistant messages with tool calls.
///   Several OpenAI-compatible servers reject `null` content on the
///   tool call round-trip.
/// - `tool_call_id` and `tool_calls` are skipped when `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(serialize_with = "serialize_content")]
    pub content: Option<String>,
    /// Tool call results are sent back as `tool` role messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Assistant messages may contain tool calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallResponse>>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(text.into()),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Some(text.into()),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    /// Assistant message that requested tool calls, echoed back verbatim.
    pub fn assistant_tool_calls(content: Option<String>, calls: Vec<ToolCallResponse>) -> Self {
        Self {
            role: Role::Assistant,
            content,
            tool_call_id: None,
            tool_calls: Some(calls),
        }
    }

    pub fn tool_result(call_id: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(result.into()),
            tool_call_id: Some(call_id.into()),
            tool_calls: None,
        }
    }
}

/// Custom serializer for `content`: emit `""` instead of `null` when `None`.
fn serialize_content<S>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match value {
        Some(s) => serializer.serialize_str(s),
        None => serializer.serialize_str(""),
    }
}

/// Message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

/// Tool definition sent in the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub r#type: String,
    pub function: FunctionDefinition,
}

/// Function definition within a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl From<&NormalizedToolDescriptor> for ToolDefinition {
    fn from(descriptor: &NormalizedToolDescriptor) -> Self {
        ToolDefinition {
            r#type: "function".to_string(),
            function: FunctionDefinition {
                name: descriptor.name.clone(),
                description: descriptor.description.clone(),
                // Serializing a struct of three `Value`s cannot fail
                parameters: serde_json::to_value(&descriptor.parameters)
                    .unwrap_or_else(|_| serde_json::json!({})),
            },
        }
    }
}

/// Request body for `POST {base_url}/chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    /// Omitted entirely when the catalog is empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

// ─── Response Types ──────────────────────────────────────────────────────────

/// Tool call as returned in the OpenAI response format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResponse {
    pub id: String,
    pub r#type: String,
    pub function: FunctionCallResponse,
}

/// Function call details in a response.
///
/// `arguments` stays the raw JSON-encoded string the model produced; it is
/// decoded only at dispatch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallResponse {
    pub name: String,
    pub arguments: String,
}

/// One completed model round.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelResponse {
    /// `"tool_calls"`, `"stop"`, `"length"`, ... as reported by the endpoint.
    pub finish_reason: Option<String>,
    /// Assistant text, if any.
    pub content: Option<String>,
    /// Requested tool calls in emission order.
    pub tool_calls: Vec<ToolCallResponse>,
}

impl ModelResponse {
    /// Whether this round asks for tool execution.
    ///
    /// A `tool_calls` stop reason with zero calls counts as final text.
    pub fn requests_tools(&self) -> bool {
        self.finish_reason.as_deref() == Some("tool_calls") && !self.tool_calls.is_empty()
    }

    /// Final text for the turn (empty when the model sent none).
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

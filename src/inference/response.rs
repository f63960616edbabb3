//! Chat completion response parsing.
//!
//! Validates the endpoint's JSON once at the boundary and converts it into
//! a [`ModelResponse`]. Tool call arguments are kept as the raw string the
//! model produced.

use serde::Deserialize;
use uuid::Uuid;

use super::errors::InferenceError;
use super::types::{FunctionCallResponse, ModelResponse, ToolCallResponse};

#[derive(Deserialize)]
struct CompletionBody {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<CompletionToolCall>>,
}

#[derive(Deserialize)]
struct CompletionToolCall {
    id: Option<String>,
    r#type: Option<String>,
    function: CompletionFunction,
}

#[derive(Deserialize)]
struct CompletionFunction {
    name: String,
    /// Normally a JSON-encoded string; some servers send an object.
    #[serde(default)]
    arguments: serde_json::Value,
}

/// Parse a non-streaming chat completion body.
///
/// Only the first choice is read. Calls without an id get a generated
/// `call_<uuid>` so each tool result can still be matched to its request.
pub fn parse_chat_response(body: &str) -> Result<ModelResponse, InferenceError> {
    let resp: CompletionBody =
        serde_json::from_str(body).map_err(|e| InferenceError::ResponseParseError {
            reason: format!("invalid completion JSON: {e}"),
        })?;

    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or(InferenceError::ResponseParseError {
            reason: "empty choices array".into(),
        })?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| ToolCallResponse {
            id: tc
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| format!("call_{}", Uuid::new_v4())),
            r#type: tc.r#type.unwrap_or_else(|| "function".to_string()),
            function: FunctionCallResponse {
                name: tc.function.name,
                arguments: raw_arguments(tc.function.arguments),
            },
        })
        .collect();

    Ok(ModelResponse {
        finish_reason: choice.finish_reason,
        content: choice.message.content,
        tool_calls,
    })
}

fn raw_arguments(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text_response() {
        let body = r#"{
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Hello, world!"},
                "finish_reason": "stop"
            }]
        }"#;

        let resp = parse_chat_response(body).unwrap();
        assert_eq!(resp.content.as_deref(), Some("Hello, world!"));
        assert!(resp.tool_calls.is_empty());
        assert_eq!(resp.finish_reason.as_deref(), Some("stop"));
        assert!(!resp.requests_tools());
    }

    #[test]
    fn test_parse_tool_calls_keeps_raw_arguments() {
        let body = r#"{
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {"name": "calc_add", "arguments": "{\"a\":2,\"b\":3}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        }"#;

        let resp = parse_chat_response(body).unwrap();
        assert!(resp.requests_tools());
        assert_eq!(resp.content, None);
        assert_eq!(resp.tool_calls.len(), 1);
        assert_eq!(resp.tool_calls[0].id, "call_abc");
        assert_eq!(resp.tool_calls[0].function.name, "calc_add");
        assert_eq!(resp.tool_calls[0].function.arguments, r#"{"a":2,"b":3}"#);
    }

    #[test]
    fn test_missing_id_is_generated() {
        let body = r#"{"choices": [{
            "message": {"content": "", "tool_calls": [
                {"function": {"name": "clock_now", "arguments": ""}}
            ]},
            "finish_reason": "tool_calls"
        }]}"#;

        let resp = parse_chat_response(body).unwrap();
        let call = &resp.tool_calls[0];
        assert!(call.id.starts_with("call_"));
        assert_eq!(call.r#type, "function");
        assert_eq!(call.function.arguments, "");
    }

    #[test]
    fn test_object_arguments_are_reencoded() {
        let body = r#"{"choices": [{
            "message": {"tool_calls": [
                {"id": "c1", "function": {"name": "calc_add", "arguments": {"a": 1}}}
            ]},
            "finish_reason": "tool_calls"
        }]}"#;

        let resp = parse_chat_response(body).unwrap();
        let decoded: serde_json::Value =
            serde_json::from_str(&resp.tool_calls[0].function.arguments).unwrap();
        assert_eq!(decoded, serde_json::json!({"a": 1}));
    }

    #[test]
    fn test_empty_choices_is_error() {
        let err = parse_chat_response(r#"{"choices": []}"#).unwrap_err();
        assert!(matches!(err, InferenceError::ResponseParseError { .. }));
    }

    #[test]
    fn test_invalid_json_is_error() {
        let err = parse_chat_response("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, InferenceError::ResponseParseError { .. }));
    }
}

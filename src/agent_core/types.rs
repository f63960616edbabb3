//! Shared types for the agent core.
//!
//! Conversation messages and the agent settings used across the
//! ConversationHistory, ToolRouter and the agent loop.

use serde::Deserialize;

use crate::inference::types::{ChatMessage, ToolCallResponse};

use super::errors::AgentError;

// ─── Conversation Messages ──────────────────────────────────────────────────

/// One entry of the running conversation.
///
/// Within a round, an `AssistantToolCalls` entry is followed by exactly one
/// `ToolResult` per call, in call order, before the next model request.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationMessage {
    User {
        text: String,
    },
    AssistantText {
        text: String,
    },
    /// The model's tool-call response, kept exactly as returned.
    AssistantToolCalls {
        content: Option<String>,
        calls: Vec<ToolCallResponse>,
    },
    ToolResult {
        call_id: String,
        content: String,
    },
}

impl ConversationMessage {
    pub fn is_tool_result(&self) -> bool {
        matches!(self, ConversationMessage::ToolResult { .. })
    }

    pub fn is_user(&self) -> bool {
        matches!(self, ConversationMessage::User { .. })
    }

    /// Wire form sent to the model.
    pub fn to_chat_message(&self) -> ChatMessage {
        match self {
            ConversationMessage::User { text } => ChatMessage::user(text.clone()),
            ConversationMessage::AssistantText { text } => ChatMessage::assistant(text.clone()),
            ConversationMessage::AssistantToolCalls { content, calls } => {
                ChatMessage::assistant_tool_calls(content.clone(), calls.clone())
            }
            ConversationMessage::ToolResult { call_id, content } => {
                ChatMessage::tool_result(call_id.clone(), content.clone())
            }
        }
    }
}

// ─── Agent Settings ─────────────────────────────────────────────────────────

/// Default bound on tool-call rounds per turn.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 10;

/// Default number of history entries kept between turns.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Default tool call timeout in seconds.
pub const DEFAULT_TOOL_CALL_TIMEOUT_SECS: u64 = 30;

/// The `agent:` section of the config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentSettings {
    pub max_tool_rounds: usize,
    pub history_limit: usize,
    pub tool_call_timeout_secs: u64,
    /// Run the calls of one round concurrently. Results keep call order.
    pub parallel_tool_calls: bool,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            history_limit: DEFAULT_HISTORY_LIMIT,
            tool_call_timeout_secs: DEFAULT_TOOL_CALL_TIMEOUT_SECS,
            parallel_tool_calls: false,
        }
    }
}

impl AgentSettings {
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.max_tool_rounds == 0 {
            return Err(AgentError::Config {
                reason: "agent.max_tool_rounds must be at least 1".into(),
            });
        }
        if self.history_limit < 2 {
            return Err(AgentError::Config {
                reason: "agent.history_limit must be at least 2".into(),
            });
        }
        if self.tool_call_timeout_secs == 0 {
            return Err(AgentError::Config {
                reason: "agent.tool_call_timeout_secs must be greater than 0".into(),
            });
        }
        Ok(())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::types::{FunctionCallResponse, Role};

    #[test]
    fn test_to_chat_message_roles() {
        let call = ToolCallResponse {
            id: "call_1".into(),
            r#type: "function".into(),
            function: FunctionCallResponse {
                name: "calc_add".into(),
                arguments: r#"{"a":2,"b":3}"#.into(),
            },
        };
        let request = ConversationMessage::AssistantToolCalls {
            content: None,
            calls: vec![call.clone()],
        }
        .to_chat_message();
        assert_eq!(request.role, Role::Assistant);
        assert_eq!(request.tool_calls, Some(vec![call]));

        let result = ConversationMessage::ToolResult {
            call_id: "call_1".into(),
            content: "5".into(),
        }
        .to_chat_message();
        assert_eq!(result.role, Role::Tool);
        assert_eq!(result.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(result.content.as_deref(), Some("5"));
    }

    #[test]
    fn test_settings_defaults() {
        let settings: AgentSettings = serde_yaml::from_str("parallel_tool_calls: true\n").unwrap();
        assert_eq!(settings.max_tool_rounds, 10);
        assert_eq!(settings.history_limit, 20);
        assert_eq!(settings.tool_call_timeout_secs, 30);
        assert!(settings.parallel_tool_calls);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_validation() {
        let bad = AgentSettings {
            max_tool_rounds: 0,
            ..Default::default()
        };
        assert!(matches!(bad.validate(), Err(AgentError::Config { .. })));

        let bad = AgentSettings {
            history_limit: 1,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}

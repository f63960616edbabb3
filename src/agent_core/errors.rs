//! Agent Core error types.

use thiserror::Error;

use crate::inference::errors::InferenceError;
use crate::mcp_client::errors::McpError;

/// A qualified tool name that cannot be resolved to a server.
///
/// Never fatal: the router turns it into tool-result text so the model can
/// pick another tool.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    /// No separator, or an empty server or tool part.
    #[error("malformed tool name '{name}': expected <server>_<tool>")]
    MalformedName { name: String },

    /// The server part names no running server.
    #[error("unknown provider '{provider}' for tool '{name}'")]
    UnknownProvider { provider: String, name: String },
}

/// Errors that end a turn or prevent the agent from starting.
#[derive(Debug, Error)]
pub enum AgentError {
    /// A server could not be started; nothing is left running.
    #[error("startup failed: {0}")]
    Startup(#[from] McpError),

    /// The model endpoint failed for this turn.
    #[error("model request failed: {0}")]
    Inference(#[from] InferenceError),

    /// The model kept requesting tools past the round limit.
    #[error("turn exhausted: model still requesting tools after {rounds} rounds")]
    TurnExhausted { rounds: usize },

    /// Invalid agent settings.
    #[error("config error: {reason}")]
    Config { reason: String },
}

impl AgentError {
    /// A suggestion for the operator, when the fix is on their side.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            AgentError::Inference(e) if e.is_auth_error() => {
                Some("the model endpoint rejected the API key; check OPENAI_API_KEY")
            }
            AgentError::TurnExhausted { .. } => {
                Some("raise --max-rounds or agent.max_tool_rounds to allow more tool rounds")
            }
            _ => None,
        }
    }
}

//! Agent Core: the tool-calling conversation layer.
//!
//! Submodules:
//! - `conversation`: Conversation history with an entry cap
//! - `tool_router`: Dispatches model tool calls to MCP servers
//! - `agent_loop`: Per-turn state machine with a round bound
//! - `orchestrator`: Owns servers, catalog and history across turns
//! - `types`: Conversation messages and agent settings
//! - `errors`: Routing and agent-level error types

pub mod agent_loop;
pub mod conversation;
pub mod errors;
pub mod orchestrator;
pub mod tool_router;
pub mod types;

// Re-exports for convenience
pub use agent_loop::TurnOutcome;
pub use conversation::ConversationHistory;
pub use errors::{AgentError, RoutingError};
pub use orchestrator::Orchestrator;
pub use tool_router::ToolRouter;
pub use types::{AgentSettings, ConversationMessage};

//! MCP Client error types.

use thiserror::Error;

/// Errors that can occur during MCP client operations.
#[derive(Debug, Error)]
pub enum McpError {
    /// A server process failed to start.
    #[error("failed to spawn server '{name}': {reason}")]
    SpawnFailed {
        name: String,
        reason: String,
    },

    /// The initialization handshake failed.
    #[error("server '{name}' initialization failed: {reason}")]
    InitFailed {
        name: String,
        reason: String,
    },

    /// The script's extension does not map to a known launcher.
    #[error("unsupported server kind for '{name}': '{path}' (expected a .py or .js file)")]
    UnsupportedServerKind {
        name: String,
        path: String,
    },

    /// Server name is empty or contains the qualified-name separator.
    #[error("invalid server name '{name}': {reason}")]
    InvalidServerName {
        name: String,
        reason: String,
    },

    /// Two servers were registered under the same name.
    #[error("duplicate server name '{name}'")]
    DuplicateServer {
        name: String,
    },

    /// JSON-RPC communication error (malformed message, I/O error).
    #[error("transport error for server '{server}': {reason}")]
    TransportError {
        server: String,
        reason: String,
    },

    /// Server returned a JSON-RPC error response.
    #[error("server error [{code}]: {message}")]
    ServerError {
        code: i32,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// A tool call timed out.
    #[error("tool call '{tool}' timed out after {timeout_ms}ms")]
    Timeout {
        tool: String,
        timeout_ms: u64,
    },

    /// Server process crashed unexpectedly.
    #[error("server '{name}' crashed: {reason}")]
    ServerCrashed {
        name: String,
        reason: String,
    },

    /// No running server is registered under this name.
    #[error("unknown server: '{name}'")]
    UnknownServer {
        name: String,
    },

    /// Configuration error (no servers, unreadable config).
    #[error("config error: {reason}")]
    ConfigError {
        reason: String,
    },
}

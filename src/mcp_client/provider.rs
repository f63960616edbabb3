//! The `ToolProvider` seam.
//!
//! `McpClient` talks to its servers only through this trait. The real
//! implementation is [`ManagedServer`](super::lifecycle::ManagedServer);
//! tests register in-process fakes.

use async_trait::async_trait;

use super::errors::McpError;
use super::types::McpToolDefinition;

/// One started tool server.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Re-query the server's tools. Callers cache if they need a snapshot.
    async fn list_tools(&self) -> Result<Vec<McpToolDefinition>, McpError>;

    /// Invoke a tool by its local (unqualified) name.
    async fn call_tool(
        &self,
        tool_name: &str,
        arguments: serde_json::Value,
    ) -> Result<String, McpError>;

    /// Tear down the transport and the process.
    async fn shutdown(&mut self) -> Result<(), McpError>;
}

//! MCP Client: JSON-RPC over stdio transport for MCP server management.
//!
//! This module handles:
//! - Resolving launch commands and spawning server child processes
//! - JSON-RPC 2.0 communication over process stdio
//! - Tool discovery and merging into one qualified catalog
//! - Forwarding tool calls to the owning server
//! - Server lifecycle (all-or-nothing startup, reverse-order shutdown)

pub mod client;
pub mod errors;
pub mod launch;
pub mod lifecycle;
pub mod provider;
pub mod registry;
pub mod session;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use client::McpClient;
pub use errors::McpError;
pub use provider::ToolProvider;
pub use registry::{qualify, split_qualified, NormalizedToolDescriptor, ToolCatalog};
pub use types::{McpServersConfig, McpToolDefinition, ServerEntry};

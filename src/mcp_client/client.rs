//! MCP Client: high-level interface over all running servers.
//!
//! Owns the started servers in registration order, builds the merged tool
//! catalog, and forwards tool calls to the owning server with a timeout.

use std::time::{Duration, Instant};

use super::errors::McpError;
use super::launch;
use super::lifecycle;
use super::provider::ToolProvider;
use super::registry::ToolCatalog;
use super::types::{McpServersConfig, McpToolDefinition};

// ─── Constants ───────────────────────────────────────────────────────────────

/// Default timeout for tool call execution (ms).
pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 30_000;

// ─── McpClient ───────────────────────────────────────────────────────────────

/// A started server under its operator-chosen name.
struct RegisteredServer {
    name: String,
    provider: Box<dyn ToolProvider>,
}

/// High-level MCP client that manages multiple servers and routes tool calls.
pub struct McpClient {
    /// Started servers, in registration order.
    servers: Vec<RegisteredServer>,
    /// Tool lists captured at startup, aligned with `servers`.
    startup_tools: Vec<(String, Vec<McpToolDefinition>)>,
    /// Tool call timeout in milliseconds.
    call_timeout_ms: u64,
}

impl McpClient {
    /// Create a client with no servers.
    pub fn new() -> Self {
        Self {
            servers: Vec::new(),
            startup_tools: Vec::new(),
            call_timeout_ms: DEFAULT_CALL_TIMEOUT_MS,
        }
    }

    /// Set the tool call timeout in milliseconds.
    pub fn set_call_timeout(&mut self, timeout_ms: u64) {
        self.call_timeout_ms = timeout_ms;
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────

    /// Start every configured server, in order.
    ///
    /// All-or-nothing: the whole table is validated first, and if any
    /// server then fails to spawn or handshake, the servers already
    /// started are shut down (most recent first) and the error returned.
    pub async fn start_all(config: &McpServersConfig) -> Result<Self, McpError> {
        let specs = launch::resolve_all(config)?;
        let mut client = McpClient::new();

        for spec in &specs {
            tracing::info!(server = %spec.name, command = %spec.command, "starting server");
            match lifecycle::spawn_server(spec).await {
                Ok((server, tools)) => {
                    client.startup_tools.push((spec.name.clone(), tools));
                    client.servers.push(RegisteredServer {
                        name: spec.name.clone(),
                        provider: Box::new(server),
                    });
                }
                Err(e) => {
                    tracing::error!(server = %spec.name, error = %e, "server failed to start, aborting startup");
                    client.shutdown_all().await;
                    return Err(e);
                }
            }
        }

        Ok(client)
    }

    /// Register an already-started provider with its initial tool list.
    pub fn register(
        &mut self,
        name: &str,
        provider: Box<dyn ToolProvider>,
        tools: Vec<McpToolDefinition>,
    ) -> Result<(), McpError> {
        launch::validate_server_name(name)?;
        if self.is_server_running(name) {
            return Err(McpError::DuplicateServer {
                name: name.to_string(),
            });
        }
        self.startup_tools.push((name.to_string(), tools));
        self.servers.push(RegisteredServer {
            name: name.to_string(),
            provider,
        });
        Ok(())
    }

    /// Shut down all servers, most recently started first.
    pub async fn shutdown_all(&mut self) {
        while let Some(mut server) = self.servers.pop() {
            if let Err(e) = server.provider.shutdown().await {
                tracing::warn!(server = %server.name, error = %e, "server shutdown failed");
            } else {
                tracing::info!(server = %server.name, "server stopped");
            }
        }
        self.startup_tools.clear();
    }

    // ─── Catalog ─────────────────────────────────────────────────────────

    /// Catalog built from the tool lists captured at startup.
    pub fn catalog(&self) -> ToolCatalog {
        ToolCatalog::merge(&self.startup_tools)
    }

    /// Re-query every server and rebuild the catalog.
    pub async fn refresh_tools(&mut self) -> Result<ToolCatalog, McpError> {
        let mut fresh = Vec::with_capacity(self.servers.len());
        for server in &self.servers {
            let tools = server.provider.list_tools().await?;
            fresh.push((server.name.clone(), tools));
        }
        self.startup_tools = fresh;
        Ok(self.catalog())
    }

    /// Query one server's current tool list.
    pub async fn list_tools(&self, server_name: &str) -> Result<Vec<McpToolDefinition>, McpError> {
        self.provider(server_name)?.list_tools().await
    }

    // ─── Tool Execution ──────────────────────────────────────────────────

    /// Forward a tool call to the named server and return its text result.
    pub async fn call_tool(
        &self,
        server_name: &str,
        tool_name: &str,
        arguments: serde_json::Value,
    ) -> Result<String, McpError> {
        let provider = self.provider(server_name)?;
        let start = Instant::now();

        let result = tokio::time::timeout(
            Duration::from_millis(self.call_timeout_ms),
            provider.call_tool(tool_name, arguments),
        )
        .await
        .map_err(|_| McpError::Timeout {
            tool: tool_name.to_string(),
            timeout_ms: self.call_timeout_ms,
        })?
        .map_err(|e| match e {
            // Transport failures mean the process is gone or wedged
            McpError::TransportError { reason, .. } => McpError::ServerCrashed {
                name: server_name.to_string(),
                reason,
            },
            other => other,
        });

        tracing::debug!(
            server = server_name,
            tool = tool_name,
            ok = result.is_ok(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "tool call finished"
        );

        result
    }

    fn provider(&self, server_name: &str) -> Result<&dyn ToolProvider, McpError> {
        self.servers
            .iter()
            .find(|s| s.name == server_name)
            .map(|s| s.provider.as_ref())
            .ok_or_else(|| McpError::UnknownServer {
                name: server_name.to_string(),
            })
    }

    // ─── Status ──────────────────────────────────────────────────────────

    /// Get the number of running servers.
    pub fn running_server_count(&self) -> usize {
        self.servers.len()
    }

    /// Check if a specific server is registered.
    pub fn is_server_running(&self, name: &str) -> bool {
        self.servers.iter().any(|s| s.name == name)
    }

    /// Server names in registration order.
    pub fn server_names(&self) -> Vec<&str> {
        self.servers.iter().map(|s| s.name.as_str()).collect()
    }
}

impl Default for McpClient {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Test Support ────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;

    type Handler = Box<dyn Fn(&serde_json::Value) -> Result<String, McpError> + Send + Sync>;

    /// In-process provider with scripted tools.
    pub(crate) struct FakeProvider {
        pub name: String,
        pub tools: Vec<McpToolDefinition>,
        pub handlers: HashMap<String, Handler>,
        pub calls: Arc<Mutex<Vec<(String, serde_json::Value)>>>,
        pub shutdown_log: Arc<Mutex<Vec<String>>>,
        pub delay: Option<Duration>,
    }

    impl FakeProvider {
        pub fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                tools: Vec::new(),
                handlers: HashMap::new(),
                calls: Arc::new(Mutex::new(Vec::new())),
                shutdown_log: Arc::new(Mutex::new(Vec::new())),
                delay: None,
            }
        }

        pub fn tool<F>(mut self, name: &str, description: &str, schema: serde_json::Value, f: F) -> Self
        where
            F: Fn(&serde_json::Value) -> Result<String, McpError> + Send + Sync + 'static,
        {
            self.tools.push(McpToolDefinition {
                name: Some(name.to_string()),
                description: Some(description.to_string()),
                input_schema: Some(schema),
            });
            self.handlers.insert(name.to_string(), Box::new(f));
            self
        }
    }

    #[async_trait]
    impl ToolProvider for FakeProvider {
        async fn list_tools(&self) -> Result<Vec<McpToolDefinition>, McpError> {
            Ok(self.tools.clone())
        }

        async fn call_tool(
            &self,
            tool_name: &str,
            arguments: serde_json::Value,
        ) -> Result<String, McpError> {
            self.calls
                .lock()
                .unwrap()
                .push((tool_name.to_string(), arguments.clone()));
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match self.handlers.get(tool_name) {
                Some(handler) => handler(&arguments),
                None => Err(McpError::ServerError {
                    code: -32602,
                    message: format!("unknown tool '{tool_name}'"),
                    data: None,
                }),
            }
        }

        async fn shutdown(&mut self) -> Result<(), McpError> {
            self.shutdown_log.lock().unwrap().push(self.name.clone());
            Ok(())
        }
    }

    /// Register fakes in order.
    pub(crate) fn client_with(providers: Vec<FakeProvider>) -> McpClient {
        let mut client = McpClient::new();
        for p in providers {
            let name = p.name.clone();
            let tools = p.tools.clone();
            client.register(&name, Box::new(p), tools).unwrap();
        }
        client
    }

    /// The calc server from the end-to-end scenario: `add(a, b)`.
    pub(crate) fn calc_provider() -> FakeProvider {
        FakeProvider::new("calc").tool(
            "add",
            "Add two numbers",
            serde_json::json!({
                "type": "object",
                "properties": {"a": {"type": "number"}, "b": {"type": "number"}},
                "required": ["a", "b"]
            }),
            |args| {
                let a = args["a"].as_f64().unwrap_or(0.0);
                let b = args["b"].as_f64().unwrap_or(0.0);
                Ok(format!("{}", a + b))
            },
        )
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

//! Server process lifecycle management.
//!
//! Handles spawning, handshaking, and shutting down MCP server child
//! processes. Each server runs as a separate OS process communicating via
//! JSON-RPC over stdio.

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};

use super::errors::McpError;
use super::launch::LaunchSpec;
use super::provider::ToolProvider;
use super::session::McpSession;
use super::transport::StdioTransport;
use super::types::McpToolDefinition;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Timeout for the initialize handshake.
const INIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for graceful shutdown before force-killing.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Cap on captured stderr included in startup errors.
const MAX_STDERR_CHARS: usize = 2000;

// ─── ManagedServer ───────────────────────────────────────────────────────────

/// A running MCP server process with its initialized session.
pub struct ManagedServer {
    /// Operator-chosen server name (e.g., "fileserver").
    pub name: String,
    /// The child process handle.
    process: Child,
    /// Initialized MCP session over the child's stdio.
    session: McpSession,
    /// Cleared once shutdown has run, so a second stop is a no-op.
    alive: bool,
}

#[async_trait]
impl ToolProvider for ManagedServer {
    async fn list_tools(&self) -> Result<Vec<McpToolDefinition>, McpError> {
        self.session.list_tools().await
    }

    async fn call_tool(
        &self,
        tool_name: &str,
        arguments: serde_json::Value,
    ) -> Result<String, McpError> {
        self.session.call_tool(tool_name, arguments).await
    }

    /// Close stdin so the server sees EOF, wait briefly, then kill.
    async fn shutdown(&mut self) -> Result<(), McpError> {
        if !self.alive {
            return Ok(());
        }
        self.alive = false;

        self.session.close().await;

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.process.wait()).await {
            Ok(Ok(status)) => {
                tracing::info!(server = %self.name, %status, "server exited");
            }
            _ => {
                tracing::warn!(server = %self.name, "server did not exit in time, killing");
                let _ = self.process.kill().await;
            }
        }
        Ok(())
    }
}

// ─── Spawning ────────────────────────────────────────────────────────────────

/// Spawn a single MCP server process and perform the initialization handshake.
///
/// The tool list is queried once here so a server that cannot answer
/// `tools/list` fails at startup rather than mid-conversation.
pub async fn spawn_server(
    spec: &LaunchSpec,
) -> Result<(ManagedServer, Vec<McpToolDefinition>), McpError> {
    let name = spec.name.as_str();
    let mut cmd = Command::new(&spec.command);
    cmd.args(&spec.args);

    // Windows: prevent console window from appearing for child processes
    #[cfg(target_os = "windows")]
    {
        const CREATE_NO_WINDOW: u32 = 0x08000000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }

    cmd.stdin(std::process::Stdio::piped());
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());
    cmd.kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| McpError::SpawnFailed {
        name: name.to_string(),
        reason: format!("{} {}: {e}", spec.command, spec.args.join(" ")),
    })?;

    let stdin = child.stdin.take().ok_or(McpError::SpawnFailed {
        name: name.to_string(),
        reason: "failed to capture stdin".into(),
    })?;

    let stdout = child.stdout.take().ok_or(McpError::SpawnFailed {
        name: name.to_string(),
        reason: "failed to capture stdout".into(),
    })?;

    let stderr_handle = child.stderr.take();

    let transport = StdioTransport::new(name, stdin, stdout);

    let handshake = async {
        let session = McpSession::initialize(transport).await?;
        let tools = session.list_tools().await?;
        Ok::<_, McpError>((session, tools))
    };

    let (session, tools) = match tokio::time::timeout(INIT_TIMEOUT, handshake).await {
        Ok(Ok(ready)) => ready,
        Ok(Err(e)) => {
            let _ = child.kill().await;
            let stderr_ctx = read_stderr_on_failure(stderr_handle).await;
            if !stderr_ctx.is_empty() {
                tracing::warn!(
                    server = name,
                    stderr = %stderr_ctx,
                    "server stderr captured on failure"
                );
            }
            return Err(McpError::InitFailed {
                name: name.to_string(),
                reason: format!("{e}{}", format_stderr_suffix(&stderr_ctx)),
            });
        }
        Err(_) => {
            let _ = child.kill().await;
            let stderr_ctx = read_stderr_on_failure(stderr_handle).await;
            return Err(McpError::InitFailed {
                name: name.to_string(),
                reason: format!(
                    "initialization timed out after {}s{}",
                    INIT_TIMEOUT.as_secs(),
                    format_stderr_suffix(&stderr_ctx)
                ),
            });
        }
    };

    if let Some(stderr) = stderr_handle {
        forward_stderr(name.to_string(), stderr);
    }

    tracing::info!(
        server = name,
        command = %spec.command,
        tool_count = tools.len(),
        "server started"
    );

    Ok((
        ManagedServer {
            name: name.to_string(),
            process: child,
            session,
            alive: true,
        },
        tools,
    ))
}

/// Relay a running server's stderr into the log so the pipe never fills.
fn forward_stderr(server: String, stderr: tokio::process::ChildStderr) {
    use tokio::io::{AsyncBufReadExt, BufReader};

    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::debug!(server = %server, "stderr: {line}");
        }
    });
}

/// Read any available stderr output from a failed server process.
///
/// Uses a short timeout to avoid blocking if stderr is empty or the process
/// is still writing. Truncates to keep log messages readable.
async fn read_stderr_on_failure(
    stderr_handle: Option<tokio::process::ChildStderr>,
) -> String {
    use tokio::io::AsyncReadExt;

    let Some(mut stderr) = stderr_handle else {
        return String::new();
    };

    let mut buf = String::new();
    match tokio::time::timeout(
        Duration::from_millis(500),
        stderr.read_to_string(&mut buf),
    )
    .await
    {
        Ok(Ok(_)) => truncate_stderr(buf),
        _ => String::new(),
    }
}

fn truncate_stderr(mut buf: String) -> String {
    if buf.chars().count() > MAX_STDERR_CHARS {
        buf = buf.chars().take(MAX_STDERR_CHARS).collect();
        buf.push_str("...(truncated)");
    }
    buf
}

/// Format a stderr suffix for error messages (empty string if no stderr).
fn format_stderr_suffix(stderr: &str) -> String {
    if stderr.trim().is_empty() {
        String::new()
    } else {
        format!(" | stderr: {}", stderr.trim())
    }
}

// ─── Test Support ────────────────────────────────────────────────────────────


// ─── Tests ───────────────────────────────────────────────────────────────────

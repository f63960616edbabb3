use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use mcpbridge::agent_core::Orchestrator;
use mcpbridge::config::{parse_server_arg, AppConfig, CliOverrides};
use mcpbridge::inference::InferenceClient;
use mcpbridge::mcp_client::ServerEntry;
use mcpbridge::{init_tracing, LogTarget};

#[derive(Parser, Debug)]
#[command(
    name = "mcpbridge",
    version,
    about = "Chat with a model that can call tools on several stdio MCP servers"
)]
struct Cli {
    /// Config file (default: mcpbridge.yaml found upward from the cwd).
    #[arg(long, short)]
    config: Option<PathBuf>,
    /// Add or replace a server, e.g. `--server calc=./calc.py`.
    #[arg(long = "server", value_name = "NAME=PATH", value_parser = parse_server_arg)]
    servers: Vec<ServerEntry>,
    /// Model identifier (overrides MODEL).
    #[arg(long)]
    model: Option<String>,
    /// OpenAI-compatible base URL (overrides BASE_URL).
    #[arg(long)]
    base_url: Option<String>,
    /// Tool-call rounds allowed per turn.
    #[arg(long)]
    max_rounds: Option<usize>,
    /// Run the tool calls of one round concurrently.
    #[arg(long)]
    parallel_tools: bool,
    /// Log to stderr instead of the log file.
    #[arg(long)]
    log_stderr: bool,
    /// Server scripts (`.py` or `.js`); names derive from the file stem.
    scripts: Vec<PathBuf>,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            config_path: self.config.clone(),
            servers: self.servers.clone(),
            scripts: self.scripts.clone(),
            model: self.model.clone(),
            base_url: self.base_url.clone(),
            max_rounds: self.max_rounds,
            parallel_tools: self.parallel_tools,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let target = if cli.log_stderr {
        LogTarget::Stderr
    } else {
        LogTarget::File
    };
    if let Err(e) = init_tracing(target) {
        eprintln!("warning: file logging unavailable: {e}");
    }

    let config = AppConfig::load(&cli.overrides()).context("failed to load configuration")?;
    let model = InferenceClient::new(config.model.clone()).context("invalid model configuration")?;

    let mut orchestrator = Orchestrator::start(&config.servers, config.agent.clone(), Box::new(model))
        .await
        .context("failed to start servers")?;

    print_startup_report(&config, &orchestrator);

    let result = chat_loop(&mut orchestrator).await;
    orchestrator.shutdown().await;
    tracing::info!("=== mcpbridge stopped ===");
    result
}

/// Connected servers and the merged tool names.
fn print_startup_report(config: &AppConfig, orchestrator: &Orchestrator) {
    println!("\nConnected to servers:");
    for entry in &config.servers.servers {
        println!("    - {}: {}", entry.name, entry.path.display());
    }

    let catalog = orchestrator.catalog();
    println!("\nAvailable tools ({}):", catalog.len());
    for name in catalog.names() {
        println!("    - {name}");
    }
    if !catalog.dropped().is_empty() {
        println!(
            "    ({} malformed tool entries skipped, see log)",
            catalog.dropped().len()
        );
    }
    println!("\nModel: {}", orchestrator.model_name());
}

/// Read one query per line until `quit`, EOF or Ctrl-C.
async fn chat_loop(orchestrator: &mut Orchestrator) -> anyhow::Result<()> {
    println!("\nType your query, or `quit` to exit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let progress = |name: &str, args: &serde_json::Value| {
        println!("[Calling tool {name} with args {args}]");
    };

    loop {
        print!("\nQuery: ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };
        let Some(line) = line else {
            break;
        };

        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query.eq_ignore_ascii_case("quit") {
            break;
        }

        tokio::select! {
            result = orchestrator.run_turn(query, Some(&progress)) => match result {
                Ok(outcome) => println!("\n{}", outcome.text),
                Err(e) => {
                    eprintln!("\nError: {e}");
                    if let Some(hint) = e.hint() {
                        eprintln!("hint: {hint}");
                    }
                }
            },
            _ = tokio::signal::ctrl_c() => {
                println!("\nInterrupted.");
                break;
            }
        }
    }

    Ok(())
}

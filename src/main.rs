//! `edge-gateway` binary.
//!
//! Resolves configuration and the execution mode once, then hands control to
//! the daemon orchestrator or the hosted invocation loop.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use edge_gateway::config::{load_config, GatewayConfig, ModeSetting};
use edge_gateway::lifecycle::hosted::{InvocationEvent, InvocationResult};
use edge_gateway::lifecycle::signals;
use edge_gateway::{database, observability, routes};
use edge_gateway::{ExecutionMode, HostedGateway, Orchestrator, Termination};

#[derive(Parser)]
#[command(name = "edge-gateway")]
#[command(about = "HTTP request gateway with an ordered policy pipeline", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Execution mode; overrides the file and GATEWAY_MODE
    #[arg(short, long, value_enum)]
    mode: Option<ModeSetting>,

    /// Listen port; overrides the file and PORT
    #[arg(short, long)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Run in the resolved execution mode (default)
    Serve,
    /// Handle a single JSON invocation event from stdin
    Invoke,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("edge-gateway: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(mode) = cli.mode {
        config.mode = mode;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    if let Err(e) = observability::logging::init(config.environment, &config.observability.log_level) {
        eprintln!("edge-gateway: failed to initialise logging: {e}");
    }

    let mode = ExecutionMode::detect(config.mode);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = %mode,
        environment = %config.environment,
        "edge-gateway starting"
    );

    let config = Arc::new(config);
    match (cli.command.unwrap_or(Command::Serve), mode) {
        (Command::Invoke, _) => invoke_once(config).await,
        (Command::Serve, ExecutionMode::Hosted) => serve_invocations(config).await,
        (Command::Serve, ExecutionMode::Daemon) => run_daemon(config).await,
    }
}

async fn run_daemon(config: Arc<GatewayConfig>) -> ExitCode {
    let database = database::from_config(&config.database);
    let orchestrator = Orchestrator::new(config, database, routes::api());

    match orchestrator.run(signals::termination()).await {
        Ok(Termination::Clean) => ExitCode::SUCCESS,
        Ok(Termination::Forced { abandoned }) => {
            tracing::error!(abandoned, "Forced exit after drain deadline");
            std::process::exit(1)
        }
        Err(e) => {
            tracing::error!(error = %e, "Gateway failed");
            ExitCode::FAILURE
        }
    }
}

fn hosted_gateway(config: Arc<GatewayConfig>) -> HostedGateway {
    let database = database::from_config(&config.database);
    HostedGateway::new(config, database, routes::api())
}

async fn serve_invocations(config: Arc<GatewayConfig>) -> ExitCode {
    let gateway = hosted_gateway(config);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read invocation");
                return ExitCode::FAILURE;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let result = dispatch(&gateway, &line).await;
        if let Err(e) = write_result(&mut stdout, &result).await {
            tracing::error!(error = %e, "Failed to write invocation result");
            return ExitCode::FAILURE;
        }
    }
}

async fn invoke_once(config: Arc<GatewayConfig>) -> ExitCode {
    let gateway = hosted_gateway(config);
    let mut input = String::new();
    let mut stdin = BufReader::new(tokio::io::stdin());
    if let Err(e) = tokio::io::AsyncReadExt::read_to_string(&mut stdin, &mut input).await {
        tracing::error!(error = %e, "Failed to read invocation");
        return ExitCode::FAILURE;
    }

    let result = dispatch(&gateway, &input).await;
    match write_result(&mut tokio::io::stdout(), &result).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Failed to write invocation result");
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(gateway: &HostedGateway, raw: &str) -> InvocationResult {
    match serde_json::from_str::<InvocationEvent>(raw) {
        Ok(event) => gateway.invoke(event).await,
        Err(e) => InvocationResult::rejected(&format!("invalid invocation event: {e}")),
    }
}

async fn write_result(
    stdout: &mut tokio::io::Stdout,
    result: &InvocationResult,
) -> std::io::Result<()> {
    let mut line = serde_json::to_vec(result).map_err(std::io::Error::other)?;
    line.push(b'\n');
    stdout.write_all(&line).await?;
    stdout.flush().await
}

//! Carbon verification daemon: entry point for the verification service.

mod config;
mod shutdown;

use anyhow::Context;
use carbon_rpc::RpcServer;
use carbon_types::{CreditId, RequestMode};
use carbon_utils::{init_logging, LogFormat};
use carbon_verification::VerificationCoordinator;
use clap::Parser;
use config::DaemonConfig;
use shutdown::ShutdownController;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "carbon-daemon", about = "Cross-registry carbon credit verification daemon")]
struct Cli {
    /// Path to a TOML configuration file. CLI flags and env vars override
    /// the file's settings.
    #[arg(long, env = "CARBON_CONFIG")]
    config: Option<PathBuf>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "CARBON_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "CARBON_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// RPC server port.
    #[arg(long, env = "CARBON_RPC_PORT")]
    rpc_port: Option<u16>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Serve the RPC API until SIGINT/SIGTERM.
    Run,
    /// Verify one credit and print its final state as JSON.
    Verify {
        /// Credit identifier (token id or registry-neutral string).
        credit: String,

        /// Name recorded as the requester.
        #[arg(long, default_value = "cli")]
        requester: String,

        /// Re-verify even if the credit is already resolved.
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => DaemonConfig::from_toml_file(path)?,
        None => DaemonConfig::default(),
    };
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }
    if let Some(port) = cli.rpc_port {
        config.rpc_port = port;
    }

    init_logging(config.log_format, &config.log_level);
    if let Some(path) = &cli.config {
        tracing::info!(path = %path.display(), "loaded config");
    }

    let coordinator = config
        .build_coordinator()
        .context("failed to set up verification")?;

    match cli.command {
        Command::Run => run(&config, coordinator).await,
        Command::Verify {
            credit,
            requester,
            force,
        } => verify(coordinator, &credit, requester, force).await,
    }
}

async fn run(config: &DaemonConfig, coordinator: VerificationCoordinator) -> anyhow::Result<()> {
    tracing::info!(
        rpc_port = config.rpc_port,
        registries = ?coordinator.registries().sources(),
        ledger = config.publish.ledger_endpoint.as_deref().unwrap_or("log"),
        "starting carbon verification daemon"
    );

    let shutdown = Arc::new(ShutdownController::new());
    let server = RpcServer::new(config.rpc_port, coordinator);
    let listener = server.bind().await?;

    let signals = Arc::clone(&shutdown);
    tokio::spawn(async move { signals.wait_for_signal().await });

    server.serve(listener, shutdown.signalled()).await?;
    tracing::info!("carbon daemon exited cleanly");
    Ok(())
}

async fn verify(
    coordinator: VerificationCoordinator,
    credit: &str,
    requester: String,
    force: bool,
) -> anyhow::Result<()> {
    let credit = CreditId::new(credit)?;
    let outcome = coordinator
        .request_verification(credit.clone(), requester, RequestMode::from_force(force))
        .await;

    // The final state is printed even when publication failed.
    let state = coordinator.status(&credit).await;
    println!("{}", serde_json::to_string_pretty(&state)?);

    let result = outcome?;
    tracing::debug!(disposition = ?result.disposition, "verification finished");
    Ok(())
}

use std::sync::Arc;
use std::time::Duration;

use clap::Parser as _;
use dotenvy::dotenv;
use orchestrator::cli::{Cli, Commands, RunCmd};
use orchestrator::core::config::Config;
use orchestrator::core::shutdown::ShutdownCoordinator;
use orchestrator::server::setup_server;
use orchestrator::types::constant::ORCHESTRATOR_VERSION;
use orchestrator::utils::logging::init_logging;
use orchestrator::utils::signal_handler::SignalHandler;
use orchestrator::worker::WorkerController;
use orchestrator::OrchestratorResult;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Slack on top of the worker grace period for closing the server, queue and broker
const SHUTDOWN_MARGIN: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { run_command } => {
            if let Err(e) = run_orchestrator(&run_command).await {
                error!(error = %e, error_chain = ?e, "Orchestrator service failed");
                std::process::exit(1);
            }
        }
    }
}

async fn run_orchestrator(run_cmd: &RunCmd) -> OrchestratorResult<()> {
    info!(version = ORCHESTRATOR_VERSION, "Starting orchestrator service");
    let mut signal_handler = SignalHandler::new();

    // The broker connection retries forever, a signal must still be able to stop startup
    let config = tokio::select! {
        signal = signal_handler.wait_for_shutdown() => {
            warn!(signal = %signal, "Shutdown requested before startup finished");
            return Ok(());
        }
        config = Config::from_run_cmd(run_cmd, CancellationToken::new()) => Arc::new(config?),
    };
    debug!("Configuration initialized");

    let mut coordinator = ShutdownCoordinator::new(config.clone());
    if config.service_params().runs_api() {
        let (address, server) = setup_server(config.clone(), Some(signal_handler.get_shutdown_trigger())).await?;
        debug!(address = %address, "Application router initialized");
        coordinator = coordinator.with_server(server);
    }
    if config.service_params().runs_workers() {
        let mut workers = WorkerController::new(config.clone());
        workers.start();
        coordinator = coordinator.with_workers(workers);
    }
    info!(role = %config.service_params().role, "Orchestrator service started");

    signal_handler.wait_for_shutdown().await;

    let deadline = config.service_params().shutdown_grace + SHUTDOWN_MARGIN;
    signal_handler
        .handle_graceful_shutdown(
            || async move {
                let report = coordinator.shutdown().await;
                if !report.workers_drained {
                    warn!("Some executions did not finish within the grace period");
                }
                Ok(())
            },
            deadline,
        )
        .await?;

    info!("Orchestrator service shut down");
    Ok(())
}

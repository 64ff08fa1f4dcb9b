use clap::{Parser, Subcommand};

pub mod prover;
pub mod queue;
pub mod redis;
pub mod server;
pub mod service;

pub(crate) fn parse_positive_u64(s: &str) -> Result<u64, String> {
    let value: u64 = s.parse().map_err(|_| format!("'{}' is not a valid number", s))?;
    if value == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(value)
}

pub(crate) fn parse_positive_usize(s: &str) -> Result<usize, String> {
    let value: usize = s.parse().map_err(|_| format!("'{}' is not a valid number", s))?;
    if value == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(value)
}

#[derive(Parser, Debug)]
#[command(
    name = "proof-orchestrator",
    about = "Proof Orchestrator - queued proof generation with leased workers",
    after_help = "Examples:\n  \
    REDIS_URL=redis://localhost:6379 API_KEY=secret proof-orchestrator run\n  \
    proof-orchestrator run --role worker --worker-concurrency 4"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the orchestrator service
    Run {
        #[command(flatten)]
        run_command: Box<RunCmd>,
    },
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct RunCmd {
    #[clap(flatten, next_help_heading = "Broker")]
    pub redis_args: redis::RedisCliArgs,

    #[clap(flatten, next_help_heading = "Queue")]
    pub queue_args: queue::QueueCliArgs,

    #[clap(flatten, next_help_heading = "Prover")]
    pub prover_args: prover::ProverCliArgs,

    #[clap(flatten, next_help_heading = "Server")]
    pub server_args: server::ServerCliArgs,

    #[clap(flatten, next_help_heading = "Service")]
    pub service_args: service::ServiceCliArgs,
}

use std::sync::Arc;

use proof_native_prover::NativeProver;
use proof_prover_client_interface::ProverClient;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::RunCmd;
use crate::core::client::broker::BrokerClient;
use crate::core::client::queue::redis::RedisJobQueue;
use crate::core::client::queue::QueueClient;
use crate::types::params::{ProverParams, QueueParams, RedisParams, ServerParams, ServiceParams};
use crate::OrchestratorResult;

/// Process-scoped state, built once at startup and shared as `Arc<Config>`.
pub struct Config {
    queue_params: QueueParams,
    prover_params: ProverParams,
    server_params: ServerParams,
    service_params: ServiceParams,
    /// `None` when the queue does not need a broker (in-memory queue)
    broker: Option<Arc<BrokerClient>>,
    queue: Arc<dyn QueueClient>,
    prover: Arc<dyn ProverClient>,
}

impl Config {
    pub fn new(
        queue_params: QueueParams,
        prover_params: ProverParams,
        server_params: ServerParams,
        service_params: ServiceParams,
        broker: Option<Arc<BrokerClient>>,
        queue: Arc<dyn QueueClient>,
        prover: Arc<dyn ProverClient>,
    ) -> Self {
        Self { queue_params, prover_params, server_params, service_params, broker, queue, prover }
    }

    /// Builds the configuration from the `run` command.
    ///
    /// Connecting to the broker retries until it succeeds, so this only returns early on a
    /// configuration error or when `cancel` fires.
    pub async fn from_run_cmd(run_cmd: &RunCmd, cancel: CancellationToken) -> OrchestratorResult<Self> {
        let redis_params = RedisParams::from(run_cmd.redis_args.clone());
        let queue_params = QueueParams::try_from(run_cmd.queue_args.clone())?;
        let prover_params = ProverParams::from(run_cmd.prover_args.clone());
        let server_params = ServerParams::from(run_cmd.server_args.clone());
        let service_params = ServiceParams::from(run_cmd.service_args.clone());

        if server_params.api_key.is_none() && service_params.runs_api() {
            warn!("No API key configured, every admission and status request will be rejected");
        }

        let broker = Arc::new(BrokerClient::connect(&redis_params, cancel).await?);
        let queue: Arc<dyn QueueClient> = Arc::new(RedisJobQueue::new(broker.connection(), queue_params.clone()));
        let prover: Arc<dyn ProverClient> =
            Arc::new(NativeProver::new(prover_params.binary.clone(), prover_params.proving_key.clone()));

        info!(
            role = %service_params.role,
            queue = %queue_params.name,
            max_attempts = queue_params.max_attempts,
            lease_secs = queue_params.lease_duration.as_secs(),
            "Configuration loaded"
        );

        Ok(Self::new(queue_params, prover_params, server_params, service_params, Some(broker), queue, prover))
    }

    pub fn queue_params(&self) -> &QueueParams {
        &self.queue_params
    }

    pub fn prover_params(&self) -> &ProverParams {
        &self.prover_params
    }

    pub fn server_config(&self) -> &ServerParams {
        &self.server_params
    }

    pub fn service_params(&self) -> &ServiceParams {
        &self.service_params
    }

    pub fn queue(&self) -> Arc<dyn QueueClient> {
        self.queue.clone()
    }

    pub fn prover(&self) -> Arc<dyn ProverClient> {
        self.prover.clone()
    }

    pub fn broker(&self) -> Option<&Arc<BrokerClient>> {
        self.broker.as_ref()
    }

    /// Whether the broker currently answers. Always true without a broker.
    pub fn broker_ready(&self) -> bool {
        self.broker.as_ref().map(|broker| broker.is_ready()).unwrap_or(true)
    }

    pub fn ready_signal(&self) -> Option<watch::Receiver<bool>> {
        self.broker.as_ref().map(|broker| broker.ready_signal())
    }
}

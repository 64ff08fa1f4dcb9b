pub mod error;
pub mod middleware;
pub mod route;
pub mod types;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::core::config::Config;
use crate::server::route::server_router;
use crate::types::params::ServerParams;
use crate::{OrchestratorError, OrchestratorResult};

pub use error::{JobRouteError, JobRouteResult};

/// Handle for managing the HTTP server lifecycle.
pub struct ServerHandle {
    shutdown_token: CancellationToken,
    task_handle: JoinHandle<()>,
}

impl ServerHandle {
    /// Stops accepting new connections and waits for in-flight requests to finish.
    pub async fn shutdown(self) -> Result<(), tokio::task::JoinError> {
        info!("Initiating server graceful shutdown");
        self.shutdown_token.cancel();
        self.task_handle.await
    }

    /// True once the server task has exited, for whatever reason
    pub fn is_finished(&self) -> bool {
        self.task_handle.is_finished()
    }
}

/// Binds the listener and serves the admission and status routes on a background task.
///
/// `on_exit` is notified if the server stops on its own, so the process can shut down with it.
pub async fn setup_server(
    config: Arc<Config>,
    on_exit: Option<Arc<tokio::sync::Notify>>,
) -> OrchestratorResult<(SocketAddr, ServerHandle)> {
    let (api_server_url, listener) = get_server_url(config.server_config()).await?;

    let shutdown_token = CancellationToken::new();
    let server_token = shutdown_token.clone();

    let app = server_router(config.clone());
    let task_handle = tokio::spawn(async move {
        let served = axum::serve(listener, app).with_graceful_shutdown(server_token.clone().cancelled_owned()).await;
        if let Err(e) = served {
            error!(error = %e, "HTTP server stopped with an error");
        }
        if !server_token.is_cancelled() {
            if let Some(notify) = on_exit {
                notify.notify_one();
            }
        }
    });

    info!(address = %api_server_url, "Listening for admission and status requests");
    Ok((api_server_url, ServerHandle { shutdown_token, task_handle }))
}

pub(crate) async fn get_server_url(
    server_params: &ServerParams,
) -> OrchestratorResult<(SocketAddr, tokio::net::TcpListener)> {
    // Tests bind port 0 so parallel servers never collide
    let port = if cfg!(test) { 0 } else { server_params.port };

    let address = format!("{}:{}", server_params.host, port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|e| OrchestratorError::ServerError(format!("failed to bind {address}: {e}")))?;
    let api_server_url = listener
        .local_addr()
        .map_err(|e| OrchestratorError::ServerError(format!("failed to read bound address: {e}")))?;

    Ok((api_server_url, listener))
}

pub mod error;

use std::sync::Mutex;

pub use error::BrokerError;
use redis::aio::ConnectionManager;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::types::params::RedisParams;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Lifecycle notifications of the broker connection.
#[derive(Debug, Clone, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum BrokerEvent {
    Connecting,
    Connected,
    Closed,
    Error(String),
}

/// Long-lived connection to the Redis broker.
///
/// The initial connection is retried forever with a linear, capped backoff. Once connected, a
/// monitor task probes the connection and flips the ready signal whenever the broker goes away
/// or comes back. The `ConnectionManager` itself reconnects transparently on the next command.
pub struct BrokerClient {
    connection: ConnectionManager,
    ready: watch::Receiver<bool>,
    events: broadcast::Sender<BrokerEvent>,
    monitor_token: CancellationToken,
    monitor: Mutex<Option<JoinHandle<()>>>,
    endpoint: String,
}

impl std::fmt::Debug for BrokerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerClient").field("endpoint", &self.endpoint).field("ready", &self.is_ready()).finish()
    }
}

impl BrokerClient {
    /// Connects to the broker, retrying until it succeeds or `cancel` fires.
    ///
    /// Fails fast with [`BrokerError::MissingUrl`] when no URL is configured.
    pub async fn connect(params: &RedisParams, cancel: CancellationToken) -> Result<Self, BrokerError> {
        let url = params.url.as_deref().ok_or(BrokerError::MissingUrl)?;
        let client = redis::Client::open(url).map_err(BrokerError::InvalidUrl)?;
        let endpoint = redacted_endpoint(url);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let mut attempt: u32 = 0;
        let connection = loop {
            attempt = attempt.saturating_add(1);
            emit(&events, &endpoint, BrokerEvent::Connecting);

            let result = tokio::select! {
                _ = cancel.cancelled() => return Err(BrokerError::Cancelled),
                result = ConnectionManager::new(client.clone()) => result,
            };

            match result {
                Ok(connection) => break connection,
                Err(e) => {
                    emit(&events, &endpoint, BrokerEvent::Error(e.to_string()));
                    let delay = params.backoff_delay(attempt);
                    warn!(
                        endpoint = %endpoint,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Broker unreachable, retrying"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(BrokerError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        };
        emit(&events, &endpoint, BrokerEvent::Connected);

        let (ready_tx, ready) = watch::channel(true);
        let monitor_token = CancellationToken::new();
        let monitor = tokio::spawn(monitor_connection(
            connection.clone(),
            params.clone(),
            ready_tx,
            events.clone(),
            endpoint.clone(),
            monitor_token.clone(),
        ));

        Ok(Self { connection, ready, events, monitor_token, monitor: Mutex::new(Some(monitor)), endpoint })
    }

    /// A cheap handle onto the shared multiplexed connection
    pub fn connection(&self) -> ConnectionManager {
        self.connection.clone()
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    pub fn ready_signal(&self) -> watch::Receiver<bool> {
        self.ready.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BrokerEvent> {
        self.events.subscribe()
    }

    /// Stops the health monitor and marks the connection closed.
    pub async fn close(&self) {
        self.monitor_token.cancel();
        let handle = self.monitor.lock().ok().and_then(|mut guard| guard.take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "Broker monitor task panicked");
            }
        }
        emit(&self.events, &self.endpoint, BrokerEvent::Closed);
    }
}

async fn monitor_connection(
    mut connection: ConnectionManager,
    params: RedisParams,
    ready_tx: watch::Sender<bool>,
    events: broadcast::Sender<BrokerEvent>,
    endpoint: String,
    token: CancellationToken,
) {
    let mut failures: u32 = 0;
    loop {
        let delay = if failures == 0 { params.health_check_interval } else { params.backoff_delay(failures) };
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }

        let ping: Result<String, redis::RedisError> = redis::cmd("PING").query_async(&mut connection).await;
        match ping {
            Ok(_) => {
                if failures > 0 {
                    info!(endpoint = %endpoint, failures, "Broker connection restored");
                    emit(&events, &endpoint, BrokerEvent::Connected);
                }
                failures = 0;
                ready_tx.send_replace(true);
            }
            Err(e) => {
                failures = failures.saturating_add(1);
                if failures == 1 {
                    emit(&events, &endpoint, BrokerEvent::Error(e.to_string()));
                    ready_tx.send_replace(false);
                }
                emit(&events, &endpoint, BrokerEvent::Connecting);
            }
        }
    }
    ready_tx.send_replace(false);
    debug!(endpoint = %endpoint, "Broker monitor stopped");
}

fn emit(events: &broadcast::Sender<BrokerEvent>, endpoint: &str, event: BrokerEvent) {
    match &event {
        BrokerEvent::Connecting => debug!(endpoint = %endpoint, "Connecting to broker"),
        BrokerEvent::Connected => info!(endpoint = %endpoint, "Connected to broker"),
        BrokerEvent::Closed => info!(endpoint = %endpoint, "Broker connection closed"),
        BrokerEvent::Error(e) => error!(endpoint = %endpoint, error = %e, "Broker connection error"),
    }
    // No subscribers is fine, the event is already logged.
    let _ = events.send(event);
}

/// Scheme, host and port of a broker URL, without credentials
fn redacted_endpoint(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => format!(
            "{}://{}:{}",
            parsed.scheme(),
            parsed.host_str().unwrap_or("unknown"),
            parsed.port().unwrap_or(6379)
        ),
        Err(_) => "unparseable".to_string(),
    }
}

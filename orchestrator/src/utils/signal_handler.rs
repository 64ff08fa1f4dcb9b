use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::signal;
use tokio::sync::Notify;
use tracing::{error, info, warn};

#[cfg(unix)]
use signal::unix::{signal, SignalKind};

/// Signal types that can trigger shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGTERM - platform-initiated shutdown (dyno restart, container stop)
    Terminate,
    /// SIGINT - Ctrl+C interactive shutdown
    Interrupt,
    /// SIGQUIT - Quit signal
    Quit,
    /// Internal - Application-triggered shutdown (e.g. the HTTP server died)
    Internal,
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownSignal::Terminate => write!(f, "SIGTERM"),
            ShutdownSignal::Interrupt => write!(f, "SIGINT"),
            ShutdownSignal::Quit => write!(f, "SIGQUIT"),
            ShutdownSignal::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// Signal handler for graceful shutdown
pub struct SignalHandler {
    shutdown_signal: Option<ShutdownSignal>,
    internal_shutdown_notify: Arc<Notify>,
}

impl SignalHandler {
    pub fn new() -> Self {
        Self { shutdown_signal: None, internal_shutdown_notify: Arc::new(Notify::new()) }
    }

    /// Get a handle to trigger internal shutdown
    pub fn get_shutdown_trigger(&self) -> Arc<Notify> {
        self.internal_shutdown_notify.clone()
    }

    /// Wait for any shutdown signal and return which one was received
    pub async fn wait_for_shutdown(&mut self) -> ShutdownSignal {
        let signal = self.wait_for_signal().await;
        self.shutdown_signal = Some(signal);
        info!(signal = %signal, "Received shutdown signal");
        signal
    }

    /// Get the signal that triggered shutdown (if any)
    pub fn shutdown_signal(&self) -> Option<ShutdownSignal> {
        self.shutdown_signal
    }

    #[cfg(unix)]
    async fn wait_for_signal(&self) -> ShutdownSignal {
        let mut sigterm = signal(SignalKind::terminate()).expect("Failed to create SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("Failed to create SIGINT handler");
        let mut sigquit = signal(SignalKind::quit()).expect("Failed to create SIGQUIT handler");

        info!("Signal handler initialized, listening for SIGTERM, SIGINT, SIGQUIT and internal shutdown requests");

        tokio::select! {
            _ = sigterm.recv() => ShutdownSignal::Terminate,
            _ = sigint.recv() => ShutdownSignal::Interrupt,
            _ = sigquit.recv() => {
                warn!("Force quit signal received (SIGQUIT)");
                ShutdownSignal::Quit
            }
            _ = self.internal_shutdown_notify.notified() => {
                warn!("Internal application shutdown requested");
                ShutdownSignal::Internal
            }
        }
    }

    #[cfg(not(unix))]
    async fn wait_for_signal(&self) -> ShutdownSignal {
        info!("Signal handler initialized, listening for Ctrl+C and internal shutdown requests");

        tokio::select! {
            _ = signal::ctrl_c() => ShutdownSignal::Interrupt,
            _ = self.internal_shutdown_notify.notified() => {
                warn!("Internal application shutdown requested");
                ShutdownSignal::Internal
            }
        }
    }

    /// Runs `shutdown_fn` under a hard deadline.
    ///
    /// On SIGQUIT a missed deadline exits the process immediately, otherwise it is reported as an error.
    pub async fn handle_graceful_shutdown<F, Fut>(&self, shutdown_fn: F, timeout: Duration) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<()>>,
    {
        let signal = self.shutdown_signal.unwrap_or(ShutdownSignal::Interrupt);
        info!(signal = %signal, timeout_secs = timeout.as_secs(), "Starting graceful shutdown");

        match tokio::time::timeout(timeout, shutdown_fn()).await {
            Ok(Ok(())) => {
                info!("Graceful shutdown completed successfully");
                Ok(())
            }
            Ok(Err(e)) => {
                error!(error = %e, "Graceful shutdown failed");
                Err(e)
            }
            Err(_) => {
                error!(timeout_secs = timeout.as_secs(), "Graceful shutdown timed out");
                if signal == ShutdownSignal::Quit {
                    warn!("SIGQUIT received, forcing immediate exit");
                    std::process::exit(1);
                }
                Err(anyhow!("Shutdown timeout exceeded"))
            }
        }
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

//! Periodic liveness ping.
//!
//! The server shuts itself down when pings stop, so a session keeps one
//! running for as long as it is open.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use docchat_core::{defaults, Error, KnowledgeApi, Result};

/// Heartbeat configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatConfig {
    pub enabled: bool,
    pub interval_ms: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: defaults::HEARTBEAT_INTERVAL_MS,
        }
    }
}

impl HeartbeatConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `DOCCHAT_HEARTBEAT` | `true` | Enable the heartbeat |
    /// | `DOCCHAT_HEARTBEAT_MS` | `2000` | Interval between pings |
    pub fn from_env() -> Self {
        let enabled = std::env::var("DOCCHAT_HEARTBEAT")
            .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "no" | "off"))
            .unwrap_or(true);

        let interval_ms = std::env::var("DOCCHAT_HEARTBEAT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults::HEARTBEAT_INTERVAL_MS);

        Self {
            enabled,
            interval_ms,
        }
    }

    pub fn with_interval_ms(mut self, ms: u64) -> Self {
        self.interval_ms = ms.max(1);
        self
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Handle for a running heartbeat.
pub struct HeartbeatHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<u64>,
}

impl HeartbeatHandle {
    /// Stop pinging and return how many pings were sent.
    pub async fn shutdown(self) -> Result<u64> {
        // The task may already have exited; the join below still reports.
        let _ = self.shutdown_tx.send(()).await;
        self.task
            .await
            .map_err(|e| Error::Internal(format!("Heartbeat task failed: {}", e)))
    }
}

/// Start pinging `api` on the configured interval.
///
/// Returns `None` when the heartbeat is disabled. Ping failures are logged
/// at debug level and otherwise ignored.
pub fn spawn_heartbeat(
    api: Arc<dyn KnowledgeApi>,
    config: &HeartbeatConfig,
) -> Option<HeartbeatHandle> {
    if !config.enabled {
        info!(subsystem = "heartbeat", "Heartbeat disabled");
        return None;
    }

    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
    let period = Duration::from_millis(config.interval_ms.max(1));

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut sent = 0u64;

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = ticker.tick() => {
                    sent += 1;
                    if let Err(e) = api.heartbeat().await {
                        debug!(subsystem = "heartbeat", error = %e, "Heartbeat failed");
                    }
                }
            }
        }

        debug!(subsystem = "heartbeat", pings = sent, "Heartbeat stopped");
        sent
    });

    Some(HeartbeatHandle { shutdown_tx, task })
}

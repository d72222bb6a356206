//! Registry of connected log clients and fan-out of log lines

use async_trait::async_trait;
use futures::future::join_all;
use scholar_common::metrics;
use scholar_common::models::LogMessage;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

pub type ConnectionId = Uuid;

/// Default bound on one client send
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(2);

/// A send to a client failed; the client is considered gone
#[derive(Debug, thiserror::Error)]
#[error("log client unreachable: {0}")]
pub struct SinkClosed(pub String);

/// Outbound half of one client connection
#[async_trait]
pub trait LogSink: Send + Sync {
    async fn send(&self, message: &LogMessage) -> Result<(), SinkClosed>;
}

/// Outcome of one broadcast round
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    /// Connections removed because their send failed
    pub pruned: Vec<ConnectionId>,
}

/// Connection registry shared by the WebSocket sessions and the broadcaster
pub struct LogHub {
    connections: RwLock<Vec<(ConnectionId, Arc<dyn LogSink>)>>,
    send_timeout: Duration,
}

impl Default for LogHub {
    fn default() -> Self {
        Self::with_send_timeout(DEFAULT_SEND_TIMEOUT)
    }
}

impl LogHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// A client whose send does not finish within `send_timeout` is treated
    /// as gone
    pub fn with_send_timeout(send_timeout: Duration) -> Self {
        Self {
            connections: RwLock::new(Vec::new()),
            send_timeout,
        }
    }

    pub async fn register(&self, sink: Arc<dyn LogSink>) -> ConnectionId {
        let id = Uuid::new_v4();
        let count = {
            let mut connections = self.connections.write().await;
            connections.push((id, sink));
            connections.len()
        };
        metrics::set_log_connections(count);
        info!(connection_id = %id, connections = count, "Log client connected");
        id
    }

    /// Remove a connection; unknown ids are ignored
    pub async fn unregister(&self, id: ConnectionId) -> bool {
        let (removed, count) = {
            let mut connections = self.connections.write().await;
            let before = connections.len();
            connections.retain(|(existing, _)| *existing != id);
            (connections.len() != before, connections.len())
        };
        if removed {
            metrics::set_log_connections(count);
            info!(connection_id = %id, connections = count, "Log client disconnected");
        }
        removed
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Send `message` to every connection registered at call time.
    ///
    /// Sends run concurrently against a snapshot of the registry, each bounded
    /// by the send timeout; failed or stalled connections are unregistered
    /// once all sends have finished.
    pub async fn broadcast(&self, message: &LogMessage) -> BroadcastReport {
        let snapshot = self.connections.read().await.clone();
        if snapshot.is_empty() {
            return BroadcastReport::default();
        }

        let send_timeout = self.send_timeout;
        let outcomes = join_all(snapshot.iter().map(|(id, sink)| async move {
            match tokio::time::timeout(send_timeout, sink.send(message)).await {
                Ok(Ok(())) => None,
                Ok(Err(e)) => {
                    debug!(connection_id = %id, error = %e, "Dropping log client");
                    Some(*id)
                }
                Err(_) => {
                    debug!(
                        connection_id = %id,
                        timeout_ms = send_timeout.as_millis() as u64,
                        "Dropping stalled log client"
                    );
                    Some(*id)
                }
            }
        }))
        .await;

        let pruned: Vec<ConnectionId> = outcomes.into_iter().flatten().collect();
        for id in &pruned {
            self.unregister(*id).await;
        }

        let report = BroadcastReport {
            delivered: snapshot.len() - pruned.len(),
            pruned,
        };
        metrics::record_log_broadcast(report.delivered, report.pruned.len(), self.connection_count().await);
        report
    }

    /// Drain formatted log lines into broadcasts until every sender is gone
    pub fn spawn_broadcaster(self: &Arc<Self>, mut rx: mpsc::Receiver<String>) -> JoinHandle<()> {
        let hub = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(line) = rx.recv().await {
                hub.broadcast(&LogMessage::log(line)).await;
            }
            debug!("Log queue closed, broadcaster stopping");
        })
    }

    /// Forget every connection. Sessions notice on their next failed send.
    pub async fn shutdown(&self) {
        let count = {
            let mut connections = self.connections.write().await;
            let count = connections.len();
            connections.clear();
            count
        };
        metrics::set_log_connections(0);
        info!(connections = count, "Log hub shut down");
    }
}

//! WebSocket session streaming log lines to one client

use super::hub::{LogHub, LogSink, SinkClosed};
use crate::AppState;
use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use scholar_common::models::LogMessage;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const GREETING: &str = "WebSocket connection established successfully";

/// `GET /ws/logs`
pub async fn ws_logs(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let hub = state.hub.clone();
    let keepalive = Duration::from_secs(state.config.logstream.keepalive_secs.max(1));
    info!("WebSocket upgrade requested for log stream");
    ws.on_upgrade(move |socket: WebSocket| {
        let (sender, receiver) = socket.split();
        run_session(sender, receiver, hub, keepalive)
    })
}

/// Outbound half of a socket, shared by the hub and the session loop
pub struct SocketSink<W> {
    inner: Mutex<W>,
}

impl<W> SocketSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner: Mutex::new(inner) }
    }
}

#[async_trait]
impl<W> LogSink for SocketSink<W>
where
    W: Sink<Message, Error = axum::Error> + Unpin + Send,
{
    async fn send(&self, message: &LogMessage) -> Result<(), SinkClosed> {
        let payload = serde_json::to_string(message).map_err(|e| SinkClosed(e.to_string()))?;
        self.inner
            .lock()
            .await
            .send(Message::Text(payload.into()))
            .await
            .map_err(|e| SinkClosed(e.to_string()))
    }
}

/// Register with the hub, greet, then keep the connection alive until the
/// client leaves or a send fails
pub async fn run_session<W, R>(sender: W, mut receiver: R, hub: Arc<LogHub>, keepalive: Duration)
where
    W: Sink<Message, Error = axum::Error> + Unpin + Send + 'static,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin + Send,
{
    let sink = Arc::new(SocketSink::new(sender));
    let id = hub.register(sink.clone()).await;

    if let Err(e) = sink.send(&LogMessage::log(GREETING)).await {
        warn!(connection_id = %id, error = %e, "Failed to greet log client");
        hub.unregister(id).await;
        return;
    }

    loop {
        match tokio::time::timeout(keepalive, receiver.next()).await {
            Err(_) => {
                if let Err(e) = sink.send(&LogMessage::ping()).await {
                    debug!(connection_id = %id, error = %e, "Ping failed, client gone");
                    break;
                }
            }
            Ok(Some(Ok(Message::Text(text)))) => match serde_json::from_str::<LogMessage>(text.as_str()) {
                Ok(LogMessage::Pong { .. }) => debug!(connection_id = %id, "Pong received"),
                Ok(other) => debug!(connection_id = %id, message = ?other, "Ignoring client message"),
                Err(_) => debug!(connection_id = %id, "Ignoring non-JSON client text"),
            },
            Ok(Some(Ok(Message::Close(_)))) | Ok(None) => {
                info!(connection_id = %id, "Log client closed the connection");
                break;
            }
            Ok(Some(Ok(_))) => {}
            Ok(Some(Err(e))) => {
                debug!(connection_id = %id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    hub.unregister(id).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc;

    type Outbound = mpsc::UnboundedReceiver<Message>;
    type Inbound = mpsc::UnboundedSender<Result<Message, axum::Error>>;

    fn spawn_session(hub: Arc<LogHub>, keepalive: Duration) -> (Outbound, Inbound, tokio::task::JoinHandle<()>) {
        let (out_tx, out_rx) = mpsc::unbounded::<Message>();
        let (in_tx, in_rx) = mpsc::unbounded::<Result<Message, axum::Error>>();
        let sender = out_tx.sink_map_err(axum::Error::new);
        let handle = tokio::spawn(run_session(sender, in_rx, hub, keepalive));
        (out_rx, in_tx, handle)
    }

    async fn next_json(outbound: &mut Outbound) -> LogMessage {
        match outbound.next().await {
            Some(Message::Text(text)) => serde_json::from_str(text.as_str()).unwrap(),
            other => panic!("expected a text frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_greeting_and_unregister_on_close() {
        let hub = Arc::new(LogHub::new());
        let (mut outbound, inbound, handle) = spawn_session(hub.clone(), Duration::from_secs(30));

        match next_json(&mut outbound).await {
            LogMessage::Log { message, .. } => assert_eq!(message, GREETING),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(hub.connection_count().await, 1);

        inbound.unbounded_send(Ok(Message::Close(None))).unwrap();
        handle.await.unwrap();
        assert_eq!(hub.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_ping_after_idle_and_pong_accepted() {
        let hub = Arc::new(LogHub::new());
        let (mut outbound, inbound, handle) = spawn_session(hub.clone(), Duration::from_millis(20));

        next_json(&mut outbound).await;
        assert!(matches!(next_json(&mut outbound).await, LogMessage::Ping { .. }));

        inbound
            .unbounded_send(Ok(Message::Text(r#"{"type":"pong","timestamp":1}"#.into())))
            .unwrap();
        inbound.unbounded_send(Ok(Message::Text("not json".into()))).unwrap();
        assert_eq!(hub.connection_count().await, 1);

        drop(inbound);
        handle.await.unwrap();
        assert_eq!(hub.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_session() {
        let hub = Arc::new(LogHub::new());
        let (mut outbound, inbound, handle) = spawn_session(hub.clone(), Duration::from_secs(30));
        next_json(&mut outbound).await;

        hub.broadcast(&LogMessage::log("2025-01-01 00:00:00 - gateway - INFO - hi")).await;
        match next_json(&mut outbound).await {
            LogMessage::Log { message, .. } => assert!(message.ends_with("INFO - hi")),
            other => panic!("unexpected {:?}", other),
        }

        drop(inbound);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_ping_ends_session() {
        let hub = Arc::new(LogHub::new());
        let (mut outbound, _inbound, handle) = spawn_session(hub.clone(), Duration::from_millis(20));
        next_json(&mut outbound).await;

        drop(outbound);
        handle.await.unwrap();
        assert_eq!(hub.connection_count().await, 0);
    }
}

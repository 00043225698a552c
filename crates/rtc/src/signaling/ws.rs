//! WebSocket relay transport

use super::transport::{SignalingTransport, TransportEvent, TransportEvents};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use vitacall_core::{Error, Result};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Frames the client sends to the relay
#[derive(Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
enum ClientFrame<'a> {
    Publish { topic: &'a str, payload: &'a str },
    Subscribe { topic: &'a str },
    Unsubscribe { topic: &'a str },
}

/// Frames the relay delivers to the client
#[derive(Deserialize)]
struct ServerFrame {
    topic: String,
    payload: String,
}

/// [`SignalingTransport`] over a WebSocket connection to the relay
pub struct WsTransport {
    /// Relay URL (ws:// or wss://)
    url: String,

    /// Writer-task inbox for the current connection
    tx: Arc<RwLock<Option<mpsc::UnboundedSender<Message>>>>,
}

impl WsTransport {
    /// Create a transport for `url`; no connection is made until
    /// [`SignalingTransport::connect`]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            tx: Arc::new(RwLock::new(None)),
        }
    }

    async fn send_frame(&self, frame: ClientFrame<'_>) -> Result<()> {
        let json = serde_json::to_string(&frame)
            .map_err(|e| Error::Transport(format!("Failed to serialize relay frame: {}", e)))?;

        let guard = self.tx.read().await;
        let tx = guard
            .as_ref()
            .ok_or_else(|| Error::ChannelDisconnected("Relay transport not connected".to_string()))?;

        tx.send(Message::Text(json))
            .map_err(|_| Error::ChannelDisconnected("Relay writer task has stopped".to_string()))
    }

    /// Sender task: drains the outbox into the socket
    async fn sender_task(
        mut write: futures::stream::SplitSink<WsStream, Message>,
        mut rx: mpsc::UnboundedReceiver<Message>,
    ) {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = write.send(msg).await {
                error!("Failed to send relay frame: {}", e);
                break;
            }
        }

        debug!("Relay sender task terminated");
    }

    /// Receiver task: decodes inbound frames and forwards them as events
    async fn receiver_task(
        mut read: futures::stream::SplitStream<WsStream>,
        events: mpsc::UnboundedSender<TransportEvent>,
        tx_slot: Arc<RwLock<Option<mpsc::UnboundedSender<Message>>>>,
    ) {
        let reason = loop {
            match read.next().await {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<ServerFrame>(&text) {
                    Ok(frame) => {
                        let _ = events.send(TransportEvent::Frame {
                            topic: frame.topic,
                            payload: frame.payload,
                        });
                    }
                    Err(e) => {
                        warn!("Ignoring malformed relay frame: {}", e);
                    }
                },
                Some(Ok(Message::Close(_))) => {
                    info!("Relay closed the connection");
                    break "closed by relay".to_string();
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!("Relay socket error: {}", e);
                    break format!("socket error: {}", e);
                }
                None => {
                    break "stream ended".to_string();
                }
            }
        };

        *tx_slot.write().await = None;
        let _ = events.send(TransportEvent::Closed { reason });
        debug!("Relay receiver task terminated");
    }
}

#[async_trait]
impl SignalingTransport for WsTransport {
    async fn connect(&self) -> Result<TransportEvents> {
        info!("Connecting to relay: {}", self.url);

        let (ws_stream, _) = connect_async(&self.url)
            .await
            .map_err(|e| Error::Transport(format!("Failed to connect to relay: {}", e)))?;

        info!("Connected to relay");

        let (write, read) = ws_stream.split();
        let (tx, rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        *self.tx.write().await = Some(tx);

        tokio::spawn(Self::sender_task(write, rx));
        tokio::spawn(Self::receiver_task(read, event_tx, Arc::clone(&self.tx)));

        Ok(event_rx)
    }

    async fn disconnect(&self) -> Result<()> {
        let tx = self.tx.write().await.take();
        if let Some(tx) = tx {
            // Dropping the outbox after the close frame stops the
            // sender task; the receiver task ends when the socket does.
            let _ = tx.send(Message::Close(None));
            info!("Disconnecting from relay");
        }
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: String) -> Result<()> {
        self.send_frame(ClientFrame::Publish {
            topic,
            payload: &payload,
        })
        .await
    }

    async fn subscribe(&self, topic: &str) -> Result<()> {
        debug!("Subscribing to relay topic {}", topic);
        self.send_frame(ClientFrame::Subscribe { topic }).await
    }

    async fn unsubscribe(&self, topic: &str) -> Result<()> {
        debug!("Unsubscribing from relay topic {}", topic);
        self.send_frame(ClientFrame::Unsubscribe { topic }).await
    }
}

//! Transport seam between the signal channel and the relay
//!
//! The channel is written against this trait so tests can swap the
//! WebSocket client for an in-memory relay and drive whole scenarios
//! without a network.

use async_trait::async_trait;
use tokio::sync::mpsc;
use vitacall_core::Result;

/// Inbound traffic and lifecycle notifications from the relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A frame delivered for a subscribed topic
    Frame {
        /// Topic the frame was published to
        topic: String,
        /// Raw payload as published
        payload: String,
    },

    /// The transport lost its connection; no further frames will arrive
    /// until the next `connect`
    Closed {
        /// Human-readable close reason
        reason: String,
    },
}

/// Stream of [`TransportEvent`]s for one transport connection
pub type TransportEvents = mpsc::UnboundedReceiver<TransportEvent>;

/// A pub/sub connection to the relay
///
/// The relay guarantees per-sender ordered, at-least-once delivery per
/// topic and broadcasts to every subscriber, the publisher included —
/// receivers must filter their own echoes.
#[async_trait]
pub trait SignalingTransport: Send + Sync {
    /// Open the connection and return its event stream
    ///
    /// Each successful call yields a fresh stream; a previous stream, if
    /// any, ends with [`TransportEvent::Closed`].
    async fn connect(&self) -> Result<TransportEvents>;

    /// Close the connection; sends fail until the next `connect`
    async fn disconnect(&self) -> Result<()>;

    /// Publish a payload to a topic
    async fn publish(&self, topic: &str, payload: String) -> Result<()>;

    /// Register interest in a topic on the current connection
    ///
    /// Subscriptions do not survive reconnection; the caller replays
    /// them after each successful `connect`.
    async fn subscribe(&self, topic: &str) -> Result<()>;

    /// Drop interest in a topic
    async fn unsubscribe(&self, topic: &str) -> Result<()>;
}

//! Relay signaling: envelope protocol, transport seam, reconnecting channel

mod channel;
mod protocol;
mod transport;
mod ws;

pub use channel::{ChannelStats, ChannelStatus, SignalChannel};
pub use protocol::{chat_topic, signal_topic, ChatSignal, IceCandidatePayload, SignalEnvelope};
pub use transport::{SignalingTransport, TransportEvent, TransportEvents};
pub use ws::WsTransport;

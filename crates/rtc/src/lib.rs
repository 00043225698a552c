//! Signaling core for VitaCall video consultations
//!
//! Everything a doctor/patient consultation needs between the UI and
//! the network:
//!
//! - **Session coordination**: [`SessionCoordinator`] runs the call
//!   phases, the waiting-room admission flow, and SDP/ICE negotiation
//! - **Signaling**: [`SignalChannel`] multiplexes per-session topics
//!   over one relay connection and reconnects with bounded backoff
//! - **Peer links**: [`PeerLink`] wraps one WebRTC peer connection
//!   behind a seam the coordinator and tests share
//! - **Media**: [`MediaSource`] acquires local tracks and gates them
//!   for mute and camera toggles
//! - **Chat**: [`ChatChannel`] carries messages, typing state, and read
//!   receipts beside the call

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chat;
pub mod media;
pub mod peer;
pub mod session;
pub mod signaling;

pub use chat::{ChatChannel, ChatEvent};
pub use media::{LocalMedia, MediaSource, SampleLocalMedia, SampleMediaConfig, SampleMediaSource};
pub use peer::{
    PeerEvent, PeerEventSender, PeerLink, PeerLinkFactory, PeerLinkState, WebRtcPeerLink,
    WebRtcPeerLinkFactory,
};
pub use session::{
    AdmissionState, CallPhase, CallSnapshot, DoctorAdmission, FailureKind, PatientAdmission,
    SessionCoordinator, SessionEvent,
};
pub use signaling::{
    ChannelStats, ChannelStatus, ChatSignal, IceCandidatePayload, SignalChannel, SignalEnvelope,
    SignalingTransport, TransportEvent, TransportEvents, WsTransport,
};

/// Get the version of this crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

//! Peer link: the negotiation surface of one peer connection
//!
//! The coordinator drives negotiation through [`PeerLink`] and receives
//! link activity through [`PeerEvent`]s, so tests can script a peer
//! without touching the WebRTC stack.

mod webrtc;

pub use self::webrtc::{WebRtcPeerLink, WebRtcPeerLinkFactory};

use crate::media::LocalMedia;
use crate::signaling::IceCandidatePayload;
use async_trait::async_trait;
use tokio::sync::mpsc;
use vitacall_core::{ConnectionQuality, Result};

/// Peer link connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerLinkState {
    /// Initial state, negotiation not yet started
    New,
    /// Negotiation or ICE checks in progress
    Connecting,
    /// Media is flowing
    Connected,
    /// Connectivity lost, may recover
    Disconnected,
    /// Connection failed
    Failed,
    /// Connection closed
    Closed,
}

impl PeerLinkState {
    /// Quality estimate implied by entering this state, if any
    pub fn quality(&self) -> Option<ConnectionQuality> {
        match self {
            PeerLinkState::Connected => Some(ConnectionQuality::Good),
            PeerLinkState::Disconnected | PeerLinkState::Failed => Some(ConnectionQuality::Poor),
            _ => None,
        }
    }
}

/// Activity reported by a peer link while negotiation runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    /// A locally discovered ICE candidate to forward to the other side
    LocalCandidate(IceCandidatePayload),

    /// The link's connection state changed
    StateChanged(PeerLinkState),

    /// The remote side's media arrived
    RemoteTrack {
        /// Track kind, `audio` or `video`
        kind: String,
    },
}

/// Sender half used by link implementations to report [`PeerEvent`]s
pub type PeerEventSender = mpsc::UnboundedSender<PeerEvent>;

/// One peer connection, reduced to the operations negotiation needs
#[async_trait]
pub trait PeerLink: Send + Sync {
    /// Create an SDP offer and set it as the local description
    async fn create_offer(&self) -> Result<String>;

    /// Apply the remote offer, create an answer, set it locally, and
    /// return its SDP
    async fn accept_offer(&self, offer_sdp: String) -> Result<String>;

    /// Apply the remote answer
    async fn apply_answer(&self, answer_sdp: String) -> Result<()>;

    /// Apply one remote ICE candidate
    async fn add_ice_candidate(&self, candidate: IceCandidatePayload) -> Result<()>;

    /// Close the connection; further operations fail
    async fn close(&self) -> Result<()>;

    /// Current connection state
    async fn state(&self) -> PeerLinkState;
}

/// Builds a [`PeerLink`] with local media attached and events wired
#[async_trait]
pub trait PeerLinkFactory: Send + Sync {
    /// Local media handle type the factory can attach
    type Media: LocalMedia;

    /// Link type the factory produces
    type Link: PeerLink + 'static;

    /// Construct a link, attach `media`'s tracks, and wire link activity
    /// to `events`
    async fn create(&self, media: &Self::Media, events: PeerEventSender) -> Result<Self::Link>;
}

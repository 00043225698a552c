//! WebRTC-backed peer link

use crate::media::SampleLocalMedia;
use crate::peer::{PeerEvent, PeerEventSender, PeerLink, PeerLinkFactory, PeerLinkState};
use crate::signaling::IceCandidatePayload;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use vitacall_core::{CoreConfig, Error, Result};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::track::track_local::TrackLocal;

/// [`PeerLink`] over a real `webrtc::RTCPeerConnection`
///
/// Local tracks are attached at construction time; negotiation and ICE
/// exchange are driven by the caller through the trait methods, and
/// link activity flows back through the [`PeerEventSender`] given to
/// [`WebRtcPeerLinkFactory::create`].
pub struct WebRtcPeerLink {
    /// Unique identifier for this link instance
    link_id: String,

    /// Underlying WebRTC peer connection
    peer_connection: Arc<RTCPeerConnection>,

    /// Current link state
    state: Arc<RwLock<PeerLinkState>>,
}

impl WebRtcPeerLink {
    /// Create a peer connection, attach `media`'s tracks, and wire the
    /// connection callbacks to `events`
    pub async fn new(
        config: &CoreConfig,
        media: &SampleLocalMedia,
        events: PeerEventSender,
    ) -> Result<Self> {
        let link_id = uuid::Uuid::new_v4().to_string();

        info!("Creating peer link: link_id={}", link_id);

        // MediaEngine with the default codec set (Opus, VP8/VP9/H.264)
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| Error::PeerSetupFailed(format!("Failed to register codecs: {}", e)))?;

        let interceptor_registry =
            register_default_interceptors(Default::default(), &mut media_engine).map_err(|e| {
                Error::PeerSetupFailed(format!("Failed to register interceptors: {}", e))
            })?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(interceptor_registry)
            .build();

        // ICE servers from config (STUN, then TURN with credentials)
        let ice_servers: Vec<RTCIceServer> = config
            .stun_servers
            .iter()
            .map(|url| RTCIceServer {
                urls: vec![url.clone()],
                ..Default::default()
            })
            .chain(config.turn_servers.iter().map(|turn| {
                #[allow(clippy::needless_update)]
                RTCIceServer {
                    urls: vec![turn.url.clone()],
                    username: turn.username.clone(),
                    credential: turn.credential.clone(),
                    ..Default::default()
                }
            }))
            .collect();

        let rtc_config = RTCConfiguration {
            ice_servers,
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await.map_err(|e| {
            Error::PeerSetupFailed(format!("Failed to create peer connection: {}", e))
        })?);

        // Attach local tracks before negotiation so they land in the offer
        if let Some(track) = media.audio_track() {
            peer_connection
                .add_track(track as Arc<dyn TrackLocal + Send + Sync>)
                .await
                .map_err(|e| {
                    Error::PeerSetupFailed(format!("Failed to add audio track: {}", e))
                })?;
        }
        if let Some(track) = media.video_track() {
            peer_connection
                .add_track(track as Arc<dyn TrackLocal + Send + Sync>)
                .await
                .map_err(|e| {
                    Error::PeerSetupFailed(format!("Failed to add video track: {}", e))
                })?;
        }

        let state = Arc::new(RwLock::new(PeerLinkState::New));

        // Connection state changes update the shared state and surface
        // as events
        let state_clone = Arc::clone(&state);
        let link_id_clone = link_id.clone();
        let events_clone = events.clone();

        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let state_clone = Arc::clone(&state_clone);
                let link_id = link_id_clone.clone();
                let events = events_clone.clone();

                Box::pin(async move {
                    let new_state = match s {
                        RTCPeerConnectionState::New => PeerLinkState::New,
                        RTCPeerConnectionState::Connecting => PeerLinkState::Connecting,
                        RTCPeerConnectionState::Connected => PeerLinkState::Connected,
                        RTCPeerConnectionState::Disconnected => PeerLinkState::Disconnected,
                        RTCPeerConnectionState::Failed => PeerLinkState::Failed,
                        RTCPeerConnectionState::Closed => PeerLinkState::Closed,
                        _ => return,
                    };

                    let mut state_guard = state_clone.write().await;
                    let old_state = *state_guard;

                    if old_state != new_state {
                        debug!(
                            "Peer link {} state transition: {:?} -> {:?}",
                            link_id, old_state, new_state
                        );
                        *state_guard = new_state;
                        drop(state_guard);
                        let _ = events.send(PeerEvent::StateChanged(new_state));
                    }
                })
            },
        ));

        // Locally gathered candidates go out through the event channel;
        // the caller forwards them over signaling
        let link_id_clone = link_id.clone();
        let events_clone = events.clone();

        peer_connection.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let link_id = link_id_clone.clone();
            let events = events_clone.clone();

            Box::pin(async move {
                let Some(candidate) = candidate else {
                    debug!("Peer link {} finished gathering candidates", link_id);
                    return;
                };

                match candidate.to_json() {
                    Ok(init) => {
                        let payload = IceCandidatePayload {
                            candidate: init.candidate,
                            sdp_mid: init.sdp_mid,
                            sdp_m_line_index: init.sdp_mline_index,
                        };
                        let _ = events.send(PeerEvent::LocalCandidate(payload));
                    }
                    Err(e) => {
                        warn!(
                            "Peer link {} failed to serialize local candidate: {}",
                            link_id, e
                        );
                    }
                }
            })
        }));

        let link_id_clone = link_id.clone();
        let events_clone = events;

        peer_connection.on_track(Box::new(move |track, _receiver, _transceiver| {
            let link_id = link_id_clone.clone();
            let events = events_clone.clone();

            Box::pin(async move {
                let kind = track.kind().to_string();
                info!("Peer link {} received remote track: kind={}", link_id, kind);
                let _ = events.send(PeerEvent::RemoteTrack { kind });
            })
        }));

        Ok(Self {
            link_id,
            peer_connection,
            state,
        })
    }

    /// Unique identifier of this link instance
    pub fn link_id(&self) -> &str {
        &self.link_id
    }

    async fn set_state(&self, new_state: PeerLinkState) {
        let mut state = self.state.write().await;
        let old_state = *state;

        if old_state != new_state {
            debug!(
                "Peer link {} state transition: {:?} -> {:?}",
                self.link_id, old_state, new_state
            );
            *state = new_state;
        }
    }

    async fn local_sdp(&self) -> Result<String> {
        let local_desc = self
            .peer_connection
            .local_description()
            .await
            .ok_or_else(|| {
                Error::PeerSetupFailed("No local description after setting it".to_string())
            })?;
        Ok(local_desc.sdp)
    }
}

#[async_trait]
impl PeerLink for WebRtcPeerLink {
    async fn create_offer(&self) -> Result<String> {
        self.set_state(PeerLinkState::Connecting).await;

        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(|e| Error::PeerSetupFailed(format!("Failed to create offer: {}", e)))?;

        self.peer_connection
            .set_local_description(offer)
            .await
            .map_err(|e| {
                Error::PeerSetupFailed(format!("Failed to set local description: {}", e))
            })?;

        let sdp = self.local_sdp().await?;

        debug!("Peer link {} created offer", self.link_id);

        Ok(sdp)
    }

    async fn accept_offer(&self, offer_sdp: String) -> Result<String> {
        self.set_state(PeerLinkState::Connecting).await;

        let offer = RTCSessionDescription::offer(offer_sdp)
            .map_err(|e| Error::SignalHandlingFailed(format!("Failed to parse offer: {}", e)))?;

        self.peer_connection
            .set_remote_description(offer)
            .await
            .map_err(|e| {
                Error::SignalHandlingFailed(format!("Failed to set remote offer: {}", e))
            })?;

        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .map_err(|e| Error::PeerSetupFailed(format!("Failed to create answer: {}", e)))?;

        self.peer_connection
            .set_local_description(answer)
            .await
            .map_err(|e| {
                Error::PeerSetupFailed(format!("Failed to set local description: {}", e))
            })?;

        let sdp = self.local_sdp().await?;

        debug!("Peer link {} created answer", self.link_id);

        Ok(sdp)
    }

    async fn apply_answer(&self, answer_sdp: String) -> Result<()> {
        let answer = RTCSessionDescription::answer(answer_sdp)
            .map_err(|e| Error::SignalHandlingFailed(format!("Failed to parse answer: {}", e)))?;

        self.peer_connection
            .set_remote_description(answer)
            .await
            .map_err(|e| {
                Error::SignalHandlingFailed(format!("Failed to set remote answer: {}", e))
            })?;

        debug!("Peer link {} applied remote answer", self.link_id);

        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidatePayload) -> Result<()> {
        debug!(
            "Peer link {} adding remote candidate: {}",
            self.link_id, candidate.candidate
        );

        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: None,
        };

        self.peer_connection
            .add_ice_candidate(init)
            .await
            .map_err(|e| {
                Error::SignalHandlingFailed(format!("Failed to add ICE candidate: {}", e))
            })?;

        Ok(())
    }

    async fn close(&self) -> Result<()> {
        info!("Closing peer link {}", self.link_id);

        self.set_state(PeerLinkState::Closed).await;

        self.peer_connection
            .close()
            .await
            .map_err(|e| Error::PeerSetupFailed(format!("Failed to close connection: {}", e)))?;

        Ok(())
    }

    async fn state(&self) -> PeerLinkState {
        *self.state.read().await
    }
}

/// Factory producing [`WebRtcPeerLink`]s for [`SampleLocalMedia`]
pub struct WebRtcPeerLinkFactory {
    config: CoreConfig,
}

impl WebRtcPeerLinkFactory {
    /// Create a factory using `config`'s STUN/TURN servers
    pub fn new(config: CoreConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PeerLinkFactory for WebRtcPeerLinkFactory {
    type Media = SampleLocalMedia;
    type Link = WebRtcPeerLink;

    async fn create(
        &self,
        media: &SampleLocalMedia,
        events: PeerEventSender,
    ) -> Result<WebRtcPeerLink> {
        WebRtcPeerLink::new(&self.config, media, events).await
    }
}

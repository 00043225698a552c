//! Scripted peer links
//!
//! Replaces the WebRTC stack with links that hand back canned SDP and
//! record everything applied to them. Each link's probe also exposes
//! the coordinator-facing event sender, so tests can play the role of
//! the ICE layer: emit candidates, flip connection states, announce
//! remote tracks.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use vitacall_core::{Error, Result};
use vitacall_rtc::{
    IceCandidatePayload, PeerEvent, PeerEventSender, PeerLink, PeerLinkFactory, PeerLinkState,
};

use super::media::ScriptedLocalMedia;

/// Records and controls for one created link
pub struct LinkProbe {
    label: String,
    events: PeerEventSender,
    state: Mutex<PeerLinkState>,
    closed: AtomicBool,
    pub accepted_offers: Mutex<Vec<String>>,
    pub applied_answers: Mutex<Vec<String>>,
    pub applied_candidates: Mutex<Vec<String>>,
}

impl LinkProbe {
    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Inject a link event as if negotiation produced it
    pub fn emit(&self, event: PeerEvent) {
        if let PeerEvent::StateChanged(state) = &event {
            *self.state.lock() = *state;
        }
        let _ = self.events.send(event);
    }

    /// Announce a locally discovered ICE candidate
    pub fn discover_candidate(&self, candidate: &str) {
        self.emit(PeerEvent::LocalCandidate(IceCandidatePayload {
            candidate: candidate.to_string(),
            sdp_mid: Some("0".to_string()),
            sdp_m_line_index: Some(0),
        }));
    }

    /// Walk the link to `Connected` and surface a remote video track
    pub fn go_live(&self) {
        self.emit(PeerEvent::StateChanged(PeerLinkState::Connected));
        self.emit(PeerEvent::RemoteTrack {
            kind: "video".to_string(),
        });
    }
}

/// Peer link that answers with canned SDP
pub struct ScriptedLink {
    probe: Arc<LinkProbe>,
    fail_negotiation: bool,
}

#[async_trait::async_trait]
impl PeerLink for ScriptedLink {
    async fn create_offer(&self) -> Result<String> {
        if self.fail_negotiation {
            return Err(Error::PeerSetupFailed("Scripted offer failure".to_string()));
        }
        *self.probe.state.lock() = PeerLinkState::Connecting;
        Ok(format!("offer-from-{}", self.probe.label))
    }

    async fn accept_offer(&self, offer_sdp: String) -> Result<String> {
        if self.fail_negotiation {
            return Err(Error::SignalHandlingFailed(
                "Scripted answer failure".to_string(),
            ));
        }
        self.probe.accepted_offers.lock().push(offer_sdp);
        Ok(format!("answer-from-{}", self.probe.label))
    }

    async fn apply_answer(&self, answer_sdp: String) -> Result<()> {
        self.probe.applied_answers.lock().push(answer_sdp);
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidatePayload) -> Result<()> {
        self.probe.applied_candidates.lock().push(candidate.candidate);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.probe.closed.store(true, Ordering::SeqCst);
        *self.probe.state.lock() = PeerLinkState::Closed;
        Ok(())
    }

    async fn state(&self) -> PeerLinkState {
        *self.probe.state.lock()
    }
}

#[derive(Default)]
struct FactoryInner {
    counter: AtomicU32,
    fail_create: AtomicBool,
    fail_negotiation: AtomicBool,
    probes: Mutex<Vec<Arc<LinkProbe>>>,
}

/// Builds [`ScriptedLink`]s and keeps a probe for each
#[derive(Clone, Default)]
pub struct ScriptedLinkFactory {
    inner: Arc<FactoryInner>,
}

impl ScriptedLinkFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `create` calls fail with a setup error
    pub fn fail_creates(&self, fail: bool) {
        self.inner.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Make created links fail offer/answer negotiation
    pub fn fail_negotiation(&self, fail: bool) {
        self.inner.fail_negotiation.store(fail, Ordering::SeqCst);
    }

    /// Probe for the most recently created link
    pub fn latest_probe(&self) -> Arc<LinkProbe> {
        self.inner
            .probes
            .lock()
            .last()
            .cloned()
            .unwrap_or_else(|| panic!("no link has been created"))
    }

    pub fn links_created(&self) -> u32 {
        self.inner.counter.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl PeerLinkFactory for ScriptedLinkFactory {
    type Media = ScriptedLocalMedia;
    type Link = ScriptedLink;

    async fn create(&self, _media: &Self::Media, events: PeerEventSender) -> Result<Self::Link> {
        if self.inner.fail_create.load(Ordering::SeqCst) {
            return Err(Error::PeerSetupFailed(
                "Scripted link creation failure".to_string(),
            ));
        }

        let n = self.inner.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let probe = Arc::new(LinkProbe {
            label: format!("link-{}", n),
            events,
            state: Mutex::new(PeerLinkState::New),
            closed: AtomicBool::new(false),
            accepted_offers: Mutex::new(Vec::new()),
            applied_answers: Mutex::new(Vec::new()),
            applied_candidates: Mutex::new(Vec::new()),
        });
        self.inner.probes.lock().push(Arc::clone(&probe));

        Ok(ScriptedLink {
            probe,
            fail_negotiation: self.inner.fail_negotiation.load(Ordering::SeqCst),
        })
    }
}

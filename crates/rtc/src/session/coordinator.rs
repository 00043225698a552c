//! Session coordinator
//!
//! Owns one call attempt end to end: local media, the peer link, the
//! admission handshake, and the reaction to incoming envelopes. All
//! envelope, channel-status, and peer activity is funneled into one
//! control loop so events are handled strictly in arrival order.

use crate::media::{LocalMedia, MediaSource};
use crate::peer::{PeerEvent, PeerLink, PeerLinkFactory};
use crate::session::state::{
    AdmissionState, CallPhase, CallSnapshot, FailureKind, PatientAdmission, SessionEvent,
};
use crate::signaling::{ChannelStatus, IceCandidatePayload, SignalChannel, SignalEnvelope};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use vitacall_core::{
    ConnectionQuality, Error, EventEmitter, Participant, ParticipantRole, Result, Subscription,
};

/// Everything the control loop and spawned tasks share
struct Shared<Media, Link> {
    session_id: String,
    local: Participant,
    channel: Arc<SignalChannel>,

    /// Bumped by every teardown; completions carrying an older value
    /// are discarded instead of applied to fresh state
    epoch: AtomicU64,

    phase: RwLock<CallPhase>,
    admission: Mutex<AdmissionState>,
    media: Mutex<Option<Arc<Media>>>,
    link: Mutex<Option<Arc<Link>>>,

    /// Candidates received before the remote description was set
    pending_candidates: Mutex<Vec<IceCandidatePayload>>,
    remote_description_set: AtomicBool,

    remote_stream: AtomicBool,
    call_seconds: AtomicU64,
    quality: Mutex<ConnectionQuality>,
    ticker: Mutex<Option<JoinHandle<()>>>,

    events: EventEmitter<SessionEvent>,
}

/// Work items for the control loop
enum Control {
    Envelope(SignalEnvelope),
    Status(ChannelStatus),
    Peer { epoch: u64, event: PeerEvent },
}

impl<Media, Link> Shared<Media, Link>
where
    Media: LocalMedia + 'static,
    Link: PeerLink + 'static,
{
    fn set_phase(&self, new_phase: CallPhase) -> bool {
        let changed = {
            let mut phase = self.phase.write();
            let old_phase = *phase;
            if old_phase != new_phase {
                debug!(
                    "Call phase transition: {:?} -> {:?}",
                    old_phase, new_phase
                );
                *phase = new_phase;
                true
            } else {
                false
            }
        };
        if changed {
            self.events.emit(&SessionEvent::PhaseChanged(new_phase));
        }
        changed
    }

    fn emit_admission(&self) {
        let admission = self.admission.lock().clone();
        self.events.emit(&SessionEvent::AdmissionChanged(admission));
    }

    fn set_quality(&self, quality: ConnectionQuality) {
        let changed = {
            let mut current = self.quality.lock();
            if *current != quality {
                *current = quality;
                true
            } else {
                false
            }
        };
        if changed {
            self.events.emit(&SessionEvent::QualityChanged(quality));
        }
    }

    fn clear_remote_stream(&self) {
        if self.remote_stream.swap(false, Ordering::SeqCst) {
            self.events.emit(&SessionEvent::RemoteStreamCleared);
        }
    }

    /// Cross the `in-call` barrier if both conditions hold: the channel
    /// reports connected and the peer link is ready
    fn promote_if_ready(self: &Arc<Self>) {
        if self.channel.status() != ChannelStatus::Connected {
            return;
        }
        let promoted = {
            let mut phase = self.phase.write();
            if *phase == CallPhase::PeerReady {
                debug!(
                    "Call phase transition: {:?} -> {:?}",
                    CallPhase::PeerReady,
                    CallPhase::InCall
                );
                *phase = CallPhase::InCall;
                true
            } else {
                false
            }
        };
        if promoted {
            info!("Entering call for session {}", self.session_id);
            self.events.emit(&SessionEvent::PhaseChanged(CallPhase::InCall));
            self.start_ticker();
        }
    }

    fn start_ticker(self: &Arc<Self>) {
        let shared = Arc::clone(self);
        let epoch = self.epoch.load(Ordering::SeqCst);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.tick().await;
            loop {
                interval.tick().await;
                if shared.epoch.load(Ordering::SeqCst) != epoch {
                    break;
                }
                let seconds = shared.call_seconds.fetch_add(1, Ordering::SeqCst) + 1;
                shared.events.emit(&SessionEvent::DurationTick(seconds));
            }
        });
        if let Some(old) = self.ticker.lock().replace(handle) {
            old.abort();
        }
    }

    fn stop_ticker(&self) {
        if let Some(handle) = self.ticker.lock().take() {
            handle.abort();
        }
    }

    /// Release every per-attempt resource
    ///
    /// Safe from any state; every step is a no-op when there is nothing
    /// to release. Bumps the epoch first so in-flight completions from
    /// the attempt being torn down are discarded.
    async fn teardown(&self) {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Session teardown (epoch {})", epoch);

        self.stop_ticker();
        self.call_seconds.store(0, Ordering::SeqCst);

        let link = self.link.lock().take();
        if let Some(link) = link {
            if let Err(e) = link.close().await {
                warn!("Failed to close peer link during teardown: {}", e);
            }
        }

        let media = self.media.lock().take();
        if let Some(media) = media {
            media.stop();
        }

        self.pending_candidates.lock().clear();
        self.remote_description_set.store(false, Ordering::SeqCst);
        self.clear_remote_stream();
        self.set_quality(ConnectionQuality::Unknown);

        let changed = {
            let mut admission = self.admission.lock();
            let fresh = AdmissionState::for_role(self.local.role);
            if *admission != fresh {
                *admission = fresh;
                true
            } else {
                false
            }
        };
        if changed {
            self.emit_admission();
        }
    }

    async fn send_envelope(&self, envelope: &SignalEnvelope) -> Result<()> {
        if let Err(e) = self.channel.send(envelope).await {
            warn!("Failed to send {} envelope: {}", envelope.kind_name(), e);
            self.events.emit(&SessionEvent::Warning(e.to_string()));
            return Err(e);
        }
        Ok(())
    }

    fn snapshot(&self) -> CallSnapshot {
        let media = self.media.lock().clone();
        let (audio_enabled, video_enabled) = media
            .map(|m| (m.audio_enabled(), m.video_enabled()))
            .unwrap_or((false, false));

        CallSnapshot {
            phase: *self.phase.read(),
            channel: self.channel.status(),
            admission: self.admission.lock().clone(),
            audio_enabled,
            video_enabled,
            remote_stream: self.remote_stream.load(Ordering::SeqCst),
            call_seconds: self.call_seconds.load(Ordering::SeqCst),
            quality: *self.quality.lock(),
        }
    }

    async fn handle_envelope(self: &Arc<Self>, envelope: SignalEnvelope) {
        if envelope.session_id() != self.session_id {
            debug!(
                "Dropping envelope for foreign session {}",
                envelope.session_id()
            );
            return;
        }
        if envelope.from_user_id() == self.local.user_id {
            debug!("Ignoring self-echo {}", envelope.kind_name());
            return;
        }

        debug!(
            "Handling {} from {}",
            envelope.kind_name(),
            envelope.from_user_id()
        );

        match envelope {
            SignalEnvelope::Join {
                from_user_id,
                from_user_name,
                ..
            } => self.handle_join(&from_user_id, from_user_name.as_deref()),
            SignalEnvelope::Offer {
                from_user_id, sdp, ..
            } => self.handle_offer(&from_user_id, sdp).await,
            SignalEnvelope::Answer { sdp, .. } => self.handle_answer(sdp).await,
            SignalEnvelope::IceCandidate { candidate, .. } => {
                self.handle_candidate(candidate).await
            }
            SignalEnvelope::Leave { from_user_id, .. } => self.handle_leave(&from_user_id),
        }
    }

    fn handle_join(&self, user_id: &str, user_name: Option<&str>) {
        let recorded = {
            let mut admission = self.admission.lock();
            match &mut *admission {
                AdmissionState::Doctor(a) => a.record_join(user_id, user_name),
                AdmissionState::Patient(_) => {
                    debug!("Ignoring join as the waiting role");
                    return;
                }
            }
        };
        if recorded {
            info!("Patient {} is waiting for admission", user_id);
            self.emit_admission();
        } else {
            debug!("Waiting slot occupied, dropping join from {}", user_id);
        }
    }

    async fn handle_offer(self: &Arc<Self>, from_user_id: &str, sdp: String) {
        let phase = *self.phase.read();
        if !matches!(phase, CallPhase::PeerReady | CallPhase::InCall) {
            debug!("Dropping offer while {:?}", phase);
            return;
        }
        let waiting = {
            let admission = self.admission.lock();
            matches!(
                &*admission,
                AdmissionState::Patient(PatientAdmission::Waiting)
            )
        };
        if !waiting {
            debug!(
                "Dropping offer from {}: not waiting for admission",
                from_user_id
            );
            return;
        }
        let link = self.link.lock().clone();
        let Some(link) = link else {
            debug!("Dropping offer: no peer link");
            return;
        };

        let epoch = self.epoch.load(Ordering::SeqCst);
        let answer_sdp = match link.accept_offer(sdp).await {
            Ok(sdp) => sdp,
            Err(e) => {
                warn!("Failed to apply remote offer: {}", e);
                self.events.emit(&SessionEvent::Warning(e.to_string()));
                return;
            }
        };
        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!("Discarding answer for a finished attempt");
            return;
        }

        self.remote_description_set.store(true, Ordering::SeqCst);
        self.drain_pending(&link).await;

        {
            let mut admission = self.admission.lock();
            if let AdmissionState::Patient(a) = &mut *admission {
                a.admit();
            }
        }
        self.emit_admission();

        let envelope = SignalEnvelope::Answer {
            session_id: self.session_id.clone(),
            from_user_id: self.local.user_id.clone(),
            from_user_name: self.local.display_name.clone(),
            sdp: answer_sdp,
        };
        if self.send_envelope(&envelope).await.is_ok() {
            info!("Admission accepted, answer sent");
        }
    }

    async fn handle_answer(self: &Arc<Self>, sdp: String) {
        let waiting = {
            let admission = self.admission.lock();
            match &*admission {
                AdmissionState::Doctor(a) => a.waiting().is_some(),
                AdmissionState::Patient(_) => false,
            }
        };
        if !waiting {
            debug!("Dropping answer: no admission in flight");
            return;
        }
        let link = self.link.lock().clone();
        let Some(link) = link else {
            debug!("Dropping answer: no peer link");
            return;
        };

        let epoch = self.epoch.load(Ordering::SeqCst);
        if let Err(e) = link.apply_answer(sdp).await {
            warn!("Failed to apply remote answer: {}", e);
            self.events.emit(&SessionEvent::Warning(e.to_string()));
            return;
        }
        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!("Discarding answer completion for a finished attempt");
            return;
        }

        self.remote_description_set.store(true, Ordering::SeqCst);
        self.drain_pending(&link).await;

        let promoted = {
            let mut admission = self.admission.lock();
            match &mut *admission {
                AdmissionState::Doctor(a) => a.promote(),
                AdmissionState::Patient(_) => false,
            }
        };
        if promoted {
            info!("Waiting patient admitted");
            self.emit_admission();
        }
    }

    async fn handle_candidate(self: &Arc<Self>, candidate: IceCandidatePayload) {
        if !self.remote_description_set.load(Ordering::SeqCst) {
            let mut pending = self.pending_candidates.lock();
            pending.push(candidate);
            debug!("Queued early ICE candidate ({} pending)", pending.len());
            return;
        }
        let link = self.link.lock().clone();
        let Some(link) = link else {
            debug!("Dropping ICE candidate: no peer link");
            return;
        };
        if let Err(e) = link.add_ice_candidate(candidate).await {
            warn!("Failed to apply ICE candidate: {}", e);
        }
    }

    /// Apply every queued candidate in arrival order
    ///
    /// The queue is taken whole, so it drains exactly once; candidates
    /// arriving afterwards are applied directly.
    async fn drain_pending(&self, link: &Link) {
        let pending: Vec<IceCandidatePayload> =
            std::mem::take(&mut *self.pending_candidates.lock());
        if pending.is_empty() {
            return;
        }
        info!("Applying {} buffered ICE candidates", pending.len());
        for candidate in pending {
            if let Err(e) = link.add_ice_candidate(candidate).await {
                warn!("Failed to apply buffered ICE candidate: {}", e);
            }
        }
    }

    fn handle_leave(&self, from_user_id: &str) {
        info!("Participant {} left the session", from_user_id);

        let changed = {
            let mut admission = self.admission.lock();
            match &mut *admission {
                AdmissionState::Doctor(a) => a.clear_leaver(from_user_id),
                AdmissionState::Patient(a) => {
                    let had_progress = *a != PatientAdmission::Idle;
                    a.reset();
                    had_progress
                }
            }
        };
        if changed {
            self.emit_admission();
        }

        self.clear_remote_stream();

        // The call ends, but local resources stay until an explicit
        // end_call or cleanup
        let ended = {
            let mut phase = self.phase.write();
            if *phase == CallPhase::InCall {
                debug!(
                    "Call phase transition: {:?} -> {:?}",
                    CallPhase::InCall,
                    CallPhase::Ended
                );
                *phase = CallPhase::Ended;
                true
            } else {
                false
            }
        };
        if ended {
            self.stop_ticker();
            self.events.emit(&SessionEvent::PhaseChanged(CallPhase::Ended));
        }
    }

    fn handle_status(self: &Arc<Self>, status: ChannelStatus) {
        debug!("Signal channel is {:?}", status);
        if status == ChannelStatus::Connected {
            self.promote_if_ready();
        }
    }

    async fn handle_peer_event(self: &Arc<Self>, epoch: u64, event: PeerEvent) {
        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!("Discarding peer event from a finished attempt");
            return;
        }
        match event {
            PeerEvent::LocalCandidate(candidate) => {
                let envelope = SignalEnvelope::IceCandidate {
                    session_id: self.session_id.clone(),
                    from_user_id: self.local.user_id.clone(),
                    from_user_name: self.local.display_name.clone(),
                    candidate,
                };
                let _ = self.send_envelope(&envelope).await;
            }
            PeerEvent::StateChanged(state) => {
                debug!("Peer link state: {:?}", state);
                if let Some(quality) = state.quality() {
                    self.set_quality(quality);
                }
            }
            PeerEvent::RemoteTrack { kind } => {
                self.remote_stream.store(true, Ordering::SeqCst);
                self.events.emit(&SessionEvent::RemoteStream { kind });
            }
        }
    }
}

async fn control_loop<Media, Link>(
    shared: Arc<Shared<Media, Link>>,
    mut controls: mpsc::UnboundedReceiver<Control>,
) where
    Media: LocalMedia + 'static,
    Link: PeerLink + 'static,
{
    while let Some(control) = controls.recv().await {
        match control {
            Control::Envelope(envelope) => shared.handle_envelope(envelope).await,
            Control::Status(status) => shared.handle_status(status),
            Control::Peer { epoch, event } => shared.handle_peer_event(epoch, event).await,
        }
    }
    debug!("Session control loop stopped");
}

/// Coordinates one participant's side of a video consultation
///
/// Construction wires the coordinator to the shared [`SignalChannel`]
/// and spawns the control loop, so it must be created inside a Tokio
/// runtime. The waiting room works before [`start`](Self::start): a
/// doctor sees joins as soon as the channel delivers them.
pub struct SessionCoordinator<M, F>
where
    M: MediaSource,
    F: PeerLinkFactory<Media = M::Media>,
{
    media_source: M,
    link_factory: F,
    shared: Arc<Shared<M::Media, F::Link>>,
    controls: mpsc::UnboundedSender<Control>,
    driver: JoinHandle<()>,
    signal_sub: Subscription,
    status_sub: Subscription,
}

impl<M, F> SessionCoordinator<M, F>
where
    M: MediaSource,
    F: PeerLinkFactory<Media = M::Media>,
{
    /// Create a coordinator for `local`'s side of `session_id`
    pub fn new(
        session_id: impl Into<String>,
        local: Participant,
        channel: Arc<SignalChannel>,
        media_source: M,
        link_factory: F,
    ) -> Self {
        let session_id = session_id.into();
        let admission = AdmissionState::for_role(local.role);

        info!(
            "Creating session coordinator: session={}, user={}, role={:?}",
            session_id, local.user_id, local.role
        );

        let shared = Arc::new(Shared {
            session_id,
            local,
            channel: Arc::clone(&channel),
            epoch: AtomicU64::new(0),
            phase: RwLock::new(CallPhase::Idle),
            admission: Mutex::new(admission),
            media: Mutex::new(None),
            link: Mutex::new(None),
            pending_candidates: Mutex::new(Vec::new()),
            remote_description_set: AtomicBool::new(false),
            remote_stream: AtomicBool::new(false),
            call_seconds: AtomicU64::new(0),
            quality: Mutex::new(ConnectionQuality::Unknown),
            ticker: Mutex::new(None),
            events: EventEmitter::new(),
        });

        let (control_tx, control_rx) = mpsc::unbounded_channel();

        let tx = control_tx.clone();
        let signal_sub = channel
            .signal_events()
            .subscribe(move |envelope: &SignalEnvelope| {
                let _ = tx.send(Control::Envelope(envelope.clone()));
            });

        let tx = control_tx.clone();
        let status_sub = channel
            .status_events()
            .subscribe(move |status: &ChannelStatus| {
                let _ = tx.send(Control::Status(*status));
            });

        let driver = tokio::spawn(control_loop(Arc::clone(&shared), control_rx));

        Self {
            media_source,
            link_factory,
            shared,
            controls: control_tx,
            driver,
            signal_sub,
            status_sub,
        }
    }

    /// Session activity stream for the UI layer
    pub fn events(&self) -> &EventEmitter<SessionEvent> {
        &self.shared.events
    }

    /// Point-in-time view of the session
    pub fn snapshot(&self) -> CallSnapshot {
        self.shared.snapshot()
    }

    /// Start a call attempt: acquire media, build the peer link, and
    /// arm the `in-call` barrier
    ///
    /// Setup failures move the phase to [`CallPhase::Failed`] with a
    /// distinguished cause and are also returned to the caller. A start
    /// while an attempt is already active is a no-op.
    pub async fn start(&self) -> Result<()> {
        {
            let phase = *self.shared.phase.read();
            if phase.is_active() {
                warn!("Call start requested while already {:?}", phase);
                return Ok(());
            }
        }
        let epoch = self.shared.epoch.load(Ordering::SeqCst);

        self.shared
            .channel
            .subscribe_signals(&self.shared.session_id)
            .await?;

        self.shared.set_phase(CallPhase::Connecting);

        let media = match self.media_source.acquire().await {
            Ok(media) => Arc::new(media),
            Err(e) => {
                if self.shared.epoch.load(Ordering::SeqCst) == epoch {
                    self.shared
                        .set_phase(CallPhase::Failed(FailureKind::from_error(&e)));
                }
                return Err(e);
            }
        };
        if self.shared.epoch.load(Ordering::SeqCst) != epoch {
            media.stop();
            return Ok(());
        }
        *self.shared.media.lock() = Some(Arc::clone(&media));
        self.shared.set_phase(CallPhase::MediaAcquired);

        let (peer_tx, mut peer_rx) = mpsc::unbounded_channel();
        let controls = self.controls.clone();
        tokio::spawn(async move {
            while let Some(event) = peer_rx.recv().await {
                if controls.send(Control::Peer { epoch, event }).is_err() {
                    break;
                }
            }
        });

        let link = match self.link_factory.create(&media, peer_tx).await {
            Ok(link) => Arc::new(link),
            Err(e) => {
                if self.shared.epoch.load(Ordering::SeqCst) == epoch {
                    self.shared
                        .set_phase(CallPhase::Failed(FailureKind::from_error(&e)));
                }
                return Err(e);
            }
        };
        if self.shared.epoch.load(Ordering::SeqCst) != epoch {
            let _ = link.close().await;
            return Ok(());
        }
        *self.shared.link.lock() = Some(link);
        self.shared.set_phase(CallPhase::PeerReady);

        info!("Call setup complete for session {}", self.shared.session_id);

        self.shared.promote_if_ready();
        Ok(())
    }

    /// Announce the local patient to the doctor's waiting room
    ///
    /// Leaves state untouched when the send fails, so the caller can
    /// retry once the channel is back.
    pub async fn join_session(&self) -> Result<()> {
        if self.shared.local.role != ParticipantRole::Patient {
            return Err(Error::InvalidState(
                "Only the waiting role announces a join".to_string(),
            ));
        }
        {
            let admission = self.shared.admission.lock();
            if !matches!(
                &*admission,
                AdmissionState::Patient(PatientAdmission::Idle)
            ) {
                debug!("Join already announced");
                return Ok(());
            }
        }

        let envelope = SignalEnvelope::Join {
            session_id: self.shared.session_id.clone(),
            from_user_id: self.shared.local.user_id.clone(),
            from_user_name: self.shared.local.display_name.clone(),
        };
        self.shared.send_envelope(&envelope).await?;

        {
            let mut admission = self.shared.admission.lock();
            if let AdmissionState::Patient(a) = &mut *admission {
                a.begin_waiting();
            }
        }
        self.shared.emit_admission();
        info!("Join announced for session {}", self.shared.session_id);
        Ok(())
    }

    /// Offer the call to the waiting patient
    ///
    /// Fails without touching state when the channel is down or nobody
    /// is waiting. The slot is promoted only once the answer arrives.
    pub async fn admit_patient(&self) -> Result<()> {
        if self.shared.local.role != ParticipantRole::Doctor {
            return Err(Error::InvalidState(
                "Only the admitting role can admit".to_string(),
            ));
        }
        if self.shared.channel.status() != ChannelStatus::Connected {
            let err = Error::ChannelDisconnected(
                "Cannot admit while the signal channel is down".to_string(),
            );
            self.shared
                .events
                .emit(&SessionEvent::Warning(err.to_string()));
            return Err(err);
        }
        let waiting_id = {
            let admission = self.shared.admission.lock();
            match &*admission {
                AdmissionState::Doctor(a) => a.waiting().map(|(id, _)| id.to_string()),
                AdmissionState::Patient(_) => None,
            }
        };
        let Some(waiting_id) = waiting_id else {
            return Err(Error::InvalidState("No patient is waiting".to_string()));
        };
        let link = self.shared.link.lock().clone();
        let Some(link) = link else {
            return Err(Error::InvalidState(
                "Call not started, no peer link".to_string(),
            ));
        };

        let epoch = self.shared.epoch.load(Ordering::SeqCst);
        let offer_sdp = match link.create_offer().await {
            Ok(sdp) => sdp,
            Err(e) => {
                if self.shared.epoch.load(Ordering::SeqCst) == epoch {
                    self.shared
                        .set_phase(CallPhase::Failed(FailureKind::from_error(&e)));
                }
                return Err(e);
            }
        };
        if self.shared.epoch.load(Ordering::SeqCst) != epoch {
            return Ok(());
        }

        let envelope = SignalEnvelope::Offer {
            session_id: self.shared.session_id.clone(),
            from_user_id: self.shared.local.user_id.clone(),
            from_user_name: self.shared.local.display_name.clone(),
            sdp: offer_sdp,
        };
        self.shared.send_envelope(&envelope).await?;

        info!("Offer sent to waiting patient {}", waiting_id);
        Ok(())
    }

    /// Flip the microphone track; returns the new enabled state
    pub fn toggle_mute(&self) -> Result<bool> {
        let media = self.shared.media.lock().clone();
        let Some(media) = media else {
            return Err(Error::InvalidState("No local media".to_string()));
        };
        let enabled = !media.audio_enabled();
        media.set_audio_enabled(enabled);
        Ok(enabled)
    }

    /// Flip the camera track; returns the new enabled state
    pub fn toggle_video(&self) -> Result<bool> {
        let media = self.shared.media.lock().clone();
        let Some(media) = media else {
            return Err(Error::InvalidState("No local media".to_string()));
        };
        let enabled = !media.video_enabled();
        media.set_video_enabled(enabled);
        Ok(enabled)
    }

    /// End the call: announce leave, release resources, phase `Ended`
    pub async fn end_call(&self) -> Result<()> {
        info!("Ending call for session {}", self.shared.session_id);

        let envelope = SignalEnvelope::Leave {
            session_id: self.shared.session_id.clone(),
            from_user_id: self.shared.local.user_id.clone(),
            from_user_name: self.shared.local.display_name.clone(),
        };
        if let Err(e) = self.shared.channel.send(&envelope).await {
            warn!("Failed to announce leave: {}", e);
        }

        self.shared.teardown().await;
        self.shared.set_phase(CallPhase::Ended);
        Ok(())
    }

    /// Release every per-attempt resource and return to `Idle`
    ///
    /// Idempotent and callable from any state, including `Idle`.
    pub async fn cleanup(&self) {
        self.shared.teardown().await;
        self.shared.set_phase(CallPhase::Idle);
    }

    /// Full teardown followed by a fresh start attempt
    pub async fn retry(&self) -> Result<()> {
        info!("Retrying call setup for session {}", self.shared.session_id);
        self.cleanup().await;
        self.start().await
    }

    /// Detach from the shared channel and stop the control loop
    pub async fn dispose(&self) {
        self.shared.teardown().await;
        self.shared.channel.signal_events().unsubscribe(&self.signal_sub);
        self.shared.channel.status_events().unsubscribe(&self.status_sub);
        if let Err(e) = self
            .shared
            .channel
            .unsubscribe_signals(&self.shared.session_id)
            .await
        {
            debug!("Failed to unsubscribe session topic: {}", e);
        }
        self.driver.abort();
    }
}

impl<M, F> Drop for SessionCoordinator<M, F>
where
    M: MediaSource,
    F: PeerLinkFactory<Media = M::Media>,
{
    fn drop(&mut self) {
        self.shared.channel.signal_events().unsubscribe(&self.signal_sub);
        self.shared.channel.status_events().unsubscribe(&self.status_sub);
        self.shared.stop_ticker();
        self.driver.abort();
    }
}

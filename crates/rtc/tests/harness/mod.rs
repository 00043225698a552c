//! Consultation test harness
//!
//! Wires whole participants out of scripted parts so scenarios read as
//! the product flows they exercise:
//!
//! 1. Create a [`RelayHub`] (and a [`SharedStore`] for chat scenarios)
//! 2. Bring up a [`TestParticipant`] per side of the consultation
//! 3. Drive coordinator calls and scripted link/media events
//! 4. Assert on snapshots, probes, and recorded session events

#![allow(dead_code)]

pub mod media;
pub mod peer;
pub mod relay;
pub mod store;

pub use media::{MediaDenial, ScriptedMediaSource};
pub use peer::ScriptedLinkFactory;
pub use relay::{HubTransport, RelayHub};
pub use store::SharedStore;

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use vitacall_core::{BackoffConfig, BackoffPolicy, Participant, ParticipantRole, Subscription};
use vitacall_rtc::{CallPhase, ChannelStatus, SessionCoordinator, SessionEvent, SignalChannel};

/// Session id every scenario runs under
pub const SESSION: &str = "consult-42";

/// Coordinator type the harness builds
pub type ScriptedCoordinator = SessionCoordinator<ScriptedMediaSource, ScriptedLinkFactory>;

/// Initialize test logging (call once per test)
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info,vitacall_rtc=debug")
        .try_init();
}

/// Backoff tuned so reconnection scenarios finish in milliseconds
pub fn fast_policy() -> BackoffPolicy {
    BackoffPolicy::new(&BackoffConfig {
        base_delay_ms: 1,
        max_delay_ms: 10,
        multiplier: 2.0,
        max_attempts: 4,
        jitter: false,
    })
}

/// Poll `condition` until it holds or two seconds pass
pub async fn wait_until<F: Fn() -> bool>(what: &str, condition: F) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {}", what);
}

/// One participant: relay connection, coordinator, and scripted parts
pub struct TestParticipant {
    pub transport: Arc<HubTransport>,
    pub channel: Arc<SignalChannel>,
    pub media: ScriptedMediaSource,
    pub links: ScriptedLinkFactory,
    pub coordinator: ScriptedCoordinator,
    session_events: Arc<Mutex<Vec<SessionEvent>>>,
    _event_sub: Subscription,
}

impl TestParticipant {
    /// Build a participant without connecting the channel
    pub fn offline(
        hub: &RelayHub,
        user_id: &str,
        display_name: &str,
        role: ParticipantRole,
    ) -> Self {
        let transport = hub.transport();
        let channel = Arc::new(SignalChannel::new(
            Arc::clone(&transport) as Arc<dyn vitacall_rtc::SignalingTransport>,
            fast_policy(),
        ));

        let media = ScriptedMediaSource::new();
        let links = ScriptedLinkFactory::new();
        let coordinator = SessionCoordinator::new(
            SESSION,
            Participant::new(user_id, Some(display_name.to_string()), role),
            Arc::clone(&channel),
            media.clone(),
            links.clone(),
        );

        let session_events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&session_events);
        let event_sub = coordinator.events().subscribe(move |event: &SessionEvent| {
            sink.lock().push(event.clone());
        });

        Self {
            transport,
            channel,
            media,
            links,
            coordinator,
            session_events,
            _event_sub: event_sub,
        }
    }

    /// Build a participant and wait for its channel to connect
    pub async fn connect(
        hub: &RelayHub,
        user_id: &str,
        display_name: &str,
        role: ParticipantRole,
    ) -> Self {
        let participant = Self::offline(hub, user_id, display_name, role);
        participant.channel.connect();
        let channel = Arc::clone(&participant.channel);
        wait_until("channel to connect", || {
            channel.status() == ChannelStatus::Connected
        })
        .await;
        participant
    }

    /// The consulting doctor, connected
    pub async fn doctor(hub: &RelayHub) -> Self {
        Self::connect(hub, "doc-1", "Dr. Osei", ParticipantRole::Doctor).await
    }

    /// The patient, connected
    pub async fn patient(hub: &RelayHub) -> Self {
        Self::connect(hub, "pat-1", "Ana Lima", ParticipantRole::Patient).await
    }

    pub fn phase(&self) -> CallPhase {
        self.coordinator.snapshot().phase
    }

    pub async fn wait_phase(&self, want: CallPhase) {
        let snapshot = || self.coordinator.snapshot().phase;
        wait_until(&format!("phase {:?} (last {:?})", want, snapshot()), || {
            snapshot() == want
        })
        .await;
    }

    /// Everything the coordinator emitted so far
    pub fn recorded_events(&self) -> Vec<SessionEvent> {
        self.session_events.lock().clone()
    }
}

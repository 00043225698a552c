//! Reconnecting pub/sub channel over the relay
//!
//! One channel instance is shared by the session coordinator and the
//! chat side-channel. Delivery callbacks are multi-subscriber, the
//! reconnect schedule is bounded with jitter, and exhausting the retry
//! budget parks the channel in [`ChannelStatus::Exhausted`] until a
//! manual [`SignalChannel::reconnect`].

use super::protocol::{chat_topic, signal_topic, ChatSignal, SignalEnvelope};
use super::transport::{SignalingTransport, TransportEvent};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, info, warn};
use vitacall_core::{BackoffPolicy, Error, EventEmitter, Result};

/// Connection state of the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    /// Not connected; no supervision in progress
    Disconnected,
    /// Supervision is trying to (re)connect
    Connecting,
    /// Connected; sends succeed
    Connected,
    /// Retry budget spent; only [`SignalChannel::reconnect`] leaves this
    Exhausted,
}

/// Send/receive counters for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelStats {
    /// Frames published by this channel
    pub messages_sent: u64,
    /// Frames delivered to this channel
    pub messages_received: u64,
}

/// State shared between the channel handle and its supervision task
struct ChannelShared {
    status: parking_lot::RwLock<ChannelStatus>,
    topics: parking_lot::Mutex<HashSet<String>>,
    status_events: EventEmitter<ChannelStatus>,
    signal_events: EventEmitter<SignalEnvelope>,
    chat_events: EventEmitter<ChatSignal>,
    wake: Notify,
    shutdown: AtomicBool,
    supervising: AtomicBool,
    reset_attempts: AtomicBool,
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
}

impl ChannelShared {
    fn set_status(&self, new_status: ChannelStatus) {
        let old_status = {
            let mut guard = self.status.write();
            let old = *guard;
            *guard = new_status;
            old
        };

        if old_status != new_status {
            debug!("Channel status: {:?} -> {:?}", old_status, new_status);
            self.status_events.emit(&new_status);
        }
    }
}

/// Reconnecting typed pub/sub client over a [`SignalingTransport`]
///
/// Explicitly constructed and passed by reference; create one per
/// process (or one per test scenario) and share it via [`Arc`].
pub struct SignalChannel {
    transport: Arc<dyn SignalingTransport>,
    policy: BackoffPolicy,
    shared: Arc<ChannelShared>,
}

impl SignalChannel {
    /// Create a channel over `transport` with the given reconnect policy
    pub fn new(transport: Arc<dyn SignalingTransport>, policy: BackoffPolicy) -> Self {
        Self {
            transport,
            policy,
            shared: Arc::new(ChannelShared {
                status: parking_lot::RwLock::new(ChannelStatus::Disconnected),
                topics: parking_lot::Mutex::new(HashSet::new()),
                status_events: EventEmitter::new(),
                signal_events: EventEmitter::new(),
                chat_events: EventEmitter::new(),
                wake: Notify::new(),
                shutdown: AtomicBool::new(false),
                supervising: AtomicBool::new(false),
                reset_attempts: AtomicBool::new(false),
                messages_sent: AtomicU64::new(0),
                messages_received: AtomicU64::new(0),
            }),
        }
    }

    /// Begin (re)connection supervision; idempotent
    ///
    /// A second call while supervision is already running is a no-op.
    pub fn connect(&self) {
        // Cancels a pending shutdown: a connect that races a disconnect
        // leaves the channel connecting, never wedged.
        self.shared.shutdown.store(false, Ordering::SeqCst);

        if self.shared.supervising.swap(true, Ordering::SeqCst) {
            debug!("Channel already supervising, connect is a no-op");
            return;
        }

        let shared = Arc::clone(&self.shared);
        let transport = Arc::clone(&self.transport);
        let policy = self.policy.clone();
        tokio::spawn(Self::supervise(shared, transport, policy));
    }

    /// Manual restart: resets the attempt budget and wakes supervision
    ///
    /// This is the only way out of [`ChannelStatus::Exhausted`]. Calling
    /// it when supervision is not running behaves like [`Self::connect`].
    pub fn reconnect(&self) {
        if !self.shared.supervising.load(Ordering::SeqCst) {
            self.connect();
            return;
        }

        info!("Manual reconnect requested");
        self.shared.reset_attempts.store(true, Ordering::SeqCst);
        self.shared.wake.notify_one();
    }

    /// Tear down the transport and stop supervision
    ///
    /// Subsequent sends fail until [`Self::connect`] succeeds again.
    pub async fn disconnect(&self) -> Result<()> {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        self.shared.wake.notify_one();
        self.transport.disconnect().await?;
        self.shared.set_status(ChannelStatus::Disconnected);
        Ok(())
    }

    /// Current connection status
    pub fn status(&self) -> ChannelStatus {
        *self.shared.status.read()
    }

    /// Send/receive counters
    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            messages_sent: self.shared.messages_sent.load(Ordering::Relaxed),
            messages_received: self.shared.messages_received.load(Ordering::Relaxed),
        }
    }

    /// Observe status changes
    pub fn status_events(&self) -> &EventEmitter<ChannelStatus> {
        &self.shared.status_events
    }

    /// Observe incoming signaling envelopes
    pub fn signal_events(&self) -> &EventEmitter<SignalEnvelope> {
        &self.shared.signal_events
    }

    /// Observe incoming chat signals
    pub fn chat_events(&self) -> &EventEmitter<ChatSignal> {
        &self.shared.chat_events
    }

    /// Register interest in a session's signaling topic
    ///
    /// Duplicate subscriptions coalesce: the topic is recorded once and
    /// replayed once after every (re)connect.
    pub async fn subscribe_signals(&self, session_id: &str) -> Result<()> {
        self.subscribe_topic(signal_topic(session_id)).await
    }

    /// Register interest in a session's chat topic
    pub async fn subscribe_chat(&self, session_id: &str) -> Result<()> {
        self.subscribe_topic(chat_topic(session_id)).await
    }

    /// Drop interest in a session's signaling topic
    pub async fn unsubscribe_signals(&self, session_id: &str) -> Result<()> {
        self.unsubscribe_topic(signal_topic(session_id)).await
    }

    /// Drop interest in a session's chat topic
    pub async fn unsubscribe_chat(&self, session_id: &str) -> Result<()> {
        self.unsubscribe_topic(chat_topic(session_id)).await
    }

    /// Publish a signaling envelope to its session's topic
    ///
    /// Fails with [`Error::ChannelDisconnected`] without suspending when
    /// the channel is not connected; callers surface the error rather
    /// than dropping it.
    pub async fn send(&self, envelope: &SignalEnvelope) -> Result<()> {
        self.ensure_connected()?;

        let topic = signal_topic(envelope.session_id());
        let payload = envelope.to_json()?;
        debug!("Sending {} envelope to {}", envelope.kind_name(), topic);

        self.transport.publish(&topic, payload).await?;
        self.shared.messages_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Publish a chat signal to the session's chat topic
    pub async fn send_chat(&self, session_id: &str, signal: &ChatSignal) -> Result<()> {
        self.ensure_connected()?;

        let topic = chat_topic(session_id);
        let payload = signal.to_json()?;

        self.transport.publish(&topic, payload).await?;
        self.shared.messages_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn ensure_connected(&self) -> Result<()> {
        let status = self.status();
        if status != ChannelStatus::Connected {
            return Err(Error::ChannelDisconnected(format!(
                "Channel is {:?}, not connected",
                status
            )));
        }
        Ok(())
    }

    async fn subscribe_topic(&self, topic: String) -> Result<()> {
        let newly_recorded = self.shared.topics.lock().insert(topic.clone());
        if !newly_recorded {
            debug!("Topic {} already subscribed, coalescing", topic);
            return Ok(());
        }

        // Replay happens on every (re)connect; register on the live
        // connection too when there is one.
        if self.status() == ChannelStatus::Connected {
            self.transport.subscribe(&topic).await?;
        }
        Ok(())
    }

    async fn unsubscribe_topic(&self, topic: String) -> Result<()> {
        let was_recorded = self.shared.topics.lock().remove(&topic);
        if was_recorded && self.status() == ChannelStatus::Connected {
            self.transport.unsubscribe(&topic).await?;
        }
        Ok(())
    }

    /// Supervision loop: connect, replay subscriptions, pump events,
    /// back off on loss, park on exhaustion
    async fn supervise(
        shared: Arc<ChannelShared>,
        transport: Arc<dyn SignalingTransport>,
        policy: BackoffPolicy,
    ) {
        let mut attempt: u32 = 0;

        loop {
            if shared.shutdown.load(Ordering::SeqCst) {
                break;
            }
            if shared.reset_attempts.swap(false, Ordering::SeqCst) {
                attempt = 0;
            }

            shared.set_status(ChannelStatus::Connecting);

            match transport.connect().await {
                Ok(mut events) => {
                    attempt = 0;

                    let topics: Vec<String> = shared.topics.lock().iter().cloned().collect();
                    let mut replay_failed = false;
                    for topic in topics {
                        if let Err(e) = transport.subscribe(&topic).await {
                            warn!("Failed to replay subscription {}: {}", topic, e);
                            replay_failed = true;
                            break;
                        }
                    }

                    if !replay_failed {
                        shared.set_status(ChannelStatus::Connected);

                        while let Some(event) = events.recv().await {
                            match event {
                                TransportEvent::Frame { topic, payload } => {
                                    shared.messages_received.fetch_add(1, Ordering::Relaxed);
                                    Self::dispatch(&shared, &topic, &payload);
                                }
                                TransportEvent::Closed { reason } => {
                                    warn!("Relay connection lost: {}", reason);
                                    break;
                                }
                            }

                            if shared.shutdown.load(Ordering::SeqCst) {
                                break;
                            }
                        }
                    }

                    shared.set_status(ChannelStatus::Disconnected);
                    if shared.shutdown.load(Ordering::SeqCst) {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Relay connect attempt {} failed: {}", attempt, e);
                }
            }

            match policy.delay_for_attempt(attempt) {
                Some(delay) => {
                    attempt += 1;
                    debug!("Reconnecting in {:?}", delay);
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shared.wake.notified() => {}
                    }
                }
                None => {
                    warn!(
                        "Reconnect budget of {} attempts spent, giving up until manual reconnect",
                        policy.max_attempts()
                    );
                    shared.set_status(ChannelStatus::Exhausted);
                    shared.wake.notified().await;
                    attempt = 0;
                }
            }
        }

        shared.supervising.store(false, Ordering::SeqCst);
        debug!("Channel supervision terminated");
    }

    /// Decode a frame by topic family and fan it out
    fn dispatch(shared: &ChannelShared, topic: &str, payload: &str) {
        if topic.ends_with("/signal") {
            match SignalEnvelope::from_json(payload) {
                Ok(envelope) => shared.signal_events.emit(&envelope),
                Err(e) => warn!("Dropping bad envelope on {}: {}", topic, e),
            }
        } else if topic.ends_with("/chat") {
            match ChatSignal::from_json(payload) {
                Ok(signal) => shared.chat_events.emit(&signal),
                Err(e) => warn!("Dropping bad chat signal on {}: {}", topic, e),
            }
        } else {
            warn!("Frame on unexpected topic {}", topic);
        }
    }
}

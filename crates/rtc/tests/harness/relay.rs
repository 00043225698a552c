//! In-memory relay hub
//!
//! Mirrors the relay contract the channel is written against: per-topic
//! broadcast to every subscriber, the publisher included. Each
//! [`HubTransport`] is one participant's connection and carries its own
//! failure switches, so tests can sever or refuse individual clients
//! while the rest of the hub keeps running.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use vitacall_core::{Error, Result};
use vitacall_rtc::{SignalingTransport, TransportEvent, TransportEvents};

struct HubClient {
    topics: HashSet<String>,
    tx: mpsc::UnboundedSender<TransportEvent>,
}

#[derive(Default)]
struct HubInner {
    next_id: AtomicU64,
    clients: Mutex<HashMap<u64, HubClient>>,
}

impl HubInner {
    fn deliver(&self, topic: &str, payload: &str) {
        let mut clients = self.clients.lock();
        clients.retain(|_, client| {
            if !client.topics.contains(topic) {
                return true;
            }
            client
                .tx
                .send(TransportEvent::Frame {
                    topic: topic.to_string(),
                    payload: payload.to_string(),
                })
                .is_ok()
        });
    }
}

/// One shared relay for a whole test scenario
#[derive(Clone, Default)]
pub struct RelayHub {
    inner: Arc<HubInner>,
}

impl RelayHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh connection handle for one participant
    pub fn transport(&self) -> Arc<HubTransport> {
        Arc::new(HubTransport {
            hub: Arc::clone(&self.inner),
            client_id: Mutex::new(None),
            connects_to_refuse: AtomicU32::new(0),
        })
    }

    /// Publish a raw frame as if from an uninvolved relay client
    pub fn inject(&self, topic: &str, payload: &str) {
        self.inner.deliver(topic, payload);
    }
}

/// One participant's connection to the [`RelayHub`]
pub struct HubTransport {
    hub: Arc<HubInner>,
    client_id: Mutex<Option<u64>>,
    connects_to_refuse: AtomicU32,
}

impl HubTransport {
    /// Make the next `n` `connect` calls fail
    pub fn refuse_connects(&self, n: u32) {
        self.connects_to_refuse.store(n, Ordering::SeqCst);
    }

    /// Sever the live connection, ending its event stream
    pub fn kill_connection(&self, reason: &str) {
        if let Some(id) = self.client_id.lock().take() {
            if let Some(client) = self.hub.clients.lock().remove(&id) {
                let _ = client.tx.send(TransportEvent::Closed {
                    reason: reason.to_string(),
                });
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.client_id.lock().is_some()
    }

    fn with_client<R>(&self, f: impl FnOnce(&mut HubClient) -> R) -> Result<R> {
        let client_id = match *self.client_id.lock() {
            Some(id) => id,
            None => return Err(Error::Transport("Not connected to relay".to_string())),
        };
        let mut clients = self.hub.clients.lock();
        let client = clients
            .get_mut(&client_id)
            .ok_or_else(|| Error::Transport("Not connected to relay".to_string()))?;
        Ok(f(client))
    }
}

#[async_trait::async_trait]
impl SignalingTransport for HubTransport {
    async fn connect(&self) -> Result<TransportEvents> {
        let refusals = self.connects_to_refuse.load(Ordering::SeqCst);
        if refusals > 0 {
            self.connects_to_refuse.store(refusals - 1, Ordering::SeqCst);
            return Err(Error::Transport("Relay refused connection".to_string()));
        }

        // A connect replaces any previous registration, ending its stream
        self.kill_connection("Replaced by a new connection");

        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.hub.next_id.fetch_add(1, Ordering::SeqCst);
        self.hub.clients.lock().insert(
            id,
            HubClient {
                topics: HashSet::new(),
                tx,
            },
        );
        *self.client_id.lock() = Some(id);
        Ok(rx)
    }

    async fn disconnect(&self) -> Result<()> {
        if let Some(id) = self.client_id.lock().take() {
            self.hub.clients.lock().remove(&id);
        }
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: String) -> Result<()> {
        self.with_client(|_| ())?;
        self.hub.deliver(topic, &payload);
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<()> {
        self.with_client(|client| {
            client.topics.insert(topic.to_string());
        })
    }

    async fn unsubscribe(&self, topic: &str) -> Result<()> {
        self.with_client(|client| {
            client.topics.remove(topic);
        })
    }
}

//! Shared in-memory message store
//!
//! One store per scenario, shared by both participants' chat channels,
//! standing in for the consultation REST API.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use vitacall_core::{ChatMessage, Error, MessageStore, Result};

#[derive(Default)]
struct StoreInner {
    messages: Mutex<Vec<ChatMessage>>,
    read_marks: Mutex<Vec<(String, String)>>,
    offline: AtomicBool,
}

/// Clonable handle to the scenario's store
#[derive(Clone, Default)]
pub struct SharedStore {
    inner: Arc<StoreInner>,
}

impl SharedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write fail until [`Self::back_online`]
    pub fn go_offline(&self) {
        self.inner.offline.store(true, Ordering::SeqCst);
    }

    pub fn back_online(&self) {
        self.inner.offline.store(false, Ordering::SeqCst);
    }

    pub fn saved_messages(&self) -> Vec<ChatMessage> {
        self.inner.messages.lock().clone()
    }

    pub fn read_marks(&self) -> Vec<(String, String)> {
        self.inner.read_marks.lock().clone()
    }

    fn check_online(&self) -> Result<()> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(Error::PersistenceFailed(
                "Consultation API unreachable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl MessageStore for SharedStore {
    async fn save_message(&self, message: &ChatMessage) -> Result<()> {
        self.check_online()?;
        self.inner.messages.lock().push(message.clone());
        Ok(())
    }

    async fn mark_read(&self, session_id: &str, reader_id: &str) -> Result<()> {
        self.check_online()?;
        self.inner
            .read_marks
            .lock()
            .push((session_id.to_string(), reader_id.to_string()));
        Ok(())
    }

    async fn history(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        Ok(self
            .inner
            .messages
            .lock()
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect())
    }
}

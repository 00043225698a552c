//! Chat and typing side-channel
//!
//! Runs over the session's chat topic on the shared signal channel,
//! independent of the call state machine. The REST store is the
//! durability path and is authoritative; relay delivery is the
//! low-latency path and best-effort. Local appends are optimistic, so
//! the UI never waits on either write.

use crate::signaling::{ChatSignal, SignalChannel};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;
use vitacall_core::{
    ChatMessage, EventEmitter, MessageStore, Participant, ReadReceipt, Result, Subscription,
    TypingIndicator,
};

/// Chat activity surfaced to the UI layer
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// A message entered the local list
    ///
    /// `persisted` is `false` for the optimistic append of an outgoing
    /// message; durability is confirmed by a later
    /// [`ChatEvent::MessagePersisted`].
    MessageAppended {
        /// The appended message
        message: ChatMessage,
        /// Whether the durability path has already confirmed it
        persisted: bool,
    },

    /// The REST store confirmed a previously appended message
    MessagePersisted {
        /// Id of the confirmed message
        message_id: Uuid,
    },

    /// `load_history` replaced the local list
    HistoryLoaded {
        /// Number of persisted messages fetched
        count: usize,
    },

    /// A participant's typing state changed
    TypingChanged(TypingIndicator),

    /// The counterpart read the local user's messages
    MessagesRead {
        /// Who read them
        reader_id: String,
    },

    /// Non-fatal write failure worth showing to the user
    Fault(String),
}

struct ChatShared {
    session_id: String,
    local: Participant,
    channel: Arc<SignalChannel>,
    messages: Mutex<Vec<ChatMessage>>,
    /// Last indicator per remote user; superseded on every update
    typing: Mutex<HashMap<String, TypingIndicator>>,
    typing_timer: Mutex<Option<JoinHandle<()>>>,
    events: EventEmitter<ChatEvent>,
}

impl ChatShared {
    fn local_indicator(&self, is_typing: bool) -> TypingIndicator {
        TypingIndicator {
            user_id: self.local.user_id.clone(),
            user_name: self.local.display_name.clone(),
            is_typing,
        }
    }

    async fn publish_typing(&self, is_typing: bool) -> Result<()> {
        let signal = ChatSignal::Typing {
            session_id: self.session_id.clone(),
            indicator: self.local_indicator(is_typing),
        };
        self.channel.send_chat(&self.session_id, &signal).await
    }

    fn cancel_typing_timer(&self) {
        if let Some(handle) = self.typing_timer.lock().take() {
            handle.abort();
        }
    }

    /// Append unless the id is already present; dedup covers the relay
    /// redelivering and history overlapping the optimistic path
    fn append_if_new(&self, message: &ChatMessage) -> bool {
        let mut messages = self.messages.lock();
        if messages.iter().any(|m| m.id == message.id) {
            return false;
        }
        messages.push(message.clone());
        true
    }

    fn handle_signal(&self, signal: &ChatSignal) {
        let session_id = match signal {
            ChatSignal::Message { message } => message.session_id.as_str(),
            ChatSignal::Typing { session_id, .. } => session_id.as_str(),
            ChatSignal::Read { receipt } => receipt.session_id.as_str(),
        };
        if session_id != self.session_id {
            debug!("Dropping chat signal for foreign session {}", session_id);
            return;
        }
        if signal.from_user_id() == self.local.user_id {
            debug!("Ignoring chat self-echo");
            return;
        }

        match signal {
            ChatSignal::Message { message } => {
                if self.append_if_new(message) {
                    self.events.emit(&ChatEvent::MessageAppended {
                        message: message.clone(),
                        persisted: true,
                    });
                }
            }
            ChatSignal::Typing { indicator, .. } => {
                self.typing
                    .lock()
                    .insert(indicator.user_id.clone(), indicator.clone());
                self.events.emit(&ChatEvent::TypingChanged(indicator.clone()));
            }
            ChatSignal::Read { receipt } => {
                {
                    let mut messages = self.messages.lock();
                    for message in messages
                        .iter_mut()
                        .filter(|m| m.sender_id == self.local.user_id)
                    {
                        message.read = true;
                    }
                }
                self.events.emit(&ChatEvent::MessagesRead {
                    reader_id: receipt.reader_id.clone(),
                });
            }
        }
    }
}

/// One session's chat surface over the shared [`SignalChannel`]
pub struct ChatChannel {
    shared: Arc<ChatShared>,
    store: Arc<dyn MessageStore>,
    typing_expiry: Duration,
    chat_sub: Subscription,
}

impl ChatChannel {
    /// Open the chat surface for `session_id`
    ///
    /// Subscribes the session's chat topic and starts filtering
    /// incoming signals. `typing_expiry` is how long an outgoing typing
    /// state lives without a further keystroke.
    pub async fn new(
        session_id: impl Into<String>,
        local: Participant,
        channel: Arc<SignalChannel>,
        store: Arc<dyn MessageStore>,
        typing_expiry: Duration,
    ) -> Result<Self> {
        let session_id = session_id.into();
        channel.subscribe_chat(&session_id).await?;

        let shared = Arc::new(ChatShared {
            session_id,
            local,
            channel: Arc::clone(&channel),
            messages: Mutex::new(Vec::new()),
            typing: Mutex::new(HashMap::new()),
            typing_timer: Mutex::new(None),
            events: EventEmitter::new(),
        });

        let listener = Arc::clone(&shared);
        let chat_sub = channel.chat_events().subscribe(move |signal: &ChatSignal| {
            listener.handle_signal(signal);
        });

        info!("Chat side-channel open for session {}", shared.session_id);

        Ok(Self {
            shared,
            store,
            typing_expiry,
            chat_sub,
        })
    }

    /// Chat activity stream for the UI layer
    pub fn events(&self) -> &EventEmitter<ChatEvent> {
        &self.shared.events
    }

    /// Current local message list, oldest first
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.shared.messages.lock().clone()
    }

    /// Remote users currently typing
    pub fn typing_users(&self) -> Vec<TypingIndicator> {
        self.shared
            .typing
            .lock()
            .values()
            .filter(|t| t.is_typing)
            .cloned()
            .collect()
    }

    /// Send a chat message
    ///
    /// The message is appended locally and emitted before either write
    /// path runs. The REST persist decides the returned result; the
    /// relay publish is attempted regardless and only reported.
    pub async fn send_message(&self, body: impl Into<String>) -> Result<ChatMessage> {
        let message = ChatMessage::new(
            self.shared.session_id.clone(),
            self.shared.local.user_id.clone(),
            self.shared.local.display_name.clone(),
            self.shared.local.role,
            body,
        );

        self.shared.append_if_new(&message);
        self.shared.events.emit(&ChatEvent::MessageAppended {
            message: message.clone(),
            persisted: false,
        });

        let persist_result = self.store.save_message(&message).await;
        match &persist_result {
            Ok(()) => {
                self.shared.events.emit(&ChatEvent::MessagePersisted {
                    message_id: message.id,
                });
            }
            Err(e) => {
                warn!("Failed to persist message {}: {}", message.id, e);
                self.shared.events.emit(&ChatEvent::Fault(e.to_string()));
            }
        }

        let signal = ChatSignal::Message {
            message: message.clone(),
        };
        if let Err(e) = self
            .shared
            .channel
            .send_chat(&self.shared.session_id, &signal)
            .await
        {
            warn!("Failed to publish message {}: {}", message.id, e);
            self.shared.events.emit(&ChatEvent::Fault(e.to_string()));
        }

        persist_result.map(|()| message)
    }

    /// Mark the counterpart's messages as read
    ///
    /// Flips the flag locally, persists the read state, and notifies
    /// the counterpart over the relay.
    pub async fn mark_read(&self) -> Result<()> {
        {
            let mut messages = self.shared.messages.lock();
            for message in messages
                .iter_mut()
                .filter(|m| m.sender_id != self.shared.local.user_id)
            {
                message.read = true;
            }
        }

        let persist_result = self
            .store
            .mark_read(&self.shared.session_id, &self.shared.local.user_id)
            .await;
        if let Err(e) = &persist_result {
            warn!("Failed to persist read state: {}", e);
            self.shared.events.emit(&ChatEvent::Fault(e.to_string()));
        }

        let receipt = ReadReceipt {
            session_id: self.shared.session_id.clone(),
            reader_id: self.shared.local.user_id.clone(),
        };
        if let Err(e) = self
            .shared
            .channel
            .send_chat(&self.shared.session_id, &ChatSignal::Read { receipt })
            .await
        {
            warn!("Failed to publish read receipt: {}", e);
            self.shared.events.emit(&ChatEvent::Fault(e.to_string()));
        }

        persist_result
    }

    /// Publish the local typing state
    ///
    /// `true` arms (or re-arms) the expiry timer; if it fires with no
    /// further keystroke an explicit stop is sent. `false` cancels the
    /// timer and sends the stop immediately.
    pub async fn set_typing(&self, is_typing: bool) -> Result<()> {
        if !is_typing {
            self.shared.cancel_typing_timer();
            return self.shared.publish_typing(false).await;
        }

        self.shared.publish_typing(true).await?;

        let shared = Arc::clone(&self.shared);
        let expiry = self.typing_expiry;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(expiry).await;
            debug!("Typing state expired, sending stop");
            if let Err(e) = shared.publish_typing(false).await {
                debug!("Failed to send typing stop: {}", e);
            }
        });
        if let Some(old) = self.shared.typing_timer.lock().replace(handle) {
            old.abort();
        }
        Ok(())
    }

    /// Fetch the session's persisted messages and rebuild the local list
    ///
    /// Optimistic messages the store does not know yet survive the
    /// rebuild; overlap is deduplicated by id. Returns the number of
    /// persisted messages fetched.
    pub async fn load_history(&self) -> Result<usize> {
        let history = self.store.history(&self.shared.session_id).await?;
        let count = history.len();

        {
            let mut messages = self.shared.messages.lock();
            let mut merged = history;
            for existing in messages.iter() {
                if !merged.iter().any(|m| m.id == existing.id) {
                    merged.push(existing.clone());
                }
            }
            *messages = merged;
        }

        self.shared.events.emit(&ChatEvent::HistoryLoaded { count });
        Ok(count)
    }

    /// Cancel the typing timer and drop the chat subscriptions
    pub async fn dispose(&self) {
        self.shared.cancel_typing_timer();
        self.shared.channel.chat_events().unsubscribe(&self.chat_sub);
        if let Err(e) = self
            .shared
            .channel
            .unsubscribe_chat(&self.shared.session_id)
            .await
        {
            debug!("Failed to unsubscribe chat topic: {}", e);
        }
    }
}

impl Drop for ChatChannel {
    fn drop(&mut self) {
        self.shared.cancel_typing_timer();
        self.shared.channel.chat_events().unsubscribe(&self.chat_sub);
    }
}

//! Chat data model: messages, typing indicators, read receipts

use crate::identity::ParticipantRole;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A chat message exchanged during a consultation session
///
/// Messages are append-only per session; there is no edit or delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Message id, assigned by the sender
    pub id: Uuid,

    /// Session the message belongs to
    pub session_id: String,

    /// Sender user id, used for self-echo filtering
    pub sender_id: String,

    /// Sender display name
    pub sender_name: Option<String>,

    /// Sender role
    pub sender_role: ParticipantRole,

    /// Message text
    pub body: String,

    /// Send timestamp
    pub sent_at: DateTime<Utc>,

    /// Whether the counterpart has read the message
    pub read: bool,
}

impl ChatMessage {
    /// Build a new unread message stamped with the current time
    pub fn new(
        session_id: impl Into<String>,
        sender_id: impl Into<String>,
        sender_name: Option<String>,
        sender_role: ParticipantRole,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id: session_id.into(),
            sender_id: sender_id.into(),
            sender_name,
            sender_role,
            body: body.into(),
            sent_at: Utc::now(),
            read: false,
        }
    }
}

/// Ephemeral typing state for one user
///
/// Not persisted; each indicator supersedes the previous one for the
/// same user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingIndicator {
    /// User whose keyboard state changed
    pub user_id: String,

    /// Display name for the typing banner
    pub user_name: Option<String>,

    /// True while the user is typing
    pub is_typing: bool,
}

/// Notification that a participant has read the session's messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    /// Session the receipt applies to
    pub session_id: String,

    /// User who read the messages
    pub reader_id: String,
}

/// Coarse connection-quality estimate derived from peer link state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionQuality {
    /// No state transition observed yet
    Unknown,
    /// Link reported connected
    Good,
    /// Link reported disconnected or failed
    Poor,
}

//! Signaling envelope types
//!
//! One envelope carries one signaling event for a session. The wire form
//! is the relay's JSON dialect: a `kind` tag plus camelCase fields.

use serde::{Deserialize, Serialize};
use vitacall_core::{Error, Result};

/// ICE candidate payload as carried by the relay
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidatePayload {
    /// Candidate attribute line
    pub candidate: String,

    /// Media stream identification tag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,

    /// Index of the media description the candidate belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdp_m_line_index: Option<u16>,
}

/// One signaling event scoped to a session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SignalEnvelope {
    /// A participant asks to join the session (patient → doctor)
    Join {
        /// Session the event belongs to
        #[serde(rename = "sessionId")]
        session_id: String,
        /// Originating user
        #[serde(rename = "fromUserId")]
        from_user_id: String,
        /// Originator display name
        #[serde(rename = "fromUserName", skip_serializing_if = "Option::is_none")]
        from_user_name: Option<String>,
    },

    /// SDP offer (doctor → patient, sent on admission)
    Offer {
        /// Session the event belongs to
        #[serde(rename = "sessionId")]
        session_id: String,
        /// Originating user
        #[serde(rename = "fromUserId")]
        from_user_id: String,
        /// Originator display name
        #[serde(rename = "fromUserName", skip_serializing_if = "Option::is_none")]
        from_user_name: Option<String>,
        /// SDP offer body
        sdp: String,
    },

    /// SDP answer (patient → doctor)
    Answer {
        /// Session the event belongs to
        #[serde(rename = "sessionId")]
        session_id: String,
        /// Originating user
        #[serde(rename = "fromUserId")]
        from_user_id: String,
        /// Originator display name
        #[serde(rename = "fromUserName", skip_serializing_if = "Option::is_none")]
        from_user_name: Option<String>,
        /// SDP answer body
        sdp: String,
    },

    /// Locally discovered ICE candidate forwarded to the other side
    IceCandidate {
        /// Session the event belongs to
        #[serde(rename = "sessionId")]
        session_id: String,
        /// Originating user
        #[serde(rename = "fromUserId")]
        from_user_id: String,
        /// Originator display name
        #[serde(rename = "fromUserName", skip_serializing_if = "Option::is_none")]
        from_user_name: Option<String>,
        /// Candidate payload
        candidate: IceCandidatePayload,
    },

    /// A participant left the session
    Leave {
        /// Session the event belongs to
        #[serde(rename = "sessionId")]
        session_id: String,
        /// Originating user
        #[serde(rename = "fromUserId")]
        from_user_id: String,
        /// Originator display name
        #[serde(rename = "fromUserName", skip_serializing_if = "Option::is_none")]
        from_user_name: Option<String>,
    },
}

impl SignalEnvelope {
    /// Session the envelope is scoped to
    pub fn session_id(&self) -> &str {
        match self {
            SignalEnvelope::Join { session_id, .. }
            | SignalEnvelope::Offer { session_id, .. }
            | SignalEnvelope::Answer { session_id, .. }
            | SignalEnvelope::IceCandidate { session_id, .. }
            | SignalEnvelope::Leave { session_id, .. } => session_id,
        }
    }

    /// Originating user id; equal to the local user id on a self-echo
    pub fn from_user_id(&self) -> &str {
        match self {
            SignalEnvelope::Join { from_user_id, .. }
            | SignalEnvelope::Offer { from_user_id, .. }
            | SignalEnvelope::Answer { from_user_id, .. }
            | SignalEnvelope::IceCandidate { from_user_id, .. }
            | SignalEnvelope::Leave { from_user_id, .. } => from_user_id,
        }
    }

    /// Originator display name, when carried
    pub fn from_user_name(&self) -> Option<&str> {
        match self {
            SignalEnvelope::Join { from_user_name, .. }
            | SignalEnvelope::Offer { from_user_name, .. }
            | SignalEnvelope::Answer { from_user_name, .. }
            | SignalEnvelope::IceCandidate { from_user_name, .. }
            | SignalEnvelope::Leave { from_user_name, .. } => from_user_name.as_deref(),
        }
    }

    /// Wire name of the envelope kind
    pub fn kind_name(&self) -> &'static str {
        match self {
            SignalEnvelope::Join { .. } => "join",
            SignalEnvelope::Offer { .. } => "offer",
            SignalEnvelope::Answer { .. } => "answer",
            SignalEnvelope::IceCandidate { .. } => "ice-candidate",
            SignalEnvelope::Leave { .. } => "leave",
        }
    }

    /// Convert to the relay's JSON wire form
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| Error::Transport(format!("Failed to serialize envelope: {}", e)))
    }

    /// Parse from the relay's JSON wire form
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::SignalHandlingFailed(format!("Malformed envelope: {}", e)))
    }
}

/// Chat traffic carried on the session's chat topic
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ChatSignal {
    /// A chat message (also persisted via the REST path)
    Message {
        /// The message body
        message: vitacall_core::ChatMessage,
    },

    /// Ephemeral typing state
    Typing {
        /// Session the indicator belongs to
        #[serde(rename = "sessionId")]
        session_id: String,
        /// The indicator
        indicator: vitacall_core::TypingIndicator,
    },

    /// The counterpart read the session's messages
    Read {
        /// The receipt
        receipt: vitacall_core::ReadReceipt,
    },
}

impl ChatSignal {
    /// Originating user id of the signal
    pub fn from_user_id(&self) -> &str {
        match self {
            ChatSignal::Message { message } => &message.sender_id,
            ChatSignal::Typing { indicator, .. } => &indicator.user_id,
            ChatSignal::Read { receipt } => &receipt.reader_id,
        }
    }

    /// Convert to the relay's JSON wire form
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| Error::Transport(format!("Failed to serialize chat signal: {}", e)))
    }

    /// Parse from the relay's JSON wire form
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::SignalHandlingFailed(format!("Malformed chat signal: {}", e)))
    }
}

/// Relay topic carrying signaling envelopes for a session
pub fn signal_topic(session_id: &str) -> String {
    format!("vitacall/session/{}/signal", session_id)
}

/// Relay topic carrying chat traffic for a session
pub fn chat_topic(session_id: &str) -> String {
    format!("vitacall/session/{}/chat", session_id)
}

//! Participant identity for consultation sessions

use serde::{Deserialize, Serialize};

/// Role of a session participant
///
/// The doctor is the admitting side of the waiting-room handshake; the
/// patient is the waiting side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    /// Admitting role
    Doctor,
    /// Waiting role
    Patient,
}

impl ParticipantRole {
    /// The role on the other side of the session
    pub fn counterpart(&self) -> ParticipantRole {
        match self {
            ParticipantRole::Doctor => ParticipantRole::Patient,
            ParticipantRole::Patient => ParticipantRole::Doctor,
        }
    }
}

/// A session participant as seen by the signaling core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Stable user identifier, used for self-echo filtering
    pub user_id: String,

    /// Display name shown in the waiting room and chat
    pub display_name: Option<String>,

    /// Doctor or patient
    pub role: ParticipantRole,
}

impl Participant {
    /// Create a participant
    pub fn new(
        user_id: impl Into<String>,
        display_name: Option<String>,
        role: ParticipantRole,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            display_name,
            role,
        }
    }

    /// Display name, falling back to the user id
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.user_id)
    }
}

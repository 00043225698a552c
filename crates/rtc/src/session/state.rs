//! Call phase and admission state machines
//!
//! All admission mutation goes through the transition methods here, so
//! invalid combinations (a patient both waiting and admitted, an
//! admission without a join) cannot be represented.

use crate::signaling::ChannelStatus;
use vitacall_core::{ConnectionQuality, Error, ParticipantRole};

/// Phase of one call attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    /// No call in progress
    Idle,
    /// Call start requested, acquiring local media
    Connecting,
    /// Local tracks captured, peer link not yet built
    MediaAcquired,
    /// Peer link built and wired, waiting for the channel barrier
    PeerReady,
    /// Both the peer link and the signal channel are ready
    InCall,
    /// Call finished, locally or by remote leave
    Ended,
    /// Current attempt failed; `retry` re-enters at `Connecting`
    Failed(FailureKind),
}

impl CallPhase {
    /// Whether a call attempt is underway
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            CallPhase::Connecting | CallPhase::MediaAcquired | CallPhase::PeerReady | CallPhase::InCall
        )
    }
}

/// Distinguished cause carried by [`CallPhase::Failed`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Camera/microphone permission was refused
    PermissionDenied,
    /// No usable capture device
    DeviceNotFound,
    /// Peer link construction or negotiation failed
    PeerSetup,
    /// Anything else
    Unknown,
}

impl FailureKind {
    /// Classify a setup-path error
    pub fn from_error(err: &Error) -> Self {
        match err {
            Error::PermissionDenied(_) => FailureKind::PermissionDenied,
            Error::DeviceNotFound(_) => FailureKind::DeviceNotFound,
            Error::PeerSetupFailed(_) => FailureKind::PeerSetup,
            _ => FailureKind::Unknown,
        }
    }
}

/// Doctor-side admission slot
///
/// Single slot, first join wins. The slot moves forward only: a join
/// fills it, the remote answer promotes it, and only leave or cleanup
/// empties it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DoctorAdmission {
    /// Waiting room is empty
    NoOneWaiting,
    /// A patient joined and awaits admission
    PatientWaiting {
        /// Joining patient's user ID
        user_id: String,
        /// Joining patient's display name
        display_name: Option<String>,
    },
    /// The patient completed admission and is in the call
    PatientAdmitted {
        /// Admitted patient's user ID
        user_id: String,
        /// Admitted patient's display name
        display_name: Option<String>,
    },
}

impl DoctorAdmission {
    /// Record an incoming join
    ///
    /// Fills the slot only when empty. Joins while someone is already
    /// waiting or admitted are dropped, including re-joins from the
    /// same sender. Returns whether the slot changed.
    pub fn record_join(&mut self, user_id: &str, display_name: Option<&str>) -> bool {
        match self {
            DoctorAdmission::NoOneWaiting => {
                *self = DoctorAdmission::PatientWaiting {
                    user_id: user_id.to_string(),
                    display_name: display_name.map(|n| n.to_string()),
                };
                true
            }
            _ => false,
        }
    }

    /// Identity in the waiting slot, if a patient awaits admission
    pub fn waiting(&self) -> Option<(&str, Option<&str>)> {
        match self {
            DoctorAdmission::PatientWaiting {
                user_id,
                display_name,
            } => Some((user_id.as_str(), display_name.as_deref())),
            _ => None,
        }
    }

    /// Promote the waiting patient to admitted
    ///
    /// Fires on the remote answer. Returns `false` when no patient is
    /// waiting, which also makes a second admission of the same patient
    /// impossible without an intervening leave.
    pub fn promote(&mut self) -> bool {
        match self {
            DoctorAdmission::PatientWaiting {
                user_id,
                display_name,
            } => {
                *self = DoctorAdmission::PatientAdmitted {
                    user_id: std::mem::take(user_id),
                    display_name: display_name.take(),
                };
                true
            }
            _ => false,
        }
    }

    /// Clear the slot if `user_id` occupies it
    ///
    /// Fires on a remote leave. Returns whether the slot was cleared.
    pub fn clear_leaver(&mut self, user_id: &str) -> bool {
        let occupant = match self {
            DoctorAdmission::PatientWaiting { user_id, .. }
            | DoctorAdmission::PatientAdmitted { user_id, .. } => user_id.as_str(),
            DoctorAdmission::NoOneWaiting => return false,
        };

        if occupant == user_id {
            *self = DoctorAdmission::NoOneWaiting;
            true
        } else {
            false
        }
    }

    /// Empty the slot unconditionally
    pub fn reset(&mut self) {
        *self = DoctorAdmission::NoOneWaiting;
    }
}

/// Patient-side admission progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatientAdmission {
    /// Not yet announced to the doctor
    Idle,
    /// Join sent, awaiting the doctor's offer
    Waiting,
    /// The doctor's offer arrived and was applied
    Admitted,
}

impl PatientAdmission {
    /// Mark the join as sent
    pub fn begin_waiting(&mut self) {
        if *self == PatientAdmission::Idle {
            *self = PatientAdmission::Waiting;
        }
    }

    /// Consume the doctor's offer
    ///
    /// Only a waiting patient can be admitted; offers in any other
    /// state are dropped and this returns `false`.
    pub fn admit(&mut self) -> bool {
        if *self == PatientAdmission::Waiting {
            *self = PatientAdmission::Admitted;
            true
        } else {
            false
        }
    }

    /// Back to idle
    pub fn reset(&mut self) {
        *self = PatientAdmission::Idle;
    }
}

/// Admission state tagged by the local participant's role
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionState {
    /// Local participant admits
    Doctor(DoctorAdmission),
    /// Local participant waits to be admitted
    Patient(PatientAdmission),
}

impl AdmissionState {
    /// Fresh admission state for `role`
    pub fn for_role(role: ParticipantRole) -> Self {
        match role {
            ParticipantRole::Doctor => AdmissionState::Doctor(DoctorAdmission::NoOneWaiting),
            ParticipantRole::Patient => AdmissionState::Patient(PatientAdmission::Idle),
        }
    }

    /// Empty the admission state, keeping the role
    pub fn reset(&mut self) {
        match self {
            AdmissionState::Doctor(a) => a.reset(),
            AdmissionState::Patient(a) => a.reset(),
        }
    }
}

/// Point-in-time view of a session for the UI layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSnapshot {
    /// Current call phase
    pub phase: CallPhase,
    /// Signal channel status
    pub channel: ChannelStatus,
    /// Admission state for the local role
    pub admission: AdmissionState,
    /// Whether the microphone track is live
    pub audio_enabled: bool,
    /// Whether the camera track is live
    pub video_enabled: bool,
    /// Whether remote media has arrived
    pub remote_stream: bool,
    /// Whole seconds spent in the call
    pub call_seconds: u64,
    /// Connection quality estimate
    pub quality: ConnectionQuality,
}

/// Session activity surfaced to the UI layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The call phase changed
    PhaseChanged(CallPhase),

    /// The admission state changed
    AdmissionChanged(AdmissionState),

    /// Remote media arrived
    RemoteStream {
        /// Track kind, `audio` or `video`
        kind: String,
    },

    /// Remote media went away (remote leave or teardown)
    RemoteStreamCleared,

    /// One second of call time elapsed
    DurationTick(u64),

    /// Connection quality estimate changed
    QualityChanged(ConnectionQuality),

    /// Non-fatal fault worth showing to the user
    Warning(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doctor_slot_is_first_come() {
        let mut admission = DoctorAdmission::NoOneWaiting;

        assert!(admission.record_join("p1", Some("Ana")));
        assert!(!admission.record_join("p2", Some("Ben")));
        assert!(!admission.record_join("p1", Some("Ana again")));

        assert_eq!(admission.waiting(), Some(("p1", Some("Ana"))));
    }

    #[test]
    fn test_doctor_promote_requires_waiting() {
        let mut admission = DoctorAdmission::NoOneWaiting;
        assert!(!admission.promote());

        admission.record_join("p1", None);
        assert!(admission.promote());
        assert_eq!(
            admission,
            DoctorAdmission::PatientAdmitted {
                user_id: "p1".to_string(),
                display_name: None,
            }
        );

        // A second answer cannot admit again
        assert!(!admission.promote());
    }

    #[test]
    fn test_admitted_patient_cannot_rejoin_without_leave() {
        let mut admission = DoctorAdmission::NoOneWaiting;
        admission.record_join("p1", None);
        admission.promote();

        assert!(!admission.record_join("p1", None));
        assert!(admission.clear_leaver("p1"));
        assert!(admission.record_join("p1", None));
    }

    #[test]
    fn test_clear_leaver_matches_occupant_only() {
        let mut admission = DoctorAdmission::NoOneWaiting;
        admission.record_join("p1", None);

        assert!(!admission.clear_leaver("p2"));
        assert_eq!(admission.waiting(), Some(("p1", None)));

        assert!(admission.clear_leaver("p1"));
        assert_eq!(admission, DoctorAdmission::NoOneWaiting);
    }

    #[test]
    fn test_patient_admit_requires_waiting() {
        let mut admission = PatientAdmission::Idle;
        assert!(!admission.admit());

        admission.begin_waiting();
        assert!(admission.admit());
        assert_eq!(admission, PatientAdmission::Admitted);

        // Duplicate offer is dropped
        assert!(!admission.admit());
    }

    #[test]
    fn test_admission_state_for_role() {
        assert_eq!(
            AdmissionState::for_role(ParticipantRole::Doctor),
            AdmissionState::Doctor(DoctorAdmission::NoOneWaiting)
        );
        assert_eq!(
            AdmissionState::for_role(ParticipantRole::Patient),
            AdmissionState::Patient(PatientAdmission::Idle)
        );
    }

    #[test]
    fn test_failure_kind_classification() {
        assert_eq!(
            FailureKind::from_error(&Error::PermissionDenied("denied".into())),
            FailureKind::PermissionDenied
        );
        assert_eq!(
            FailureKind::from_error(&Error::DeviceNotFound("no camera".into())),
            FailureKind::DeviceNotFound
        );
        assert_eq!(
            FailureKind::from_error(&Error::PeerSetupFailed("no codecs".into())),
            FailureKind::PeerSetup
        );
        assert_eq!(
            FailureKind::from_error(&Error::Transport("socket".into())),
            FailureKind::Unknown
        );
    }

    #[test]
    fn test_active_phases() {
        assert!(CallPhase::Connecting.is_active());
        assert!(CallPhase::InCall.is_active());
        assert!(!CallPhase::Idle.is_active());
        assert!(!CallPhase::Ended.is_active());
        assert!(!CallPhase::Failed(FailureKind::Unknown).is_active());
    }
}

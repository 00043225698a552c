//! Session coordination: call phases, admission, negotiation

mod coordinator;
mod state;

pub use coordinator::SessionCoordinator;
pub use state::{
    AdmissionState, CallPhase, CallSnapshot, DoctorAdmission, FailureKind, PatientAdmission,
    SessionEvent,
};

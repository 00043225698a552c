//! Error types for the VitaCall signaling core

use thiserror::Error;

/// Result type alias for VitaCall operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the VitaCall signaling core
#[derive(Debug, Error)]
pub enum Error {
    /// Camera/microphone access was refused by the user or OS
    #[error("Media permission denied: {0}")]
    PermissionDenied(String),

    /// No usable camera or microphone was found
    #[error("Media device not found: {0}")]
    DeviceNotFound(String),

    /// Peer connection construction or negotiation failed
    #[error("Peer setup failed: {0}")]
    PeerSetupFailed(String),

    /// A send was attempted while the relay transport is not connected
    #[error("Signal channel disconnected: {0}")]
    ChannelDisconnected(String),

    /// Processing an incoming envelope failed (e.g. malformed candidate)
    #[error("Signal handling failed: {0}")]
    SignalHandlingFailed(String),

    /// The REST durability write for a message or receipt failed
    #[error("Persistence failed: {0}")]
    PersistenceFailed(String),

    /// Writing media samples into a live track failed
    #[error("Media error: {0}")]
    Media(String),

    /// Operation not valid for the caller's role or current phase
    #[error("Invalid session state: {0}")]
    InvalidState(String),

    /// Transport-level failure (socket, relay frame)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Configuration error
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether the error leaves the call state machine intact.
    ///
    /// Transient errors are surfaced to the user (toast/log) but do not
    /// move the coordinator into a failed phase; setup errors do.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::ChannelDisconnected(_)
                | Error::SignalHandlingFailed(_)
                | Error::PersistenceFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_cause() {
        let err = Error::PermissionDenied("user dismissed the prompt".to_string());
        assert!(err.to_string().contains("user dismissed the prompt"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::ChannelDisconnected("not connected".into()).is_transient());
        assert!(Error::PersistenceFailed("POST failed".into()).is_transient());
        assert!(Error::SignalHandlingFailed("bad candidate".into()).is_transient());
        assert!(!Error::PermissionDenied("denied".into()).is_transient());
        assert!(!Error::PeerSetupFailed("no ICE".into()).is_transient());
    }

    #[test]
    fn test_serde_json_conversion() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: Error = parse_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}

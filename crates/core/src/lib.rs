//! Shared foundation for the VitaCall consultation signaling core
//!
//! This crate carries everything the signaling crates have in common:
//!
//! - **Error taxonomy**: one [`Error`] enum covering media permissions,
//!   peer setup, relay connectivity, signal handling, and persistence
//! - **Configuration**: [`CoreConfig`] with validation
//! - **Identity**: [`Participant`] and [`ParticipantRole`]
//! - **Chat data model**: [`ChatMessage`], [`TypingIndicator`],
//!   [`ReadReceipt`]
//! - **Events**: [`EventEmitter`], a multi-subscriber listener list
//! - **Backoff**: [`BackoffPolicy`], bounded exponential delays with
//!   jitter and an explicit attempt budget
//! - **Storage**: [`MessageStore`] and its REST implementation

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backoff;
pub mod chat;
pub mod config;
pub mod error;
pub mod events;
pub mod identity;
pub mod store;

pub use backoff::BackoffPolicy;
pub use chat::{ChatMessage, ConnectionQuality, ReadReceipt, TypingIndicator};
pub use config::{BackoffConfig, CoreConfig, TurnServer};
pub use error::{Error, Result};
pub use events::{EventEmitter, Subscription};
pub use identity::{Participant, ParticipantRole};
pub use store::{HttpMessageStore, MessageStore};

/// Get the version of this crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

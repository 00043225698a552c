//! Configuration types for the signaling core

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration for the signaling core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Relay WebSocket URL (ws:// or wss://)
    pub relay_url: String,

    /// Base URL of the REST API used as the chat durability path
    pub rest_base_url: String,

    /// STUN server URLs (at least one required)
    pub stun_servers: Vec<String>,

    /// TURN server configurations (optional)
    pub turn_servers: Vec<TurnServer>,

    /// Relay reconnection policy
    pub reconnect: BackoffConfig,

    /// Seconds of keyboard silence before an outgoing typing indicator
    /// auto-expires (default: 3)
    pub typing_expiry_secs: u64,
}

/// TURN server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnServer {
    /// TURN server URL (turn:// or turns://)
    pub url: String,

    /// Username for TURN authentication
    pub username: String,

    /// Credential for TURN authentication
    pub credential: String,
}

/// Reconnection backoff parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// First retry delay in milliseconds (default: 1000)
    pub base_delay_ms: u64,

    /// Delay cap in milliseconds (default: 30000)
    pub max_delay_ms: u64,

    /// Growth factor per attempt (default: 2.0)
    pub multiplier: f64,

    /// Attempts before giving up and requiring a manual reconnect
    /// (default: 5)
    pub max_attempts: u32,

    /// Randomize each delay within [delay/2, delay] (default: true)
    pub jitter: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            relay_url: "ws://localhost:8080/relay".to_string(),
            rest_base_url: "http://localhost:8080/api".to_string(),
            stun_servers: vec!["stun:stun.l.google.com:19302".to_string()],
            turn_servers: Vec::new(),
            reconnect: BackoffConfig::default(),
            typing_expiry_secs: 3,
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            multiplier: 2.0,
            max_attempts: 5,
            jitter: true,
        }
    }
}

impl CoreConfig {
    /// Validate configuration parameters
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `relay_url` is not a WebSocket URL
    /// - `rest_base_url` is not an HTTP URL
    /// - `stun_servers` is empty
    /// - `typing_expiry_secs` is zero
    /// - the backoff parameters are out of range
    pub fn validate(&self) -> crate::Result<()> {
        use crate::Error;

        if !self.relay_url.starts_with("ws://") && !self.relay_url.starts_with("wss://") {
            return Err(Error::InvalidConfig(format!(
                "relay_url must start with ws:// or wss://, got {}",
                self.relay_url
            )));
        }

        if !self.rest_base_url.starts_with("http://") && !self.rest_base_url.starts_with("https://")
        {
            return Err(Error::InvalidConfig(format!(
                "rest_base_url must start with http:// or https://, got {}",
                self.rest_base_url
            )));
        }

        if self.stun_servers.is_empty() {
            return Err(Error::InvalidConfig(
                "At least one STUN server is required".to_string(),
            ));
        }

        if self.typing_expiry_secs == 0 {
            return Err(Error::InvalidConfig(
                "typing_expiry_secs must be at least 1".to_string(),
            ));
        }

        self.reconnect.validate()
    }

    /// Typing expiry as a [`Duration`]
    pub fn typing_expiry(&self) -> Duration {
        Duration::from_secs(self.typing_expiry_secs)
    }
}

impl BackoffConfig {
    /// Validate backoff parameters
    pub fn validate(&self) -> crate::Result<()> {
        use crate::Error;

        if self.base_delay_ms == 0 {
            return Err(Error::InvalidConfig(
                "base_delay_ms must be at least 1".to_string(),
            ));
        }

        if self.max_delay_ms < self.base_delay_ms {
            return Err(Error::InvalidConfig(format!(
                "max_delay_ms ({}) must be >= base_delay_ms ({})",
                self.max_delay_ms, self.base_delay_ms
            )));
        }

        if self.multiplier < 1.0 {
            return Err(Error::InvalidConfig(format!(
                "multiplier must be >= 1.0, got {}",
                self.multiplier
            )));
        }

        if self.max_attempts == 0 {
            return Err(Error::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

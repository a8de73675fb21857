//! Endpoint configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a listening endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`, localhost-only).
    pub host: String,
    /// Port to bind (default `19765`; `0` auto-assigns).
    pub port: u16,
    /// Handshake read timeout in seconds (default `10`).
    pub handshake_timeout_secs: u64,
    /// Fixed backoff after an accept error, in milliseconds (default `100`).
    pub accept_retry_delay_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 19765,
            handshake_timeout_secs: 10,
            accept_retry_delay_ms: 100,
        }
    }
}

impl ServerConfig {
    /// Handshake read timeout as a [`Duration`].
    #[must_use]
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    /// Accept-error backoff as a [`Duration`].
    #[must_use]
    pub fn accept_retry_delay(&self) -> Duration {
        Duration::from_millis(self.accept_retry_delay_ms)
    }
}

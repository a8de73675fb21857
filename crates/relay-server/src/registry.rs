//! Registry of running endpoints keyed by port.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::info;

use crate::config::ServerConfig;
use crate::endpoint::ListenEndpoint;
use crate::error::ServerError;

/// Tracks every live [`ListenEndpoint`] by bound port.
///
/// The lock guards only map access; endpoint startup and shutdown run
/// outside it so one slow endpoint never blocks the rest.
#[derive(Default)]
pub struct EndpointRegistry {
    endpoints: Mutex<HashMap<u16, ListenEndpoint>>,
}

impl EndpointRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an endpoint, returning the bound port.
    ///
    /// Fails with [`ServerError::AlreadyRunning`] if this registry
    /// already holds an endpoint on the requested port.
    pub async fn start(&self, config: ServerConfig) -> Result<u16, ServerError> {
        if config.port != 0 && self.endpoints.lock().contains_key(&config.port) {
            return Err(ServerError::AlreadyRunning(config.port));
        }

        let endpoint = ListenEndpoint::start(config).await?;
        let port = endpoint.port();
        let _ = self.endpoints.lock().insert(port, endpoint);
        Ok(port)
    }

    /// Stop the endpoint on `port` and wait for it to drain.
    pub async fn stop(&self, port: u16) -> Result<(), ServerError> {
        let endpoint = self
            .endpoints
            .lock()
            .remove(&port)
            .ok_or(ServerError::NotRunning(port))?;
        endpoint.stop().await;
        Ok(())
    }

    /// Queue a message toward the client on `port`, best-effort.
    pub fn send(&self, port: u16, message: Value) -> Result<(), ServerError> {
        let guard = self.endpoints.lock();
        let endpoint = guard.get(&port).ok_or(ServerError::NotRunning(port))?;
        endpoint.send(message);
        Ok(())
    }

    /// Ports with a running endpoint, unordered.
    #[must_use]
    pub fn ports(&self) -> Vec<u16> {
        self.endpoints.lock().keys().copied().collect()
    }

    /// Stop every endpoint, sequentially.
    pub async fn stop_all(&self) {
        let endpoints: Vec<ListenEndpoint> = {
            let mut guard = self.endpoints.lock();
            guard.drain().map(|(_, endpoint)| endpoint).collect()
        };
        let count = endpoints.len();
        for endpoint in endpoints {
            endpoint.stop().await;
        }
        if count > 0 {
            info!(count, "all endpoints stopped");
        }
    }
}

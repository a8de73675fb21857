//! A running listening endpoint: one port, one accept loop, one actor.

use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::acceptor::run_accept_loop;
use crate::config::ServerConfig;
use crate::connection::{EndpointCommand, run_endpoint};
use crate::error::ServerError;

/// Commands queued ahead of the actor before sends start dropping.
const COMMAND_QUEUE_DEPTH: usize = 64;

/// How long `stop` waits for the accept loop and actor to drain.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to a live endpoint.
///
/// Owns the cancellation token and task handles; dropping the handle
/// without calling [`stop`](Self::stop) leaks the tasks until the
/// runtime shuts down.
#[derive(Debug)]
pub struct ListenEndpoint {
    port: u16,
    tx: mpsc::Sender<EndpointCommand>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl ListenEndpoint {
    /// Bind the listening socket and spawn the accept loop and actor.
    ///
    /// With `config.port == 0` the OS assigns a port; read it back with
    /// [`port`](Self::port).
    pub async fn start(config: ServerConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind((config.host.as_str(), config.port))
            .await
            .map_err(|source| ServerError::Bind {
                port: config.port,
                source,
            })?;
        let port = listener
            .local_addr()
            .map_err(|source| ServerError::Bind {
                port: config.port,
                source,
            })?
            .port();

        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let cancel = CancellationToken::new();

        let actor = tokio::spawn(run_endpoint(port, rx, cancel.clone()));
        let acceptor = tokio::spawn(run_accept_loop(
            listener,
            tx.clone(),
            cancel.clone(),
            config.handshake_timeout(),
            config.accept_retry_delay(),
        ));

        info!(host = %config.host, port, "endpoint listening");
        Ok(Self {
            port,
            tx,
            cancel,
            tasks: vec![actor, acceptor],
        })
    }

    /// Port the endpoint is bound to.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Queue a message for the connected client, best-effort.
    ///
    /// Dropped silently when no client is connected; dropped with a log
    /// line when the actor's queue is full or gone.
    pub fn send(&self, message: Value) {
        if self.tx.try_send(EndpointCommand::Send(message)).is_err() {
            debug!(port = self.port, "dropping send, endpoint queue unavailable");
        }
    }

    /// Stop accepting, close any connected client, and wait for the
    /// endpoint's tasks to finish (bounded by [`DRAIN_TIMEOUT`]).
    pub async fn stop(self) {
        self.cancel.cancel();
        let drained = futures::future::join_all(self.tasks);
        if tokio::time::timeout(DRAIN_TIMEOUT, drained).await.is_err() {
            warn!(port = self.port, "endpoint tasks did not stop in time");
        }
        info!(port = self.port, "endpoint stopped");
    }
}

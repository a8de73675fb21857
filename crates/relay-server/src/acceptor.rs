//! Cancellable accept loop.
//!
//! Accepts raw TCP connections and spawns a handshake task per socket.
//! Successfully upgraded sockets are handed to the endpoint actor through
//! its command channel; the actor decides whether to adopt or reject them.

use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::connection::EndpointCommand;
use crate::upgrade::perform_upgrade;

/// Run the accept loop until the token is cancelled.
///
/// Accept errors are transient (fd exhaustion, aborted connections); the
/// loop logs them, backs off, and keeps going. Only cancellation ends it.
pub(crate) async fn run_accept_loop(
    listener: TcpListener,
    tx: mpsc::Sender<EndpointCommand>,
    cancel: CancellationToken,
    handshake_timeout: Duration,
    retry_delay: Duration,
) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "connection accepted");
                    let tx = tx.clone();
                    let _ = tokio::spawn(async move {
                        match perform_upgrade(stream, handshake_timeout).await {
                            Ok(upgraded) => {
                                // Ownership handoff: the actor adopts the
                                // socket or closes it with 1013.
                                if tx.send(EndpointCommand::Attach(upgraded)).await.is_err() {
                                    debug!(%peer, "endpoint actor gone, dropping upgraded socket");
                                }
                            }
                            Err(error) => warn!(%peer, %error, "handshake failed"),
                        }
                    });
                }
                Err(error) => {
                    warn!(%error, "accept failed, backing off");
                    tokio::time::sleep(retry_delay).await;
                }
            },
        }
    }
    debug!("accept loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpStream;

    const VALID_REQUEST: &[u8] = b"GET / HTTP/1.1\r\n\
        Host: localhost\r\n\
        Upgrade: websocket\r\n\
        Connection: Upgrade\r\n\
        Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
        Sec-WebSocket-Version: 13\r\n\r\n";

    #[tokio::test]
    async fn upgraded_socket_reaches_the_channel() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, mut rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();

        let _ = tokio::spawn(run_accept_loop(
            listener,
            tx,
            cancel.clone(),
            Duration::from_secs(1),
            Duration::from_millis(10),
        ));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(VALID_REQUEST).await.unwrap();

        let command = rx.recv().await.unwrap();
        assert_matches!(command, EndpointCommand::Attach(_));
        cancel.cancel();
    }

    #[tokio::test]
    async fn failed_handshake_sends_nothing() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, mut rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();

        let _ = tokio::spawn(run_accept_loop(
            listener,
            tx,
            cancel.clone(),
            Duration::from_secs(1),
            Duration::from_millis(10),
        ));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
        cancel.cancel();
    }

    #[tokio::test]
    async fn cancellation_stops_the_loop() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (tx, _rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run_accept_loop(
            listener,
            tx,
            cancel.clone(),
            Duration::from_secs(1),
            Duration::from_millis(10),
        ));

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("accept loop should stop promptly")
            .unwrap();
    }
}

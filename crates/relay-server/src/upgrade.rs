//! Server-side handshake driver.
//!
//! Reads the client's HTTP Upgrade request off a raw socket (bounded in
//! time and size), validates it through `relay-protocol`, and writes the
//! `101` or `400` response. Runs on its own task per connection so a slow
//! handshake never blocks the accept loop.

use std::io;
use std::time::Duration;

use relay_protocol::{
    HandshakeError, accept_response, compute_accept_key, parse_headers, reject_response, validate,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// Upper bound on the request header block.
const MAX_REQUEST_BYTES: usize = 8 * 1024;

/// Failures of one handshake attempt. Fatal to the attempt only; the
/// endpoint keeps accepting.
#[derive(Debug, thiserror::Error)]
pub(crate) enum UpgradeError {
    /// The client did not complete its request within the timeout.
    #[error("handshake timed out")]
    Timeout,

    /// Header block exceeded [`MAX_REQUEST_BYTES`].
    #[error("request header block too large")]
    RequestTooLarge,

    /// Peer closed the socket before the header block ended.
    #[error("connection closed during handshake")]
    ClosedEarly,

    /// Request failed header validation; a 400 was sent.
    #[error("handshake rejected: {0}")]
    Rejected(#[from] HandshakeError),

    /// Socket I/O failure.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Drive the handshake to completion, returning the upgraded socket.
///
/// On validation failure the 400 response is written and the socket is
/// closed before the error is returned. On timeout the socket is simply
/// dropped; there is no retry.
pub(crate) async fn perform_upgrade(
    mut stream: TcpStream,
    timeout: Duration,
) -> Result<TcpStream, UpgradeError> {
    let Ok(raw) = tokio::time::timeout(timeout, read_header_block(&mut stream)).await else {
        return Err(UpgradeError::Timeout);
    };
    let raw = raw?;

    let headers = parse_headers(&raw);
    match validate(&headers) {
        Ok(key) => {
            let accept = compute_accept_key(key);
            stream
                .write_all(accept_response(&accept).as_bytes())
                .await?;
            debug!(peer = ?stream.peer_addr().ok(), "handshake accepted");
            Ok(stream)
        }
        Err(reason) => {
            let _ = stream.write_all(reject_response().as_bytes()).await;
            let _ = stream.shutdown().await;
            Err(UpgradeError::Rejected(reason))
        }
    }
}

/// Read until the blank line terminating the header block.
async fn read_header_block(stream: &mut TcpStream) -> Result<Vec<u8>, UpgradeError> {
    let mut request = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(UpgradeError::ClosedEarly);
        }
        request.extend_from_slice(&chunk[..n]);
        if request.windows(4).any(|window| window == b"\r\n\r\n") {
            return Ok(request);
        }
        if request.len() > MAX_REQUEST_BYTES {
            return Err(UpgradeError::RequestTooLarge);
        }
    }
}

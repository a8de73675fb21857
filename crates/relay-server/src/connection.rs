//! Per-endpoint connection lifecycle actor.
//!
//! One task per listening port owns at most one client socket plus its
//! receive buffer. All external requests (socket handoff from the accept
//! path, application sends) arrive on a single `mpsc` channel, so frame
//! decodes and writes for a connection are never interleaved.

use std::io;
use std::time::Instant;

use bytes::BytesMut;
use relay_protocol::{
    CLOSE_PROTOCOL_ERROR, CLOSE_TRY_AGAIN_LATER, FrameError, InboundFrame, decode, encode_close,
    encode_pong, encode_text,
};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Requests routed through an endpoint's serialized event stream.
#[derive(Debug)]
pub(crate) enum EndpointCommand {
    /// Ownership handoff of a freshly upgraded socket from the handshake
    /// task. The sender retains no reference afterward.
    Attach(TcpStream),
    /// Best-effort application send to the current client.
    Send(Value),
}

/// The one client a Connected endpoint owns.
struct Client {
    stream: TcpStream,
    /// Partial-frame residue between socket reads.
    buffer: BytesMut,
    connected_at: Instant,
}

enum State {
    Listening,
    Connected(Client),
}

/// What a select round observed; applied to the state afterwards so the
/// socket borrow taken inside `select!` has already ended.
enum Event {
    Command(Option<EndpointCommand>),
    Readable(io::Result<()>),
    Shutdown,
}

/// Whether the connection survives a batch of decoded frames.
#[derive(Debug, PartialEq, Eq)]
enum Drained {
    Open,
    Closed,
}

/// Run the lifecycle actor for one endpoint until cancellation or until
/// the command channel closes.
pub(crate) async fn run_endpoint(
    port: u16,
    mut rx: mpsc::Receiver<EndpointCommand>,
    cancel: CancellationToken,
) {
    let mut state = State::Listening;

    loop {
        let event = match &state {
            State::Listening => {
                tokio::select! {
                    () = cancel.cancelled() => Event::Shutdown,
                    cmd = rx.recv() => Event::Command(cmd),
                }
            }
            State::Connected(client) => {
                tokio::select! {
                    () = cancel.cancelled() => Event::Shutdown,
                    cmd = rx.recv() => Event::Command(cmd),
                    ready = client.stream.readable() => Event::Readable(ready),
                }
            }
        };

        match event {
            Event::Shutdown | Event::Command(None) => break,
            Event::Command(Some(EndpointCommand::Attach(stream))) => {
                attach(&mut state, stream, port).await;
            }
            Event::Command(Some(EndpointCommand::Send(value))) => {
                send_value(&mut state, &value, port).await;
            }
            Event::Readable(Err(e)) => {
                warn!(port, error = %e, "socket error, dropping client");
                disconnect(&mut state, port);
            }
            Event::Readable(Ok(())) => read_ready(&mut state, port).await,
        }
    }

    if let State::Connected(client) = &mut state {
        let _ = client.stream.shutdown().await;
    }
    debug!(port, "endpoint actor stopped");
}

/// Attach a validated socket, or reject it if a client is already active.
async fn attach(state: &mut State, mut stream: TcpStream, port: u16) {
    match state {
        State::Listening => {
            info!(port, peer = ?stream.peer_addr().ok(), "client connected");
            *state = State::Connected(Client {
                stream,
                buffer: BytesMut::with_capacity(4096),
                connected_at: Instant::now(),
            });
        }
        State::Connected(_) => {
            // Single-slot policy: the active client keeps the endpoint; the
            // newcomer is told to try again later.
            warn!(port, "rejecting second client while one is active");
            let _ = stream
                .write_all(&encode_close(Some(CLOSE_TRY_AGAIN_LATER)))
                .await;
            let _ = stream.shutdown().await;
        }
    }
}

/// Serialize and write an application message. Not connected → dropped.
async fn send_value(state: &mut State, value: &Value, port: u16) {
    match state {
        State::Connected(client) => {
            let frame = encode_text(value.to_string().as_bytes());
            if let Err(e) = client.stream.write_all(&frame).await {
                warn!(port, error = %e, "send failed, dropping client");
                disconnect(state, port);
            }
        }
        State::Listening => {
            debug!(port, "dropping send, no client attached");
        }
    }
}

/// Pull available bytes off the socket and process complete frames.
async fn read_ready(state: &mut State, port: u16) {
    let State::Connected(client) = state else {
        return;
    };

    match client.stream.try_read_buf(&mut client.buffer) {
        // EOF: peer went away, the endpoint itself is unaffected.
        Ok(0) => disconnect(state, port),
        Ok(_) => {
            if drain_frames(client, port).await == Drained::Closed {
                disconnect(state, port);
            }
        }
        // Readiness was a false positive; try again next round.
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
        Err(e) => {
            warn!(port, error = %e, "read error, dropping client");
            disconnect(state, port);
        }
    }
}

/// Decode and dispatch every complete frame in the buffer.
async fn drain_frames(client: &mut Client, port: u16) -> Drained {
    loop {
        match decode(&client.buffer) {
            Ok((frame, consumed)) => {
                let _ = client.buffer.split_to(consumed);
                match frame {
                    InboundFrame::Text(payload) => {
                        let response = respond_to_text(&payload);
                        debug!(port, bytes = payload.len(), "text frame handled");
                        if client
                            .stream
                            .write_all(&encode_text(response.as_bytes()))
                            .await
                            .is_err()
                        {
                            return Drained::Closed;
                        }
                    }
                    InboundFrame::Ping => {
                        if client.stream.write_all(&encode_pong()).await.is_err() {
                            return Drained::Closed;
                        }
                    }
                    InboundFrame::Pong => {}
                    InboundFrame::Close => {
                        let _ = client.stream.write_all(&encode_close(None)).await;
                        let _ = client.stream.shutdown().await;
                        return Drained::Closed;
                    }
                }
            }
            // Partial frame: hold the residue and wait for more bytes.
            Err(FrameError::Incomplete) => return Drained::Open,
            // Lenient: a feature gap is not worth the connection.
            Err(FrameError::Unsupported { reason, consumed }) => {
                warn!(port, reason, "skipping unsupported frame");
                let _ = client.buffer.split_to(consumed);
            }
            Err(FrameError::ProtocolViolation(reason)) => {
                warn!(port, reason, "protocol violation, closing with 1002");
                let _ = client
                    .stream
                    .write_all(&encode_close(Some(CLOSE_PROTOCOL_ERROR)))
                    .await;
                let _ = client.stream.shutdown().await;
                return Drained::Closed;
            }
        }
    }
}

/// Tear the connection down and return to Listening.
fn disconnect(state: &mut State, port: u16) {
    if let State::Connected(client) = state {
        info!(
            port,
            connected_secs = client.connected_at.elapsed().as_secs(),
            "client disconnected"
        );
    }
    *state = State::Listening;
}

/// Decode a text payload as JSON, run the command handler, and serialize
/// the response. Decode failures become the structured error value; no
/// payload tears the connection down.
fn respond_to_text(payload: &[u8]) -> String {
    let response = match serde_json::from_slice::<Value>(payload) {
        Ok(value) => relay_commands::handle_command(value),
        Err(e) => relay_commands::error_response("invalid_json", Value::String(e.to_string())),
    };
    response.to_string()
}

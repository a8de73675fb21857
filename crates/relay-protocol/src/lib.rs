//! # relay-protocol
//!
//! From-scratch implementation of the `WebSocket` wire protocol (RFC 6455):
//!
//! - Frame encoding/decoding with masking enforcement ([`frame`])
//! - The opening HTTP Upgrade handshake ([`handshake`])
//!
//! Pure wire-level code: no I/O, no async. The connection lifecycle that
//! drives this codec lives in `relay-server`.

#![deny(unsafe_code)]

pub mod frame;
pub mod handshake;

pub use frame::{
    CLOSE_PROTOCOL_ERROR, CLOSE_TRY_AGAIN_LATER, FrameError, InboundFrame, Opcode, apply_mask,
    decode, encode_close, encode_pong, encode_text,
};
pub use handshake::{
    HandshakeError, accept_response, compute_accept_key, parse_headers, reject_response, validate,
};

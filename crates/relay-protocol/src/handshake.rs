//! WebSocket opening handshake (RFC 6455 §4.2).
//!
//! Validates the client's HTTP Upgrade request and produces the
//! `101 Switching Protocols` response:
//!
//! ```http
//! GET / HTTP/1.1
//! Host: server.example.com
//! Upgrade: websocket
//! Connection: Upgrade
//! Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==
//! Sec-WebSocket-Version: 13
//! ```

use std::collections::HashMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use sha1::{Digest, Sha1};

/// RFC 6455 GUID appended to the client key before hashing.
const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Handshake validation errors, in check order.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HandshakeError {
    /// `Upgrade` header absent or not `websocket`.
    #[error("missing or invalid Upgrade header")]
    InvalidUpgrade,

    /// `Connection` header absent or lacking the `upgrade` token.
    #[error("Connection header does not contain the upgrade token")]
    InvalidConnection,

    /// `Sec-WebSocket-Key` absent or not a base64-encoded 16-byte value.
    #[error("missing or invalid Sec-WebSocket-Key")]
    InvalidKey,

    /// `Sec-WebSocket-Version` absent or not `13`.
    #[error("unsupported Sec-WebSocket-Version")]
    UnsupportedVersion,
}

/// Parse an HTTP header block into a lower-cased name → value map.
///
/// Lines are split on CRLF; parsing stops at the first empty line (end of
/// the header block), so any body bytes are ignored. Each header line is
/// split once on `": "`. The last occurrence of a duplicated header wins.
/// The request line has no `": "` separator and falls through untouched.
#[must_use]
pub fn parse_headers(raw: &[u8]) -> HashMap<String, String> {
    let text = String::from_utf8_lossy(raw);
    let mut headers = HashMap::new();

    for line in text.split("\r\n") {
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(": ") {
            let _ = headers.insert(name.to_ascii_lowercase(), value.to_string());
        }
    }

    headers
}

/// Validate the five RFC-mandated headers, returning the raw client key.
///
/// Checks run in a fixed order and the first failure is returned.
pub fn validate(headers: &HashMap<String, String>) -> Result<&str, HandshakeError> {
    let upgrade = headers.get("upgrade").ok_or(HandshakeError::InvalidUpgrade)?;
    if !upgrade.eq_ignore_ascii_case("websocket") {
        return Err(HandshakeError::InvalidUpgrade);
    }

    let connection = headers
        .get("connection")
        .ok_or(HandshakeError::InvalidConnection)?;
    if !connection
        .split(',')
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
    {
        return Err(HandshakeError::InvalidConnection);
    }

    let key = headers
        .get("sec-websocket-key")
        .ok_or(HandshakeError::InvalidKey)?;
    match BASE64.decode(key) {
        Ok(decoded) if decoded.len() == 16 => {}
        _ => return Err(HandshakeError::InvalidKey),
    }

    let version = headers
        .get("sec-websocket-version")
        .ok_or(HandshakeError::UnsupportedVersion)?;
    if version != "13" {
        return Err(HandshakeError::UnsupportedVersion);
    }

    Ok(key)
}

/// Compute the `Sec-WebSocket-Accept` value for a client key.
///
/// Concatenate the key with the RFC GUID, SHA-1 hash, base64-encode
/// (RFC 6455 §4.2.2). The canonical example maps
/// `"dGhlIHNhbXBsZSBub25jZQ=="` to `"s3pPLMBiTxaQ9kYGzzhZRbK+xOo="`.
#[must_use]
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Render the `101 Switching Protocols` response for an accept key.
#[must_use]
pub fn accept_response(accept_key: &str) -> String {
    format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {accept_key}\r\n\r\n"
    )
}

/// Render the `400 Bad Request` response sent on validation failure.
#[must_use]
pub fn reject_response() -> String {
    "HTTP/1.1 400 Bad Request\r\n\
     Connection: close\r\n\
     Content-Length: 0\r\n\r\n"
        .to_string()
}

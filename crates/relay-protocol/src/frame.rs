//! WebSocket frame codec (RFC 6455 §5.2).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! +-+-+-+-+-------+-+-------------+ - - - - - - - - - - - - - - - +
//! |     Extended payload length continued, if payload len == 127  |
//! + - - - - - - - - - - - - - - - +-------------------------------+
//! |                               |Masking-key, if MASK set to 1  |
//! +-------------------------------+-------------------------------+
//! | Masking-key (continued)       |          Payload Data         |
//! +-------------------------------- - - - - - - - - - - - - - - - +
//! ```
//!
//! Encoding produces server-to-client frames (MASK=0). Decoding accepts
//! client-to-server frames and enforces the RFC masking rule: an inbound
//! frame without the MASK bit is a fatal protocol violation.

use bytes::{BufMut, Bytes, BytesMut};

/// Close status: protocol error (RFC 6455 §7.4.1).
pub const CLOSE_PROTOCOL_ERROR: u16 = 1002;
/// Close status: try again later (RFC 6455 §7.4.1, registered by RFC 6455bis).
pub const CLOSE_TRY_AGAIN_LATER: u16 = 1013;

/// Frame opcode (4 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// Continuation frame of a fragmented message.
    Continuation = 0x0,
    /// Text data frame.
    Text = 0x1,
    /// Binary data frame.
    Binary = 0x2,
    /// Connection close control frame.
    Close = 0x8,
    /// Ping control frame.
    Ping = 0x9,
    /// Pong control frame.
    Pong = 0xA,
}

impl Opcode {
    /// Parse an opcode from its 4-bit wire value. Reserved values yield `None`.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x0 => Some(Self::Continuation),
            0x1 => Some(Self::Text),
            0x2 => Some(Self::Binary),
            0x8 => Some(Self::Close),
            0x9 => Some(Self::Ping),
            0xA => Some(Self::Pong),
            _ => None,
        }
    }
}

/// An inbound frame, classified for the connection loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// Final text frame; payload already unmasked.
    Text(Vec<u8>),
    /// Close control frame.
    Close,
    /// Ping control frame.
    Ping,
    /// Pong control frame.
    Pong,
}

/// Frame decode errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    /// Not enough bytes for a complete frame. Recoverable: the caller keeps
    /// the buffer and retries once more data arrives.
    #[error("incomplete frame")]
    Incomplete,

    /// Fatal violation of the wire protocol. The connection must be closed
    /// with status 1002.
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    /// A well-formed frame this endpoint does not handle (fragmentation,
    /// binary data, reserved opcodes). Non-fatal: `consumed` covers the
    /// whole frame so the caller can skip it and keep the connection open.
    #[error("unsupported frame: {reason}")]
    Unsupported {
        /// What made the frame unsupported.
        reason: &'static str,
        /// Total frame length in bytes, for skipping.
        consumed: usize,
    },
}

/// Encode a single unfragmented text frame (FIN=1, RSV=0, opcode 1, MASK=0).
///
/// Any byte sequence is a valid payload; there is no error path.
#[must_use]
pub fn encode_text(payload: &[u8]) -> Bytes {
    encode_frame(Opcode::Text, payload)
}

/// Encode an unmasked Close frame carrying an optional status code.
#[must_use]
pub fn encode_close(status: Option<u16>) -> Bytes {
    match status {
        Some(code) => encode_frame(Opcode::Close, &code.to_be_bytes()),
        None => encode_frame(Opcode::Close, &[]),
    }
}

/// Encode an unmasked empty Pong frame.
#[must_use]
pub fn encode_pong() -> Bytes {
    encode_frame(Opcode::Pong, &[])
}

fn encode_frame(opcode: Opcode, payload: &[u8]) -> Bytes {
    let len = payload.len();
    let header_len = 2 + if len > 65535 {
        8
    } else if len > 125 {
        2
    } else {
        0
    };

    let mut buf = BytesMut::with_capacity(header_len + len);
    buf.put_u8(0x80 | opcode as u8);

    // Payload length: 7-bit direct, or 126/127 indicator + extension.
    if len <= 125 {
        buf.put_u8(len as u8);
    } else if len <= 65535 {
        buf.put_u8(126);
        buf.put_u16(len as u16);
    } else {
        buf.put_u8(127);
        buf.put_u64(len as u64);
    }

    buf.put_slice(payload);
    buf.freeze()
}

/// Decode one frame from the front of `buf`.
///
/// On success returns the classified frame and the number of bytes it
/// occupied; the caller advances its buffer by that amount. See
/// [`FrameError`] for the failure contract.
pub fn decode(buf: &[u8]) -> Result<(InboundFrame, usize), FrameError> {
    if buf.len() < 2 {
        return Err(FrameError::Incomplete);
    }

    let fin = (buf[0] & 0x80) != 0;
    let opcode_raw = buf[0] & 0x0F;
    let masked = (buf[1] & 0x80) != 0;
    let len7 = buf[1] & 0x7F;

    // Client-to-server frames must be masked (RFC 6455 §5.1). Fatal for
    // any opcode, checked as soon as the base header is readable.
    if !masked {
        return Err(FrameError::ProtocolViolation("unmasked frame"));
    }

    let (payload_len, length_end) = match len7 {
        126 => {
            if buf.len() < 4 {
                return Err(FrameError::Incomplete);
            }
            (u64::from(u16::from_be_bytes([buf[2], buf[3]])), 4)
        }
        127 => {
            if buf.len() < 10 {
                return Err(FrameError::Incomplete);
            }
            let mut len_bytes = [0u8; 8];
            len_bytes.copy_from_slice(&buf[2..10]);
            (u64::from_be_bytes(len_bytes), 10)
        }
        n => (u64::from(n), 2),
    };

    if buf.len() < length_end + 4 {
        return Err(FrameError::Incomplete);
    }
    let mut mask_key = [0u8; 4];
    mask_key.copy_from_slice(&buf[length_end..length_end + 4]);
    let payload_start = length_end + 4;

    // Compare by subtraction in u64: a hostile 64-bit length near u64::MAX
    // must not overflow before the availability check.
    if payload_len > (buf.len() - payload_start) as u64 {
        return Err(FrameError::Incomplete);
    }
    let payload_len = payload_len as usize;
    let consumed = payload_start + payload_len;

    let Some(opcode) = Opcode::from_u8(opcode_raw) else {
        return Err(FrameError::Unsupported {
            reason: "unknown opcode",
            consumed,
        });
    };

    if !fin {
        return Err(FrameError::Unsupported {
            reason: "fragmentation",
            consumed,
        });
    }

    let frame = match opcode {
        Opcode::Text => {
            let mut payload = buf[payload_start..consumed].to_vec();
            apply_mask(&mut payload, mask_key);
            InboundFrame::Text(payload)
        }
        Opcode::Close => InboundFrame::Close,
        Opcode::Ping => InboundFrame::Ping,
        Opcode::Pong => InboundFrame::Pong,
        Opcode::Continuation => {
            return Err(FrameError::Unsupported {
                reason: "fragmentation",
                consumed,
            });
        }
        Opcode::Binary => {
            return Err(FrameError::Unsupported {
                reason: "binary frame",
                consumed,
            });
        }
    };

    Ok((frame, consumed))
}

/// XOR the payload with the 4-byte masking key.
///
/// Byte `i` is XORed with `key[i % 4]`. Self-inverse: the same call masks
/// and unmasks.
pub fn apply_mask(payload: &mut [u8], key: [u8; 4]) {
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}

//! # relay-commands
//!
//! The demo command dispatcher behind the `WebSocket` endpoint. Every inbound
//! text frame decodes to a JSON value which is routed here; the returned
//! value is serialized and sent back as one text frame.
//!
//! Dispatch is a closed set of command variants keyed on the `type` /
//! `command` discriminant fields, with an explicit unknown-command default.
//! Faults never escape this boundary: malformed input produces a structured
//! error value, not a connection teardown.

#![deny(unsafe_code)]

use serde_json::{Value, json};
use tracing::debug;

/// The recognized command set, parsed from an inbound JSON value.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    /// `{"type":"ping","timestamp":...}`
    Ping { timestamp: Value },
    /// `{"command":"echo","data":...}`
    Echo { data: Value },
    /// `{"type":"json_test","data":...}`
    JsonTest { data: Value },
    /// `{"command":"status","request_id":...}`
    Status { request_id: Value },
    /// Anything else, echoed back in the error details.
    Unknown(Value),
}

impl Command {
    /// Classify a JSON value by its `type` / `command` discriminant.
    fn parse(message: Value) -> Self {
        let discriminant = message
            .get("type")
            .or_else(|| message.get("command"))
            .and_then(Value::as_str);

        match discriminant {
            Some("ping") => Self::Ping {
                timestamp: message.get("timestamp").cloned().unwrap_or(Value::Null),
            },
            Some("echo") => Self::Echo {
                data: message.get("data").cloned().unwrap_or(Value::Null),
            },
            Some("json_test") => Self::JsonTest {
                data: message.get("data").cloned().unwrap_or(Value::Null),
            },
            Some("status") => Self::Status {
                request_id: message.get("request_id").cloned().unwrap_or(Value::Null),
            },
            _ => Self::Unknown(message),
        }
    }
}

/// Handle one decoded command message, producing the response value.
///
/// Infallible by contract: unknown or malformed commands yield the
/// structured `unknown_command` error value.
#[must_use]
pub fn handle_command(message: Value) -> Value {
    match Command::parse(message) {
        Command::Ping { timestamp } => json!({
            "type": "pong",
            "timestamp": timestamp,
        }),
        Command::Echo { data } => {
            let text = match &data {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            json!({
                "type": "echo_response",
                "original": data,
                "response": format!("Echo: {text}"),
            })
        }
        Command::JsonTest { data } => json!({
            "type": "json_test_response",
            "received": data,
        }),
        Command::Status { request_id } => json!({
            "type": "status_response",
            "request_id": request_id,
            "status": "running",
        }),
        Command::Unknown(original) => {
            debug!("unknown command");
            error_response("unknown_command", original)
        }
    }
}

/// Build the structured error value sent to the peer for application-level
/// failures (unknown commands, malformed JSON payloads, handler faults).
#[must_use]
pub fn error_response(kind: &str, details: Value) -> Value {
    json!({
        "type": "error",
        "error": kind,
        "details": details,
    })
}

//! End-to-end tests over a real WebSocket client.

use futures_util::{SinkExt, StreamExt};
use relay_server::{ListenEndpoint, ServerConfig};
use serde_json::{Value, json};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

async fn start_endpoint() -> (ListenEndpoint, String) {
    let config = ServerConfig {
        port: 0,
        ..ServerConfig::default()
    };
    let endpoint = ListenEndpoint::start(config).await.unwrap();
    let url = format!("ws://127.0.0.1:{}", endpoint.port());
    (endpoint, url)
}

async fn next_json<S>(ws: &mut S) -> Value
where
    S: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let message = ws.next().await.unwrap().unwrap();
    serde_json::from_str(message.to_text().unwrap()).unwrap()
}

#[tokio::test]
async fn ping_round_trip() {
    let (endpoint, url) = start_endpoint().await;
    let (mut ws, _) = connect_async(&url).await.unwrap();

    ws.send(Message::text(
        r#"{"type":"ping","timestamp":"2025-01-01T00:00:00Z"}"#,
    ))
    .await
    .unwrap();

    let response = next_json(&mut ws).await;
    assert_eq!(response["type"], "pong");
    assert_eq!(response["timestamp"], "2025-01-01T00:00:00Z");

    endpoint.stop().await;
}

#[tokio::test]
async fn echo_command() {
    let (endpoint, url) = start_endpoint().await;
    let (mut ws, _) = connect_async(&url).await.unwrap();

    ws.send(Message::text(r#"{"command":"echo","data":"hi"}"#))
        .await
        .unwrap();

    let response = next_json(&mut ws).await;
    assert_eq!(response["type"], "echo_response");
    assert_eq!(response["original"], "hi");
    assert_eq!(response["response"], "Echo: hi");

    endpoint.stop().await;
}

#[tokio::test]
async fn json_test_round_trips_structured_data() {
    let (endpoint, url) = start_endpoint().await;
    let (mut ws, _) = connect_async(&url).await.unwrap();

    let data = json!({"nested": true, "value": 42});
    ws.send(Message::text(
        json!({"type": "json_test", "data": data}).to_string(),
    ))
    .await
    .unwrap();

    let response = next_json(&mut ws).await;
    assert_eq!(response["type"], "json_test_response");
    assert_eq!(response["received"], data);

    endpoint.stop().await;
}

#[tokio::test]
async fn status_command_carries_request_id() {
    let (endpoint, url) = start_endpoint().await;
    let (mut ws, _) = connect_async(&url).await.unwrap();

    ws.send(Message::text(r#"{"command":"status","request_id":"r1"}"#))
        .await
        .unwrap();

    let response = next_json(&mut ws).await;
    assert_eq!(response["type"], "status_response");
    assert_eq!(response["request_id"], "r1");
    assert_eq!(response["status"], "running");

    endpoint.stop().await;
}

#[tokio::test]
async fn unknown_command_yields_error() {
    let (endpoint, url) = start_endpoint().await;
    let (mut ws, _) = connect_async(&url).await.unwrap();

    ws.send(Message::text(r#"{"command":"frobnicate"}"#))
        .await
        .unwrap();

    let response = next_json(&mut ws).await;
    assert_eq!(response["type"], "error");
    assert_eq!(response["error"], "unknown_command");

    endpoint.stop().await;
}

#[tokio::test]
async fn invalid_json_yields_error_and_connection_survives() {
    let (endpoint, url) = start_endpoint().await;
    let (mut ws, _) = connect_async(&url).await.unwrap();

    ws.send(Message::text("not json")).await.unwrap();
    let response = next_json(&mut ws).await;
    assert_eq!(response["type"], "error");
    assert_eq!(response["error"], "invalid_json");

    // Still connected: a normal command works afterwards.
    ws.send(Message::text(r#"{"type":"ping","timestamp":1}"#))
        .await
        .unwrap();
    let response = next_json(&mut ws).await;
    assert_eq!(response["type"], "pong");

    endpoint.stop().await;
}

#[tokio::test]
async fn server_push_reaches_client() {
    let (endpoint, url) = start_endpoint().await;
    let (mut ws, _) = connect_async(&url).await.unwrap();

    // Make sure the attach has been processed before pushing.
    ws.send(Message::text(r#"{"type":"ping","timestamp":0}"#))
        .await
        .unwrap();
    let _ = next_json(&mut ws).await;

    endpoint.send(json!({"type": "notice", "detail": "pushed"}));

    let response = next_json(&mut ws).await;
    assert_eq!(response["type"], "notice");
    assert_eq!(response["detail"], "pushed");

    endpoint.stop().await;
}

#[tokio::test]
async fn second_client_rejected_while_first_connected() {
    let (endpoint, url) = start_endpoint().await;
    let (mut first, _) = connect_async(&url).await.unwrap();

    // Round-trip so the first attach is definitely in place.
    first
        .send(Message::text(r#"{"type":"ping","timestamp":0}"#))
        .await
        .unwrap();
    let _ = next_json(&mut first).await;

    let (mut second, _) = connect_async(&url).await.unwrap();
    let message = second.next().await.unwrap().unwrap();
    match message {
        Message::Close(Some(frame)) => assert_eq!(u16::from(frame.code), 1013),
        other => panic!("expected close frame, got {other:?}"),
    }

    // First client is untouched.
    first
        .send(Message::text(r#"{"type":"ping","timestamp":1}"#))
        .await
        .unwrap();
    let response = next_json(&mut first).await;
    assert_eq!(response["type"], "pong");

    endpoint.stop().await;
}

#[tokio::test]
async fn client_reconnect_after_close() {
    let (endpoint, url) = start_endpoint().await;

    let (mut ws, _) = connect_async(&url).await.unwrap();
    ws.send(Message::text(r#"{"type":"ping","timestamp":0}"#))
        .await
        .unwrap();
    let _ = next_json(&mut ws).await;
    ws.close(None).await.unwrap();
    drop(ws);

    // Endpoint returns to listening and accepts a fresh client.
    let (mut ws, _) = connect_async(&url).await.unwrap();
    ws.send(Message::text(r#"{"type":"ping","timestamp":2}"#))
        .await
        .unwrap();
    let response = next_json(&mut ws).await;
    assert_eq!(response["type"], "pong");
    assert_eq!(response["timestamp"], 2);

    endpoint.stop().await;
}

#[tokio::test]
async fn stop_disconnects_client_and_frees_port() {
    let (endpoint, url) = start_endpoint().await;
    let port = endpoint.port();
    let (mut ws, _) = connect_async(&url).await.unwrap();

    ws.send(Message::text(r#"{"type":"ping","timestamp":0}"#))
        .await
        .unwrap();
    let _ = next_json(&mut ws).await;

    endpoint.stop().await;

    // The client observes the close; the port refuses new connections.
    loop {
        match ws.next().await {
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
            Some(Ok(_)) => {}
        }
    }
    assert!(tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_err());
}

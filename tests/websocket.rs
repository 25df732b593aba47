//! End-to-end tests for the WebSocket adapter.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use koapp::config::PingConfig;
use koapp::AppConfig;

mod common;

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn next_json(ws: &mut Ws) -> Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a message")
            .expect("stream ended")
            .expect("read failed");
        if let Message::Text(text) = message {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

#[tokio::test]
async fn test_envelope_message_is_routed() {
    let server = common::spawn_websocket(common::test_app(AppConfig::default())).await;
    let (mut ws, _) = connect_async(format!("ws://{}/", server.addr)).await.unwrap();

    let request = json!({ "path": "/api/test/12", "method": "get" });
    ws.send(Message::text(request.to_string())).await.unwrap();
    let reply = next_json(&mut ws).await;
    assert_eq!(reply["code"], "200");
    assert_eq!(reply["data"], json!({ "id": "12", "transport": "websocket" }));

    server.stop().await;
}

#[tokio::test]
async fn test_bare_message_targets_upgrade_path() {
    let server = common::spawn_websocket(common::test_app(AppConfig::default())).await;
    let (mut ws, _) = connect_async(format!("ws://{}/api/live?room=a", server.addr))
        .await
        .unwrap();

    ws.send(Message::text(json!({ "hello": "world" }).to_string()))
        .await
        .unwrap();
    let reply = next_json(&mut ws).await;
    assert_eq!(reply["data"]["method"], "GET");
    assert_eq!(reply["data"]["pathinfo"], "/api/live");
    assert_eq!(reply["data"]["body"], json!({ "hello": "world" }));

    server.stop().await;
}

#[tokio::test]
async fn test_not_found_over_websocket() {
    let server = common::spawn_websocket(common::test_app(AppConfig::default())).await;
    let (mut ws, _) = connect_async(format!("ws://{}/", server.addr)).await.unwrap();

    ws.send(Message::text(json!({ "path": "/missing" }).to_string()))
        .await
        .unwrap();
    let reply = next_json(&mut ws).await;
    assert_eq!(reply["code"], "404");
    assert_eq!(reply["message"], "Not Found");

    server.stop().await;
}

#[tokio::test]
async fn test_connection_removed_on_close() {
    let app = common::test_app(AppConfig::default());
    let server = common::spawn_websocket(app.clone()).await;

    let (mut ws, _) = connect_async(format!("ws://{}/", server.addr)).await.unwrap();
    assert!(common::eventually(|| app.connections().len() == 1).await);

    ws.close(None).await.unwrap();
    assert!(common::eventually(|| app.connections().is_empty()).await);

    server.stop().await;
}

#[tokio::test]
async fn test_ping_is_broadcast() {
    let mut config = AppConfig::default();
    config.websocket.ping = PingConfig {
        enabled: true,
        interval_secs: 1,
        data: "are you there".into(),
    };
    let app = common::test_app(config);
    let server = common::spawn_websocket(app.clone()).await;

    let (mut ws, _) = connect_async(format!("ws://{}/", server.addr)).await.unwrap();
    let ping = next_json(&mut ws).await;
    assert_eq!(ping["message"], "ping");
    assert_eq!(ping["code"], 0);
    assert_eq!(ping["data"], "are you there");

    server.stop().await;
}

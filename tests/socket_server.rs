//! End-to-end tests for the raw socket adapter.

use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use koapp::net::{ClientError, SocketClient};
use koapp::AppConfig;

mod common;

#[tokio::test]
async fn test_request_reply_over_frames() {
    let app = common::test_app(AppConfig::default());
    let server = common::spawn_socket(app).await;

    let mut client = SocketClient::connect(server.addr).await.unwrap();
    let reply = client.send("get", "/api/test/9", json!({}), json!({})).await.unwrap();
    assert_eq!(reply["code"], "200");
    assert_eq!(reply["data"], json!({ "id": "9", "transport": "socket" }));
    assert!(reply["request_id"].as_str().is_some_and(|id| !id.is_empty()));

    let reply = client
        .send("post", "/api/items", json!({}), json!({ "name": "x" }))
        .await
        .unwrap();
    assert_eq!(reply["code"], "400");

    server.stop().await;
}

#[tokio::test]
async fn test_plain_json_frames_are_accepted() {
    let server = common::spawn_socket(common::test_app(AppConfig::default())).await;

    let mut client = SocketClient::connect(server.addr).await.unwrap();
    client
        .write_raw(br#"{"path":"/api/elsewhere","method":"DELETE"}"#)
        .await
        .unwrap();
    let reply = client.recv().await.unwrap();
    assert_eq!(reply["data"]["method"], "DELETE");
    assert_eq!(reply["data"]["pathinfo"], "/api/elsewhere");

    server.stop().await;
}

#[tokio::test]
async fn test_frames_split_across_writes() {
    let server = common::spawn_socket(common::test_app(AppConfig::default())).await;

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream.write_all(br#"{"path":"/api/te"#).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    stream.write_all(br#"st/5"}@@@"#).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    stream.write_all(b"@@@").await.unwrap();

    let mut received = Vec::new();
    let mut buf = [0u8; 1024];
    while !received.ends_with(b"@@@@@@") {
        let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert!(n > 0, "server closed the connection");
        received.extend_from_slice(&buf[..n]);
    }
    let payload = &received[..received.len() - 6];
    let reply: Value = serde_json::from_slice(payload).unwrap();
    assert_eq!(reply["data"]["id"], "5");

    server.stop().await;
}

#[tokio::test]
async fn test_malformed_frame_keeps_connection() {
    let server = common::spawn_socket(common::test_app(AppConfig::default())).await;

    let mut client = SocketClient::connect(server.addr).await.unwrap();
    client.write_raw(b"this is not a request").await.unwrap();
    let reply = client.send("get", "/api/test/1", json!({}), json!({})).await.unwrap();
    assert_eq!(reply["data"]["id"], "1");

    server.stop().await;
}

#[tokio::test]
async fn test_client_rejects_bad_arguments() {
    let server = common::spawn_socket(common::test_app(AppConfig::default())).await;
    let mut client = SocketClient::connect(server.addr).await.unwrap();

    let err = client.send("fetch", "/api/test/1", json!({}), json!({})).await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidMethod(_)));

    let err = client.send("get", "/api/test/1", json!([1]), json!({})).await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidPayload("query")));

    server.stop().await;
}

#[tokio::test]
async fn test_connections_are_registered_and_removed() {
    let app = common::test_app(AppConfig::default());
    let server = common::spawn_socket(app.clone()).await;

    let client = SocketClient::connect(server.addr).await.unwrap();
    assert!(common::eventually(|| app.connections().len() == 1).await);

    assert_eq!(app.broadcast(json!({ "n": 1 }), "notice", 7), 1);

    drop(client);
    assert!(common::eventually(|| app.connections().is_empty()).await);

    server.stop().await;
}

#[tokio::test]
async fn test_broadcast_reaches_client() {
    let app = common::test_app(AppConfig::default());
    let server = common::spawn_socket(app.clone()).await;

    let mut client = SocketClient::connect(server.addr).await.unwrap();
    assert!(common::eventually(|| app.connections().len() == 1).await);

    app.broadcast("hello", "notice", 3);
    let message = client.recv().await.unwrap();
    assert_eq!(message["message"], "notice");
    assert_eq!(message["code"], 3);
    assert_eq!(message["data"], "hello");

    server.stop().await;
}

#[tokio::test]
async fn test_oversized_frame_closes_connection() {
    let mut config = AppConfig::default();
    config.socket.max_frame_bytes = 64;
    let server = common::spawn_socket(common::test_app(config)).await;

    let mut client = SocketClient::connect(server.addr).await.unwrap();
    client.write_raw(&vec![b'x'; 256]).await.unwrap();
    let err = tokio::time::timeout(Duration::from_secs(5), client.recv())
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, ClientError::Closed | ClientError::Io(_)));

    server.stop().await;
}

#[tokio::test]
async fn test_half_closed_client_still_gets_reply() {
    let server = common::spawn_socket(common::test_app(AppConfig::default())).await;

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream
        .write_all(br#"{"path":"/api/slow","query":{"ms":"200"}}@@@@@@"#)
        .await
        .unwrap();
    stream.shutdown().await.unwrap();

    let mut received = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut received))
        .await
        .unwrap()
        .unwrap();
    assert!(received.ends_with(b"@@@@@@"), "no reply frame before close");
    let reply: Value = serde_json::from_slice(&received[..received.len() - 6]).unwrap();
    assert_eq!(reply["data"]["slept_ms"], 200);

    server.stop().await;
}

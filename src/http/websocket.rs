//! WebSocket transport.
//!
//! # Responsibilities
//! - Complete the upgrade handshake on any path
//! - Register each connection and run its writer task
//! - Dispatch every text or binary message as one request
//! - Broadcast the configured ping on an interval
//!
//! # Data Flow
//! ```text
//! Upgrade request (path, query) ─→ on_upgrade ─→ register
//!     message ─→ decode_message ─→ spawn(dispatch) ─→ Connection::send
//!     Connection::send ─→ writer task ─→ Message::Text
//! ```
//!
//! # Design Decisions
//! - A message carrying `path` is a full request; anything else is the
//!   body of a GET to the upgrade path
//! - Closing the connection unregisters it exactly once
//! - Messages that are not JSON are dropped

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{HeaderMap, Uri},
    response::Response,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::app::Application;
use crate::http::request::parse_query;
use crate::lifecycle::shutdown::signalled;
use crate::net::connection::{Connection, Outbound};
use crate::net::framing::SocketRequest;
use crate::net::Listener;
use crate::pipeline::{Inbound, TransportKind};

#[derive(Clone)]
struct WsState {
    app: Arc<Application>,
    closing: broadcast::Sender<()>,
}

/// Where a connection was opened; the default target for bare messages.
#[derive(Debug, Clone)]
struct Upgrade {
    pathinfo: String,
    query: Value,
    headers: HeaderMap,
}

/// WebSocket adapter for an application.
pub struct WebSocketServer {
    app: Arc<Application>,
}

impl WebSocketServer {
    pub fn new(app: Arc<Application>) -> Self {
        Self { app }
    }

    /// Serve until `shutdown` fires, then close every WebSocket.
    pub async fn run(self, listener: Listener, shutdown: broadcast::Receiver<()>) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "WebSocket server starting");

        let (closing, _) = broadcast::channel(1);
        let state = WsState {
            app: Arc::clone(&self.app),
            closing: closing.clone(),
        };
        let router = Router::new()
            .fallback(upgrade_handler)
            .with_state(state)
            .layer(TraceLayer::new_for_http());

        let ping = self.spawn_ping(closing.subscribe());

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                signalled(shutdown).await;
                let _ = closing.send(());
            })
            .await?;

        if let Some(ping) = ping {
            ping.abort();
        }
        tracing::info!("WebSocket server stopped");
        Ok(())
    }

    fn spawn_ping(&self, closing: broadcast::Receiver<()>) -> Option<tokio::task::JoinHandle<()>> {
        let ping = self.app.config().websocket.ping.clone();
        if !ping.enabled {
            return None;
        }
        let app = Arc::clone(&self.app);
        let data = Value::String(ping.data);
        let period = Duration::from_secs(ping.interval_secs);
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            let stopped = signalled(closing);
            tokio::pin!(stopped);
            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    _ = ticker.tick() => {
                        let delivered = app.broadcast(data.clone(), "ping", 0);
                        tracing::trace!(delivered, "Ping broadcast");
                    }
                }
            }
        }))
    }
}

async fn upgrade_handler(
    State(state): State<WsState>,
    uri: Uri,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let upgrade = Upgrade {
        pathinfo: uri.path().to_string(),
        query: parse_query(uri.query()),
        headers,
    };
    let max_bytes = state.app.config().limits.max_body_bytes;
    ws.max_message_size(max_bytes)
        .on_upgrade(move |socket| serve_socket(state, upgrade, socket))
}

async fn serve_socket(state: WsState, upgrade: Upgrade, socket: WebSocket) {
    let WsState { app, closing } = state;
    let mut closing = closing.subscribe();
    let (guard, mut outbound) = app.connections().register(TransportKind::WebSocket, None);
    let connection = guard.connection().clone();
    let connection_id = guard.id();
    tracing::debug!(connection_id = %connection_id, path = %upgrade.pathinfo, "WebSocket opened");

    let (mut sink, mut stream) = socket.split();
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let Outbound::Message(text) = message else {
                let _ = sink.send(Message::Close(None)).await;
                break;
            };
            if let Err(e) = sink.send(Message::Text(text.into())).await {
                tracing::debug!(connection_id = %connection_id, error = %e, "Write failed");
                break;
            }
        }
    });

    loop {
        let message = tokio::select! {
            _ = closing.recv() => break,
            message = stream.next() => match message {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    tracing::debug!(connection_id = %connection_id, error = %e, "Read failed");
                    break;
                }
                None => break,
            },
        };
        match message {
            Message::Text(text) => spawn_dispatch(&app, &connection, &upgrade, text.as_str().as_bytes()),
            Message::Binary(bytes) => spawn_dispatch(&app, &connection, &upgrade, &bytes),
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    connection.close();
    drop(guard);
    let _ = writer_task.await;
    tracing::debug!(connection_id = %connection_id, "WebSocket closed");
}

/// Decode one message against the upgrade request.
fn decode_message(upgrade: &Upgrade, payload: &[u8]) -> Result<Inbound, serde_json::Error> {
    let value: Value = serde_json::from_slice(payload)?;
    let has_path = value.get("path").is_some_and(Value::is_string);
    let inbound = if has_path {
        let request: SocketRequest = serde_json::from_value(value)?;
        Inbound::new(TransportKind::WebSocket, request.method, request.path)
            .query(request.query)
            .body(request.body)
    } else {
        Inbound::new(TransportKind::WebSocket, "GET", upgrade.pathinfo.clone())
            .query(upgrade.query.clone())
            .body(value)
    };
    Ok(inbound.headers(upgrade.headers.clone()))
}

fn spawn_dispatch(app: &Arc<Application>, connection: &Connection, upgrade: &Upgrade, payload: &[u8]) {
    let inbound = match decode_message(upgrade, payload) {
        Ok(inbound) => inbound.connection(connection.clone()),
        Err(e) => {
            tracing::warn!(connection_id = %connection.id(), error = %e, "Dropping malformed message");
            return;
        }
    };

    let app = Arc::clone(app);
    let connection = connection.clone();
    tokio::spawn(async move {
        let ctx = app.dispatch(inbound).await;
        if let Some(reply) = ctx.reply() {
            connection.send(reply.body);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn upgrade() -> Upgrade {
        Upgrade {
            pathinfo: "/live".into(),
            query: json!({ "room": "a" }),
            headers: HeaderMap::new(),
        }
    }

    #[test]
    fn envelope_message_names_its_route() {
        let inbound = decode_message(
            &upgrade(),
            br#"{"path":"/api/test/3","method":"post","body":{"x":1}}"#,
        )
        .unwrap();
        assert_eq!(inbound.pathinfo, "/api/test/3");
        assert_eq!(inbound.method, "POST");
        assert_eq!(inbound.query, json!({}));
        assert_eq!(inbound.body, json!({ "x": 1 }));
    }

    #[test]
    fn bare_message_targets_upgrade_path() {
        let inbound = decode_message(&upgrade(), br#"{"hello":"world"}"#).unwrap();
        assert_eq!(inbound.pathinfo, "/live");
        assert_eq!(inbound.method, "GET");
        assert_eq!(inbound.query, json!({ "room": "a" }));
        assert_eq!(inbound.body, json!({ "hello": "world" }));
        assert_eq!(inbound.transport, TransportKind::WebSocket);
    }

    #[test]
    fn non_json_is_rejected() {
        assert!(decode_message(&upgrade(), b"hello").is_err());
    }
}

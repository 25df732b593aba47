//! Raw TCP socket transport.
//!
//! # Responsibilities
//! - Accept connections through the bounded listener
//! - Register each connection and run its writer task
//! - Decode frames and dispatch each one as an independent request
//! - Write rendered replies back as frames
//!
//! # Data Flow
//! ```text
//! TcpStream ─ read ─→ FrameDecoder ─→ SocketRequest ─→ spawn(dispatch)
//!     ↑                                                     │
//!     └─ write ← writer task ← Connection::send ← reply ────┘
//! ```
//!
//! # Design Decisions
//! - Requests on one connection may complete out of order
//! - A request that settles nothing gets no reply frame
//! - Requests in flight when the peer stops writing still get their replies
//! - Protocol errors close the connection; malformed JSON only drops the frame

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::task::JoinSet;

use crate::app::Application;
use crate::net::connection::{Connection, Outbound};
use crate::net::framing::{encode_frame, FrameDecoder, SocketRequest};
use crate::net::listener::{ConnectionPermit, Listener, ListenerError};
use crate::pipeline::{Inbound, TransportKind};

const READ_BUFFER_BYTES: usize = 8 * 1024;

/// Socket server for an application.
pub struct SocketServer {
    app: Arc<Application>,
    max_frame_bytes: usize,
    shutdown_grace: Duration,
}

impl SocketServer {
    pub fn new(app: Arc<Application>) -> Self {
        let max_frame_bytes = app.config().socket.max_frame_bytes;
        let shutdown_grace = Duration::from_secs(app.config().timeouts.shutdown_secs);
        Self {
            app,
            max_frame_bytes,
            shutdown_grace,
        }
    }

    /// Serve until `shutdown` fires, then drain open connections.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        let addr = listener.local_addr().map_err(ListenerError::Accept)?;
        tracing::info!(address = %addr, "Socket server starting");

        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        connections.spawn(handle_connection(
                            Arc::clone(&self.app),
                            stream,
                            peer,
                            permit,
                            self.max_frame_bytes,
                            shutdown.resubscribe(),
                        ));
                    }
                    Err(ListenerError::Closed) => break,
                    Err(e) => tracing::warn!(error = %e, "Accept failed"),
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        tracing::info!(open = connections.len(), "Socket server draining");
        let drained = tokio::time::timeout(self.shutdown_grace, async {
            while connections.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            tracing::warn!(remaining = connections.len(), "Shutdown grace expired");
            connections.abort_all();
        }
        tracing::info!("Socket server stopped");
        Ok(())
    }
}

async fn handle_connection(
    app: Arc<Application>,
    stream: TcpStream,
    peer: SocketAddr,
    _permit: ConnectionPermit,
    max_frame_bytes: usize,
    mut shutdown: broadcast::Receiver<()>,
) {
    let (guard, mut outbound) = app.connections().register(TransportKind::Socket, Some(peer));
    let connection = guard.connection().clone();
    let connection_id = guard.id();
    let (mut reader, mut writer) = stream.into_split();

    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let Outbound::Message(text) = message else { break };
            if let Err(e) = writer.write_all(&encode_frame(text.as_bytes())).await {
                tracing::debug!(connection_id = %connection_id, error = %e, "Write failed");
                break;
            }
        }
        let _ = writer.shutdown().await;
    });

    let mut decoder = FrameDecoder::new(max_frame_bytes);
    let mut buf = vec![0u8; READ_BUFFER_BYTES];
    let mut in_flight = JoinSet::new();
    'read: loop {
        let n = tokio::select! {
            _ = shutdown.recv() => break,
            Some(_) = in_flight.join_next(), if !in_flight.is_empty() => continue,
            read = reader.read(&mut buf) => match read {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    tracing::debug!(connection_id = %connection_id, error = %e, "Read failed");
                    break;
                }
            },
        };
        decoder.extend(&buf[..n]);
        loop {
            match decoder.next_frame() {
                Ok(Some(frame)) => spawn_dispatch(&app, &connection, frame, &mut in_flight),
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(connection_id = %connection_id, error = %e, "Closing connection");
                    break 'read;
                }
            }
        }
    }

    // A half-closed peer still gets replies to requests it already sent.
    while in_flight.join_next().await.is_some() {}
    connection.close();
    drop(guard);
    let _ = writer_task.await;
}

fn spawn_dispatch(
    app: &Arc<Application>,
    connection: &Connection,
    frame: Bytes,
    in_flight: &mut JoinSet<()>,
) {
    let request = match SocketRequest::decode(&frame) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(connection_id = %connection.id(), error = %e, "Dropping malformed frame");
            return;
        }
    };

    let app = Arc::clone(app);
    let connection = connection.clone();
    in_flight.spawn(async move {
        let inbound = Inbound::new(TransportKind::Socket, request.method, request.path)
            .query(request.query)
            .body(request.body)
            .connection(connection.clone());
        let ctx = app.dispatch(inbound).await;
        if let Some(reply) = ctx.reply() {
            connection.send(reply.body);
        }
    });
}

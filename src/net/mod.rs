//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (registry, outbound channel)
//!     → socket.rs (framing via framing.rs, one dispatch per frame)
//!     → Hand off to the application pipeline
//!
//! Outbound:
//!     client.rs (request/response over the same framing)
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked for graceful shutdown and broadcast
//! - The pipeline never sees framing; it only gets decoded requests

pub mod client;
pub mod connection;
pub mod framing;
pub mod listener;
pub mod socket;

pub use client::{ClientError, SocketClient};
pub use connection::{Connection, ConnectionGuard, ConnectionId, ConnectionRegistry, Outbound};
pub use framing::{encode_frame, FrameDecoder, FrameError, SocketRequest};
pub use listener::{Listener, ListenerError};
pub use socket::SocketServer;

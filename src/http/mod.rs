//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (bounded listener)
//!     → server.rs (axum setup, request id, timeout, body limit)
//!     → request.rs (query and body decoding into an Inbound)
//!     → Application::dispatch (route tree + pipeline)
//!     → response.rs (rendered reply into an HTTP response)
//!     → Send to client
//!
//! Upgrade requests on the WebSocket listener:
//!     → websocket.rs (one pipeline request per message)
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use request::{RequestError, X_REQUEST_ID};
pub use server::HttpServer;
pub use websocket::WebSocketServer;

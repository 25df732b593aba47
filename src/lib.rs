//! Request routing and pipeline dispatch for HTTP, raw socket and
//! WebSocket transports.

pub mod app;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod pipeline;
pub mod routing;
pub mod validation;

pub use app::{Application, ApplicationBuilder};
pub use config::AppConfig;
pub use http::{HttpServer, WebSocketServer};
pub use lifecycle::Shutdown;
pub use net::{SocketClient, SocketServer};
pub use pipeline::{Context, Event, HttpError, RouteOutcome};
pub use routing::{RouteOptions, Router};
pub use validation::{ValidatorConfig, Validators};

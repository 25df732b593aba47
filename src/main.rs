//! koapp demo server
//!
//! Serves a small route set over one transport.
//!
//! # Architecture Overview
//!
//! ```text
//!     HTTP request ──┐
//!   socket frame ────┼─▶ Application::dispatch ─▶ RouteTree::match_route
//! WebSocket message ─┘            │
//!                                 ▼
//!          receive → validate → middleware → handle → response → after
//!                                 │
//!     reply (HTTP body, framed text, WebSocket text) ◀┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use serde_json::json;

use koapp::config::{load_config, AppConfig};
use koapp::lifecycle::signals::spawn_signal_handler;
use koapp::net::Listener;
use koapp::observability::{init_logging, init_metrics};
use koapp::pipeline::success;
use koapp::{Application, HttpServer, Router, Shutdown, SocketServer, WebSocketServer};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Transport {
    Http,
    Socket,
    Websocket,
}

#[derive(Debug, Parser)]
#[command(name = "koapp", version, about = "Route-tree application server")]
struct Cli {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Transport to serve.
    #[arg(short, long, value_enum, default_value = "http")]
    transport: Transport,
}

fn demo_routes() -> Router {
    Router::new("/api")
        .get("/test/{:id}", |ctx| {
            Box::pin(async move {
                Ok(success(json!({
                    "id": ctx.params.get("id"),
                    "query": ctx.query,
                })))
            })
        })
        .add(Router::new("/***").method("ANY").handler(|ctx| {
            Box::pin(async move {
                Ok(success(json!({
                    "method": ctx.method,
                    "pathinfo": ctx.pathinfo,
                    "body": ctx.body,
                })))
            })
        }))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };

    init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "koapp starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let app: Arc<Application> = Application::builder()
        .config(config.clone())
        .router(demo_routes())
        .build()?;

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    match cli.transport {
        Transport::Http => {
            let listener = Listener::bind(&config.listener).await?;
            HttpServer::new(app).run(listener, shutdown.subscribe()).await?;
        }
        Transport::Socket => {
            let listener = Listener::bind(&config.socket.listener()).await?;
            SocketServer::new(app).run(listener, shutdown.subscribe()).await?;
        }
        Transport::Websocket => {
            let listener = Listener::bind(&config.websocket.listener()).await?;
            WebSocketServer::new(app).run(listener, shutdown.subscribe()).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::net::TcpListener;

use koapp::net::Listener;
use koapp::pipeline::{error, redirect, success, HttpError, RouteOutcome};
use koapp::validation::{ValidatorConfig, Validators};
use koapp::{AppConfig, Application, HttpServer, Router, Shutdown, SocketServer, WebSocketServer};

/// The route set every transport test runs against.
pub fn test_routes() -> Router {
    Router::new("/api")
        .get("/test/{:id}", |ctx| {
            Box::pin(async move {
                Ok(success(json!({
                    "id": ctx.params.get("id"),
                    "transport": ctx.transport.as_str(),
                })))
            })
        })
        .add(
            Router::new("/items")
                .method("POST")
                .validators(Validators::new().body(ValidatorConfig::new().rule("name", "required|min:3")))
                .handler(|ctx| Box::pin(async move { Ok(success(ctx.body.clone())) })),
        )
        .get("/forbidden", |_ctx| {
            Box::pin(async { Err(HttpError::new(403, "Forbidden").into()) })
        })
        .get("/boom", |_ctx| Box::pin(async { Err("kaboom".into()) }))
        .get("/empty", |_ctx| Box::pin(async { Ok(RouteOutcome::Pending) }))
        .get("/old", |_ctx| Box::pin(async { Ok(redirect("/new")) }))
        .get("/slow", |ctx| {
            Box::pin(async move {
                let ms = ctx.query.get("ms").and_then(|v| v.as_str()?.parse().ok()).unwrap_or(3000);
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(success(json!({ "slept_ms": ms })))
            })
        })
        .add(
            Router::new("/guarded")
                .middleware(|ctx| {
                    Box::pin(async move {
                        if ctx.query.get("token").is_some() {
                            Ok(RouteOutcome::Pending)
                        } else {
                            Ok(error(401, "Unauthorized"))
                        }
                    })
                })
                .get("/data", |_ctx| Box::pin(async { Ok(success("secret")) })),
        )
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

pub fn test_app(config: AppConfig) -> Arc<Application> {
    Application::builder()
        .config(config)
        .router(test_routes())
        .build()
        .unwrap()
}

async fn local_listener() -> (Listener, SocketAddr) {
    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = tcp.local_addr().unwrap();
    (Listener::from_tcp(tcp, 64), addr)
}

/// A running server; dropping it does not stop the server, call `stop`.
pub struct Running {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: tokio::task::JoinHandle<()>,
}

impl Running {
    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = tokio::time::timeout(Duration::from_secs(5), self.handle).await;
    }
}

pub async fn spawn_http(app: Arc<Application>) -> Running {
    let (listener, addr) = local_listener().await;
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let handle = tokio::spawn(async move {
        let _ = HttpServer::new(app).run(listener, rx).await;
    });
    Running { addr, shutdown, handle }
}

pub async fn spawn_socket(app: Arc<Application>) -> Running {
    let (listener, addr) = local_listener().await;
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let handle = tokio::spawn(async move {
        let _ = SocketServer::new(app).run(listener, rx).await;
    });
    Running { addr, shutdown, handle }
}

pub async fn spawn_websocket(app: Arc<Application>) -> Running {
    let (listener, addr) = local_listener().await;
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let handle = tokio::spawn(async move {
        let _ = WebSocketServer::new(app).run(listener, rx).await;
    });
    Running { addr, shutdown, handle }
}

/// Poll `f` until it holds or the deadline passes.
pub async fn eventually(mut f: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if f() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

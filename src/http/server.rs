//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the axum Router with a single dispatching fallback
//! - Wire up middleware (tracing, timeout, body limit, request ID)
//! - Serve on the bounded listener until shutdown
//!
//! # Design Decisions
//! - Routing happens in the application's route tree, never in axum
//! - Request ids come from the application namespace unless the client sent one
//! - Decode failures are answered before the pipeline runs

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::app::Application;
use crate::http::{request, response};
use crate::lifecycle::shutdown::signalled;
use crate::net::Listener;

/// HTTP adapter for an application.
pub struct HttpServer {
    app: Arc<Application>,
    router: Router,
}

impl HttpServer {
    pub fn new(app: Arc<Application>) -> Self {
        let router = Self::build_router(&app);
        Self { app, router }
    }

    /// Build the axum router with all middleware layers.
    fn build_router(app: &Arc<Application>) -> Router {
        let config = app.config();
        Router::new()
            .fallback(dispatch_handler)
            .with_state(Arc::clone(app))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(AppRequestId(Arc::clone(app))))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(RequestBodyLimitLayer::new(config.limits.max_body_bytes))
                    .layer(TimeoutLayer::with_status_code(
                        StatusCode::REQUEST_TIMEOUT,
                        Duration::from_secs(config.timeouts.request_secs),
                    )),
            )
    }

    /// The configured router, for embedding or in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` fires, then let in-flight requests finish.
    pub async fn run(self, listener: Listener, shutdown: broadcast::Receiver<()>) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            app_id = %self.app.app_id(),
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(signalled(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Request ids minted under the application's namespace.
#[derive(Clone)]
struct AppRequestId(Arc<Application>);

impl MakeRequestId for AppRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&self.0.new_request_id())
            .ok()
            .map(RequestId::new)
    }
}

async fn dispatch_handler(State(app): State<Arc<Application>>, req: Request<Body>) -> Response {
    let max_body_bytes = app.config().limits.max_body_bytes;
    let inbound = match request::into_inbound(req, max_body_bytes).await {
        Ok(inbound) => inbound,
        Err(e) => {
            tracing::debug!(error = %e, "Rejecting undecodable request");
            return (e.status(), e.to_string()).into_response();
        }
    };

    let ctx = app.dispatch(inbound).await;
    response::into_response(ctx.reply())
}

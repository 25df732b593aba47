//! Application subsystem.
//!
//! # Data Flow
//! ```text
//! ApplicationBuilder (config, routers, hooks)
//!     → RouteTree::compile (fatal on bad declarations)
//!     → Arc<Application> (immutable while serving)
//!
//! Per request:
//!     Inbound → dispatch() → Context → Workflow::start → Context
//! ```
//!
//! # Design Decisions
//! - Everything the pipeline reads is frozen before the first request
//! - The connection registry belongs to the application instance
//! - Request ids are UUID v5 names under the application namespace

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::net::connection::{ConnectionId, ConnectionRegistry};
use crate::observability::metrics;
use crate::pipeline::handler::BoxError;
use crate::pipeline::hooks::{Event, LifecycleHooks};
use crate::pipeline::{Context, Inbound, Workflow};
use crate::routing::{RouteError, RouteTree, Router};

/// A routed application shared by every transport.
#[derive(Debug)]
pub struct Application {
    config: AppConfig,
    app_id: String,
    namespace: Uuid,
    routes: RouteTree,
    hooks: LifecycleHooks,
    workflow: Workflow,
    connections: ConnectionRegistry,
}

impl Application {
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::default()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn routes(&self) -> &RouteTree {
        &self.routes
    }

    pub fn hooks(&self) -> &LifecycleHooks {
        &self.hooks
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    /// A fresh request id under this application's namespace.
    pub fn new_request_id(&self) -> String {
        Uuid::new_v5(&self.namespace, Uuid::new_v4().as_bytes()).to_string()
    }

    /// Run one request through the pipeline.
    pub async fn dispatch(self: &Arc<Self>, inbound: Inbound) -> Context {
        let request_id = inbound
            .request_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| self.new_request_id());
        let mut ctx = Context::new(Arc::clone(self), request_id, inbound);

        self.workflow.start(&mut ctx).await;

        let status = ctx.reply().map_or(204, |r| r.status);
        metrics::record_request(ctx.transport, &ctx.method, status, ctx.elapsed());
        tracing::info!(
            request_id = %ctx.request_id,
            transport = %ctx.transport,
            method = %ctx.method,
            pathinfo = %ctx.pathinfo,
            status,
            elapsed_ms = ctx.elapsed().as_millis() as u64,
            "Request completed"
        );
        ctx
    }

    /// Send an envelope to every registered connection.
    pub fn broadcast(&self, data: impl Into<Value>, message: &str, code: i64) -> usize {
        if self.connections.is_empty() {
            return 0;
        }
        let envelope = self.envelope(data.into(), message, code);
        let delivered = self.connections.broadcast(&envelope);
        tracing::debug!(delivered, kind = %message, "Broadcast sent");
        delivered
    }

    /// Send an envelope to the listed connections only.
    pub fn broadcast_to(
        &self,
        ids: &[ConnectionId],
        data: impl Into<Value>,
        message: &str,
        code: i64,
    ) -> usize {
        if ids.is_empty() {
            return 0;
        }
        let envelope = self.envelope(data.into(), message, code);
        let delivered = self.connections.send_to(ids, &envelope);
        tracing::debug!(delivered, targets = ids.len(), kind = %message, "Targeted broadcast sent");
        delivered
    }

    fn envelope(&self, data: Value, message: &str, code: i64) -> String {
        json!({
            "request_id": self.new_request_id(),
            "timestamp": SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or_default(),
            "code": code,
            "message": message,
            "data": data,
        })
        .to_string()
    }
}

/// Builder for [`Application`].
#[derive(Default)]
pub struct ApplicationBuilder {
    config: AppConfig,
    routers: Vec<Router>,
    hooks: LifecycleHooks,
}

impl ApplicationBuilder {
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    pub fn router(mut self, router: Router) -> Self {
        self.routers.push(router);
        self
    }

    pub fn routers(mut self, routers: impl IntoIterator<Item = Router>) -> Self {
        self.routers.extend(routers);
        self
    }

    pub fn on<F>(mut self, event: Event, f: F) -> Self
    where
        F: Fn(&Context) + Send + Sync + 'static,
    {
        self.hooks.on(event, f);
        self
    }

    pub fn on_after_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context, &BoxError) + Send + Sync + 'static,
    {
        self.hooks.on_after_error(f);
        self
    }

    /// Compile the routes and freeze the application.
    pub fn build(self) -> Result<Arc<Application>, RouteError> {
        let routes = RouteTree::compile(&self.routers)?;
        let app_id = if self.config.app_id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            self.config.app_id.clone()
        };
        let namespace = Uuid::parse_str(&app_id)
            .unwrap_or_else(|_| Uuid::new_v5(&Uuid::NAMESPACE_OID, app_id.as_bytes()));

        for (path, methods) in routes.routes() {
            tracing::debug!(path = %path, methods = %methods, "Route registered");
        }
        tracing::info!(app_id = %app_id, routes = routes.len(), "Application built");

        Ok(Arc::new(Application {
            config: self.config,
            app_id,
            namespace,
            routes,
            hooks: self.hooks,
            workflow: Workflow::new(),
            connections: ConnectionRegistry::new(),
        }))
    }
}

//! Per-request context.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use axum::http::{Extensions, HeaderMap};
use serde_json::{Map, Value};

use crate::app::Application;
use crate::net::connection::Connection;
use crate::pipeline::outcome::{HttpResponse, Rendered, Settled};
use crate::pipeline::workflow::Stage;
use crate::routing::RouteInfo;

/// Transport a request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransportKind {
    #[default]
    Http,
    Socket,
    WebSocket,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Http => "http",
            TransportKind::Socket => "socket",
            TransportKind::WebSocket => "websocket",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request as decoded by a transport adapter.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub transport: TransportKind,
    pub method: String,
    pub url: String,
    pub pathinfo: String,
    pub query: Value,
    pub body: Value,
    pub headers: HeaderMap,
    /// Request id supplied by the transport, if any.
    pub request_id: Option<String>,
    pub connection: Option<Connection>,
}

impl Inbound {
    pub fn new(transport: TransportKind, method: impl Into<String>, pathinfo: impl Into<String>) -> Self {
        let pathinfo = pathinfo.into();
        Self {
            transport,
            method: method.into().to_uppercase(),
            url: pathinfo.clone(),
            pathinfo,
            query: Value::Object(Map::new()),
            body: Value::Null,
            headers: HeaderMap::new(),
            request_id: None,
            connection: None,
        }
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn query(mut self, query: Value) -> Self {
        self.query = query;
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn connection(mut self, connection: Connection) -> Self {
        self.connection = Some(connection);
        self
    }
}

/// In-flight stage state.
#[derive(Debug, Default)]
pub struct Scratch {
    pub stage: Option<Stage>,
    /// Display form of the first error raised by user code.
    pub error: Option<String>,
}

/// The mutable record threaded through every stage of one request.
pub struct Context {
    pub app: Arc<Application>,
    pub app_id: String,
    pub request_id: String,
    pub transport: TransportKind,
    pub method: String,
    pub url: String,
    pub pathinfo: String,
    pub params: HashMap<String, String>,
    pub query: Value,
    pub body: Value,
    pub headers: HeaderMap,
    /// The matched route, set by the receive stage.
    pub router: Option<RouteInfo>,
    pub response: Option<Settled>,
    pub curr: Scratch,
    /// The persistent connection for socket transports.
    pub connection: Option<Connection>,
    /// Typed storage for middleware.
    pub extensions: Extensions,
    /// The reply frozen by the response stage.
    rendered: Option<Rendered>,
    pub(crate) started: Instant,
}

impl Context {
    pub fn new(app: Arc<Application>, request_id: String, inbound: Inbound) -> Self {
        Self {
            app_id: app.app_id().to_string(),
            app,
            request_id,
            transport: inbound.transport,
            method: inbound.method,
            url: inbound.url,
            pathinfo: inbound.pathinfo,
            params: HashMap::new(),
            query: inbound.query,
            body: inbound.body,
            headers: inbound.headers,
            router: None,
            response: None,
            curr: Scratch::default(),
            connection: inbound.connection,
            extensions: Extensions::new(),
            rendered: None,
            started: Instant::now(),
        }
    }

    /// Whether the application runs in debug mode.
    pub fn debug(&self) -> bool {
        self.app.config().debug
    }

    /// Captured route parameters as a JSON object.
    pub fn params_value(&self) -> Value {
        Value::Object(
            self.params
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        )
    }

    /// Settle the context with `settled`, replacing any earlier value.
    pub fn settle(&mut self, settled: Settled) {
        self.response = Some(settled);
    }

    /// The normalized response, if anything settled.
    pub fn final_response(&self) -> Option<HttpResponse> {
        self.response.as_ref().map(|s| s.to_response(self.debug()))
    }

    /// Render the settled response once; later changes to `response` are ignored.
    pub(crate) fn finalize(&mut self) {
        self.rendered = self.final_response().map(|r| r.render(&self.request_id));
    }

    /// The reply frozen by the response stage, or `None` for the
    /// legitimate empty response.
    pub fn reply(&self) -> Option<Rendered> {
        self.rendered.clone()
    }

    /// Time since the context was created.
    pub fn elapsed(&self) -> std::time::Duration {
        self.started.elapsed()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("request_id", &self.request_id)
            .field("transport", &self.transport)
            .field("method", &self.method)
            .field("pathinfo", &self.pathinfo)
            .field("params", &self.params)
            .field("router", &self.router.as_ref().map(|r| r.path()))
            .field("response", &self.response)
            .field("curr", &self.curr)
            .finish()
    }
}

//! Handler outcomes and the canonical response shape.
//!
//! # Responsibilities
//! - Model what a handler produced (`RouteOutcome`)
//! - Model what the pipeline settled on (`Settled`)
//! - Normalize a settled value into one `HttpResponse`
//! - Render the wire body shared by every transport
//!
//! # Design Decisions
//! - Handlers return outcomes instead of unwinding; one call still finishes
//!   the handler (`return Ok(success(data))`)
//! - `code` strings use the `"code;message"` form, e.g. `"400;Bad Request Data"`
//! - JSON responses are wrapped in the envelope exactly once, at render time

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::{json, Value};

use crate::pipeline::handler::BoxError;

/// Body format of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Json,
    Text,
}

/// A resolved response, before rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub format: Format,
    pub headers: BTreeMap<String, String>,
    /// Envelope code. Rendered as the status when absent.
    pub code: Option<String>,
    pub message: String,
    pub data: Value,
}

impl HttpResponse {
    /// A JSON response. `code` is `"code;message"` or a bare code.
    pub fn json(status: u16, code: &str, data: impl Into<Value>) -> Self {
        let (code, message) = split_code(code);
        Self {
            status,
            format: Format::Json,
            headers: BTreeMap::new(),
            code,
            message,
            data: data.into(),
        }
    }

    /// A raw text response; `data` is written as-is.
    pub fn text(status: u16, data: impl Into<Value>) -> Self {
        Self {
            status,
            format: Format::Text,
            headers: BTreeMap::new(),
            code: None,
            message: String::new(),
            data: data.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Produce the wire form for `request_id`.
    pub fn render(&self, request_id: &str) -> Rendered {
        let (content_type, body) = match self.format {
            Format::Json => {
                let envelope = json!({
                    "request_id": request_id,
                    "timestamp": timestamp_millis(),
                    "code": self.code.clone().unwrap_or_else(|| self.status.to_string()),
                    "message": self.message,
                    "data": self.data,
                });
                ("application/json", envelope.to_string())
            }
            Format::Text => {
                let body = match &self.data {
                    Value::Null => String::new(),
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                ("text/plain; charset=utf-8", body)
            }
        };
        Rendered {
            status: self.status,
            content_type,
            headers: self.headers.clone(),
            body,
        }
    }
}

/// A response ready for a transport to write.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub status: u16,
    pub content_type: &'static str,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

/// A typed HTTP error.
///
/// Returned as `Err(HttpError::new(..).into())` from a handler it is
/// recognised by the response stage and rendered with its own status.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{status} {message}")]
pub struct HttpError {
    pub status: u16,
    pub message: String,
    pub headers: BTreeMap<String, String>,
}

impl HttpError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    fn to_response(&self) -> HttpResponse {
        HttpResponse {
            status: self.status,
            format: Format::Json,
            headers: self.headers.clone(),
            code: Some(self.status.to_string()),
            message: self.message.clone(),
            data: json!({}),
        }
    }
}

/// What a handler, middleware, or after-hook produced.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    /// Nothing settled; the pipeline continues.
    Pending,
    Success(HttpResponse),
    Failure(HttpResponse),
    Error(HttpError),
    Redirect { location: String, status: u16 },
}

impl RouteOutcome {
    /// Add a response header. Ignored for `Pending`.
    pub fn with_header(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        match self {
            RouteOutcome::Success(r) => RouteOutcome::Success(r.with_header(name, value)),
            RouteOutcome::Failure(r) => RouteOutcome::Failure(r.with_header(name, value)),
            RouteOutcome::Error(e) => RouteOutcome::Error(e.with_header(name, value)),
            other => other,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, RouteOutcome::Pending)
    }

    /// The settled value, or `None` for `Pending`.
    pub fn into_settled(self) -> Option<Settled> {
        match self {
            RouteOutcome::Pending => None,
            RouteOutcome::Success(r) | RouteOutcome::Failure(r) => Some(Settled::Response(r)),
            RouteOutcome::Error(e) => Some(Settled::Error(e)),
            RouteOutcome::Redirect { location, status } => Some(Settled::Response(
                HttpResponse::text(status, Value::Null).with_header("location", location),
            )),
        }
    }
}

impl From<HttpError> for RouteOutcome {
    fn from(e: HttpError) -> Self {
        RouteOutcome::Error(e)
    }
}

/// The terminal value held by a context.
#[derive(Debug)]
pub enum Settled {
    Response(HttpResponse),
    Error(HttpError),
    /// Any other error from user code.
    Thrown(BoxError),
}

impl Settled {
    /// Classify an error returned by user code.
    pub fn from_error(err: BoxError) -> Self {
        match err.downcast::<HttpError>() {
            Ok(http) => Settled::Error(*http),
            Err(other) => Settled::Thrown(other),
        }
    }

    /// Normalize into one response. Thrown errors only carry diagnostics
    /// when `debug` is set.
    pub fn to_response(&self, debug: bool) -> HttpResponse {
        match self {
            Settled::Response(r) => r.clone(),
            Settled::Error(e) => e.to_response(),
            Settled::Thrown(err) if debug => {
                let mut causes = Vec::new();
                let mut source = err.source();
                while let Some(cause) = source {
                    causes.push(cause.to_string());
                    source = cause.source();
                }
                HttpResponse::json(
                    500,
                    "500;Internal Server Error",
                    json!({ "msg": err.to_string(), "causes": causes }),
                )
            }
            Settled::Thrown(_) => HttpResponse::text(500, "Internal Server Error"),
        }
    }
}

/// `"200;Success"` with status 200.
pub fn success(data: impl Into<Value>) -> RouteOutcome {
    RouteOutcome::Success(HttpResponse::json(200, "200;Success", data))
}

/// A failure envelope, e.g. `failed(data, "400;Bad Request Data", 400)`.
pub fn failed(data: impl Into<Value>, code: &str, status: u16) -> RouteOutcome {
    RouteOutcome::Failure(HttpResponse::json(status, code, data))
}

/// A raw, non-enveloped body.
pub fn result(data: impl Into<Value>, status: u16) -> RouteOutcome {
    RouteOutcome::Success(HttpResponse::text(status, data))
}

/// An error envelope with an empty data object.
pub fn error(status: u16, message: impl Into<String>) -> RouteOutcome {
    RouteOutcome::Error(HttpError::new(status, message))
}

/// A JSON envelope with an explicit code and status.
pub fn response(data: impl Into<Value>, code: &str, status: u16) -> RouteOutcome {
    RouteOutcome::Success(HttpResponse::json(status, code, data))
}

/// A `302 Found` redirect.
pub fn redirect(location: impl Into<String>) -> RouteOutcome {
    RouteOutcome::Redirect {
        location: location.into(),
        status: 302,
    }
}

fn split_code(code: &str) -> (Option<String>, String) {
    match code.split_once(';') {
        Some((c, m)) => (Some(c.to_string()), m.to_string()),
        None if code.is_empty() => (None, String::new()),
        None => (Some(code.to_string()), String::new()),
    }
}

fn timestamp_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

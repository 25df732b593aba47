//! Request decoding.
//!
//! # Responsibilities
//! - Turn an axum request into a pipeline [`Inbound`]
//! - Parse the query string and the body by content type
//! - Carry the request id assigned by the request-id layer
//!
//! # Design Decisions
//! - Body size is enforced while buffering, never after
//! - Unknown content types are kept as text when they are valid UTF-8
//! - Repeated query keys collect into an array

use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, Request, StatusCode};
use serde_json::{Map, Value};

use crate::pipeline::{Inbound, TransportKind};

pub const X_REQUEST_ID: &str = "x-request-id";

/// Why a request could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl RequestError {
    pub fn status(&self) -> StatusCode {
        match self {
            RequestError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            RequestError::InvalidJson(_) => StatusCode::BAD_REQUEST,
        }
    }
}

/// Buffer and decode `request`.
pub async fn into_inbound(request: Request<Body>, max_body_bytes: usize) -> Result<Inbound, RequestError> {
    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, max_body_bytes)
        .await
        .map_err(|_| RequestError::BodyTooLarge { limit: max_body_bytes })?;

    let body = parse_body(&parts.headers, &bytes)?;
    let url = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());

    let mut inbound = Inbound::new(TransportKind::Http, parts.method.as_str(), parts.uri.path())
        .url(url)
        .query(parse_query(parts.uri.query()))
        .body(body);
    if let Some(id) = request_id(&parts.headers) {
        inbound = inbound.request_id(id);
    }
    Ok(inbound.headers(parts.headers))
}

/// The request id header, when present and printable.
pub fn request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Parse a query string into a JSON object.
pub fn parse_query(query: Option<&str>) -> Value {
    match query {
        Some(q) => form_object(q.as_bytes()),
        None => Value::Object(Map::new()),
    }
}

fn form_object(input: &[u8]) -> Value {
    let mut object = Map::new();
    for (key, value) in url::form_urlencoded::parse(input) {
        let value = Value::String(value.into_owned());
        match object.get_mut(key.as_ref()) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                object.insert(key.into_owned(), value);
            }
        }
    }
    Value::Object(object)
}

/// Decode a buffered body according to its content type.
pub fn parse_body(headers: &HeaderMap, bytes: &[u8]) -> Result<Value, RequestError> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.contains("json") {
        return Ok(serde_json::from_slice(bytes)?);
    }
    if content_type.starts_with("application/x-www-form-urlencoded") {
        return Ok(form_object(bytes));
    }
    Ok(match std::str::from_utf8(bytes) {
        Ok(text) => Value::String(text.to_string()),
        Err(_) => Value::Null,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    fn headers(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        headers
    }

    #[test]
    fn query_collects_repeated_keys() {
        let query = parse_query(Some("a=1&b=two%20words&a=3"));
        assert_eq!(query, json!({ "a": ["1", "3"], "b": "two words" }));
        assert_eq!(parse_query(None), json!({}));
    }

    #[test]
    fn body_by_content_type() {
        let json_body = parse_body(&headers("application/json; charset=utf-8"), br#"{"x":1}"#).unwrap();
        assert_eq!(json_body, json!({ "x": 1 }));

        let form = parse_body(&headers("application/x-www-form-urlencoded"), b"name=koa&n=1").unwrap();
        assert_eq!(form, json!({ "name": "koa", "n": "1" }));

        let text = parse_body(&headers("text/plain"), b"hello").unwrap();
        assert_eq!(text, json!("hello"));

        assert_eq!(parse_body(&HeaderMap::new(), b"").unwrap(), Value::Null);
    }

    #[test]
    fn bad_json_is_a_client_error() {
        let err = parse_body(&headers("application/json"), b"{nope").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn converts_request() {
        let request = Request::builder()
            .method("post")
            .uri("/api/test/7?verbose=1")
            .header(X_REQUEST_ID, "req-1")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"name":"x"}"#))
            .unwrap();
        let inbound = into_inbound(request, 1024).await.unwrap();
        assert_eq!(inbound.method, "POST");
        assert_eq!(inbound.pathinfo, "/api/test/7");
        assert_eq!(inbound.url, "/api/test/7?verbose=1");
        assert_eq!(inbound.query, json!({ "verbose": "1" }));
        assert_eq!(inbound.body, json!({ "name": "x" }));
        assert_eq!(inbound.request_id.as_deref(), Some("req-1"));
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let request = Request::builder()
            .uri("/upload")
            .body(Body::from(vec![b'a'; 64]))
            .unwrap();
        let err = into_inbound(request, 16).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}

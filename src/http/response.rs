//! Response encoding.
//!
//! # Responsibilities
//! - Turn a rendered pipeline reply into an axum response
//! - Map "nothing settled" to 204 No Content
//!
//! # Design Decisions
//! - Header names or values that are not valid HTTP are skipped, not fatal
//! - The request id header is added by the propagate layer, not here

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::pipeline::Rendered;

/// Encode a reply; `None` is the empty response.
pub fn into_response(reply: Option<Rendered>) -> Response {
    let Some(reply) = reply else {
        return StatusCode::NO_CONTENT.into_response();
    };

    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = Response::new(Body::from(reply.body));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(reply.content_type));
    for (name, value) in &reply.headers {
        match (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str())) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Skipping invalid response header"),
        }
    }
    response
}

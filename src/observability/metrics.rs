//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define request and connection metrics
//! - Expose a Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `koapp_requests_total` (counter): requests by transport, method, status
//! - `koapp_request_duration_seconds` (histogram): pipeline latency
//! - `koapp_active_connections` (gauge): open persistent connections
//!
//! # Design Decisions
//! - Recording without an installed exporter is a no-op
//! - Labels are low-cardinality: no paths, no request ids

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::pipeline::TransportKind;

pub const REQUESTS_TOTAL: &str = "koapp_requests_total";
pub const REQUEST_DURATION: &str = "koapp_request_duration_seconds";
pub const ACTIVE_CONNECTIONS: &str = "koapp_active_connections";

/// Install the Prometheus exporter, serving scrapes on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    describe();
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

fn describe() {
    describe_counter!(REQUESTS_TOTAL, "Requests dispatched, by transport, method and status");
    describe_histogram!(REQUEST_DURATION, "Time spent in the request pipeline");
    describe_gauge!(ACTIVE_CONNECTIONS, "Open socket and WebSocket connections");
}

pub fn record_request(transport: TransportKind, method: &str, status: u16, elapsed: Duration) {
    counter!(
        REQUESTS_TOTAL,
        "transport" => transport.as_str(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(REQUEST_DURATION, "transport" => transport.as_str()).record(elapsed.as_secs_f64());
}

pub fn connection_opened(transport: TransportKind) {
    gauge!(ACTIVE_CONNECTIONS, "transport" => transport.as_str()).increment(1.0);
}

pub fn connection_closed(transport: TransportKind) {
    gauge!(ACTIVE_CONNECTIONS, "transport" => transport.as_str()).decrement(1.0);
}

//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for an
//! application. All types derive Serde traits for deserialization from
//! config files.

use serde::{Deserialize, Serialize};

/// Root configuration for an application.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Application id. A random UUID is used when empty.
    pub app_id: String,

    /// Debug mode: route logging and error diagnostics in responses.
    pub debug: bool,

    /// HTTP listener.
    pub listener: ListenerConfig,

    /// Raw socket transport.
    pub socket: SocketConfig,

    /// WebSocket transport.
    pub websocket: WebSocketConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Raw socket transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SocketConfig {
    pub bind_address: String,
    pub max_connections: usize,
    /// Largest accepted frame payload; larger frames close the connection.
    pub max_frame_bytes: usize,
}

impl SocketConfig {
    pub fn listener(&self) -> ListenerConfig {
        ListenerConfig {
            bind_address: self.bind_address.clone(),
            max_connections: self.max_connections,
        }
    }
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8081".to_string(),
            max_connections: 1024,
            max_frame_bytes: 1024 * 1024,
        }
    }
}

/// WebSocket transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebSocketConfig {
    pub bind_address: String,
    pub max_connections: usize,
    pub ping: PingConfig,
}

impl WebSocketConfig {
    pub fn listener(&self) -> ListenerConfig {
        ListenerConfig {
            bind_address: self.bind_address.clone(),
            max_connections: self.max_connections,
        }
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8082".to_string(),
            max_connections: 1024,
            ping: PingConfig::default(),
        }
    }
}

/// Periodic ping broadcast to every WebSocket connection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PingConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    /// Payload carried in the envelope's `data` field.
    pub data: String,
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 300,
            data: "this is a ping message".to_string(),
        }
    }
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum HTTP body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Grace period for in-flight work on shutdown, in seconds.
    pub shutdown_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            shutdown_secs: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format: "pretty" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config: AppConfig = toml::from_str("debug = true").unwrap();
        assert!(config.debug);
        assert_eq!(config.listener.bind_address, "127.0.0.1:8080");
        assert!(!config.websocket.ping.enabled);
        assert_eq!(config.timeouts.request_secs, 30);
    }

    #[test]
    fn nested_sections_parse() {
        let config: AppConfig = toml::from_str(
            r#"
            app_id = "demo"

            [socket]
            bind_address = "0.0.0.0:9000"

            [websocket.ping]
            enabled = true
            interval_secs = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.app_id, "demo");
        assert_eq!(config.socket.listener().bind_address, "0.0.0.0:9000");
        assert_eq!(config.socket.max_frame_bytes, 1024 * 1024);
        assert!(config.websocket.ping.enabled);
        assert_eq!(config.websocket.ping.interval_secs, 5);
    }
}

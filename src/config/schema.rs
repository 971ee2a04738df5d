//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files, and
//! every section falls back to its default so an empty file is a valid config.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Client-facing listener (bind address, connection limit).
    pub listener: ListenerConfig,

    /// The single upstream every request is forwarded to.
    pub backend: BackendConfig,

    /// Idle backend connection pool.
    pub pool: PoolConfig,

    /// Per-path byte accounting.
    pub stats: StatsConfig,

    /// Stats query endpoint.
    pub rpc: RpcConfig,

    /// Built-in informational origin served on the backend port.
    pub origin: OriginConfig,

    /// HTTP/1.x codec limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent client connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Backend server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Backend address as `host:port` (e.g., "127.0.0.1:8081").
    pub address: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Backend connection pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of idle connections retained.
    pub capacity: usize,

    /// How long `acquire` waits for an idle connection before dialing.
    pub acquire_timeout_ms: u64,
}

impl PoolConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            acquire_timeout_ms: 100,
        }
    }
}

/// Stats accounting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Response header carrying the cumulative byte count for the path.
    pub header_name: String,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            header_name: "X-Bytes".to_string(),
        }
    }
}

/// Stats RPC endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Serve the stats RPC.
    pub enabled: bool,

    /// RPC bind address.
    pub bind_address: String,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1:8079".to_string(),
        }
    }
}

/// Built-in origin configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OriginConfig {
    /// Serve the informational origin.
    pub enabled: bool,

    /// Origin bind address. Usually the same as `backend.address`.
    pub bind_address: String,

    /// Static body returned for every request.
    pub greeting: String,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1:8081".to_string(),
            greeting: "Hello from the origin".to_string(),
        }
    }
}

/// HTTP/1.x parsing limits.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum size of a request or response head (start line + headers).
    pub max_head_bytes: usize,

    /// Maximum number of header fields in a head.
    pub max_headers: usize,

    /// Maximum size of a buffered (chunked or close-delimited) body.
    /// Content-Length bodies are streamed and not bounded by this.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_head_bytes: 64 * 1024,
            max_headers: 64,
            max_body_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    /// Log output format: "pretty" or "json".
    pub log_format: String,

    /// Enable the Prometheus metrics endpoint.
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
    fn empty_document_uses_defaults() {
        let config: ProxyConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.backend.address, "127.0.0.1:8081");
        assert_eq!(config.pool.capacity, 10);
        assert_eq!(config.pool.acquire_timeout(), Duration::from_millis(100));
        assert_eq!(config.stats.header_name, "X-Bytes");
        assert!(config.rpc.enabled);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [pool]
            capacity = 4

            [origin]
            enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(config.pool.capacity, 4);
        assert_eq!(config.pool.acquire_timeout_ms, 100);
        assert!(!config.origin.enabled);
        assert_eq!(config.origin.bind_address, "127.0.0.1:8081");
    }
}

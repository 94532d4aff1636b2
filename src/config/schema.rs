//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for the lifecycle service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Graceful shutdown settings.
    pub shutdown: ShutdownConfig,

    /// Health evaluation settings.
    pub health: HealthConfig,

    /// PostgreSQL connection.
    pub database: DatabaseConfig,

    /// Redis connection.
    pub cache: CacheConfig,

    /// Upload directory probe.
    pub filesystem: FilesystemConfig,

    /// Process memory probe.
    pub memory: MemoryConfig,

    /// Optional third-party integrations probed over HTTP.
    pub integrations: Vec<IntegrationConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Timeout configuration for request handling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Graceful shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Absolute bound on the whole shutdown sequence in milliseconds.
    pub deadline_ms: u64,

    /// Window given to in-flight connections before they are force-closed.
    pub drain_grace_ms: u64,
}

impl ShutdownConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    pub fn drain_grace(&self) -> Duration {
        Duration::from_millis(self.drain_grace_ms)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            deadline_ms: 30_000,
            drain_grace_ms: 5_000,
        }
    }
}

/// Health evaluation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Default timeout applied to each probe in milliseconds.
    pub probe_timeout_ms: u64,

    /// Report ready when the critical probes are only degraded.
    pub ready_when_degraded: bool,
}

impl HealthConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 5_000,
            ready_when_degraded: false,
        }
    }
}

/// PostgreSQL configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL. The probe reports `not_configured` when absent.
    pub url: Option<String>,

    /// Pool size.
    pub max_connections: u32,

    /// Time allowed to acquire a pooled connection in milliseconds.
    pub acquire_timeout_ms: u64,

    /// Whether a database failure makes the whole service unhealthy.
    pub critical: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            acquire_timeout_ms: 3_000,
            critical: true,
        }
    }
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Connection URL (e.g., "redis://127.0.0.1:6379").
    pub url: Option<String>,

    /// Whether a cache failure makes the whole service unhealthy.
    pub critical: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: None,
            critical: false,
        }
    }
}

/// Upload directory probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FilesystemConfig {
    pub enabled: bool,

    /// Directory the write/read round-trip is performed in.
    pub directory: PathBuf,

    pub critical: bool,
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: PathBuf::from("uploads"),
            critical: true,
        }
    }
}

/// Process memory probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub enabled: bool,

    /// Memory budget in megabytes. Falls back to host memory when unset.
    pub limit_mb: Option<u64>,

    pub critical: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            limit_mb: None,
            critical: false,
        }
    }
}

/// A third-party integration checked with an HTTP GET.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IntegrationConfig {
    /// Service name as it appears in the health report.
    pub name: String,

    /// Status URL. The probe reports `not_configured` when absent.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub critical: bool,

    /// Overrides `health.probe_timeout_ms` for this integration.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Registry persistence and breaker tuning.
    pub registry: RegistryConfig,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Ordered prefix table mapping gateway paths to services.
    pub routes: Vec<RouteConfig>,

    /// Composite endpoint settings.
    pub composite: CompositeConfig,

    /// Registration API protection.
    pub admin: AdminConfig,

    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            registry: RegistryConfig::default(),
            health_check: HealthCheckConfig::default(),
            timeouts: TimeoutConfig::default(),
            routes: default_routes(),
            composite: CompositeConfig::default(),
            admin: AdminConfig::default(),
            security: SecurityConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Registry store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// JSON file the registry is persisted to. `None` keeps it in memory.
    pub path: Option<String>,

    /// Consecutive failures that open a service's breaker.
    pub trip_threshold: u32,

    /// Seconds an open breaker waits before letting a trial call through.
    pub cooldown_secs: u64,

    /// Records not refreshed within this many seconds are swept.
    pub stale_after_secs: u64,

    /// How often the staleness sweep runs.
    pub sweep_interval_secs: u64,
}

impl RegistryConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: Some("data/service_registry.json".to_string()),
            trip_threshold: 3,
            cooldown_secs: 30,
            stale_after_secs: 90,
            sweep_interval_secs: 30,
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Health check interval in seconds.
    pub interval_secs: u64,

    /// Per-probe timeout in seconds.
    pub timeout_secs: u64,

    /// Path to probe on every registered service.
    pub path: String,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
            timeout_secs: 3,
            path: "/health".to_string(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upper bound for a whole inbound request in seconds.
    pub request_secs: u64,

    /// Passthrough proxy call timeout in milliseconds.
    pub proxy_ms: u64,

    /// Timeout for each constituent of a composite endpoint in milliseconds.
    pub composite_ms: u64,
}

impl TimeoutConfig {
    pub fn proxy(&self) -> Duration {
        Duration::from_millis(self.proxy_ms)
    }

    pub fn composite(&self) -> Duration {
        Duration::from_millis(self.composite_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            proxy_ms: 10_000,
            composite_ms: 5_000,
        }
    }
}

/// One row of the prefix table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Gateway-facing prefix (e.g. "/api/items").
    pub prefix: String,

    /// Registered service name to forward to.
    pub service: String,

    /// Service-local prefix substituted for `prefix` (e.g. "/items").
    pub rewrite: String,
}

impl RouteConfig {
    pub fn new(prefix: &str, service: &str, rewrite: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            service: service.to_string(),
            rewrite: rewrite.to_string(),
        }
    }
}

fn default_routes() -> Vec<RouteConfig> {
    vec![
        RouteConfig::new("/api/auth", "user-service", "/auth"),
        RouteConfig::new("/api/users", "user-service", "/users"),
        RouteConfig::new("/api/items", "item-service", "/items"),
        RouteConfig::new("/api/lists", "list-service", "/lists"),
    ]
}

/// Composite endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CompositeConfig {
    pub user_service: String,
    pub item_service: String,
    pub list_service: String,

    /// Path on the user service that validates a bearer credential.
    pub verify_path: String,

    /// Number of items shown on the dashboard.
    pub recent_items_limit: usize,
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            user_service: "user-service".to_string(),
            item_service: "item-service".to_string(),
            list_service: "list-service".to_string(),
            verify_path: "/users/verify".to_string(),
            recent_items_limit: 5,
        }
    }
}

/// Registration API configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Bearer key required by the registration endpoints. Empty disables the check.
    pub api_key: String,
}

/// Request hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
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

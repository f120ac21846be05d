//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds and timeouts > 0)
//! - Check the prefix table is well formed
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::GatewayConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    BindAddress(String),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("health probe timeout ({timeout}s) must be shorter than the interval ({interval}s)")]
    ProbeTimeout { timeout: u64, interval: u64 },

    #[error("health path '{0}' must start with '/'")]
    HealthPath(String),

    #[error("route prefix '{0}' must start with '/'")]
    RoutePrefix(String),

    #[error("route rewrite '{0}' must start with '/'")]
    RouteRewrite(String),

    #[error("route '{0}' has an empty service name")]
    RouteService(String),

    #[error("route prefix '{0}' is declared twice")]
    DuplicatePrefix(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    let non_zero = [
        ("registry.trip_threshold", config.registry.trip_threshold as u64),
        ("registry.cooldown_secs", config.registry.cooldown_secs),
        ("registry.stale_after_secs", config.registry.stale_after_secs),
        ("registry.sweep_interval_secs", config.registry.sweep_interval_secs),
        ("health_check.interval_secs", config.health_check.interval_secs),
        ("health_check.timeout_secs", config.health_check.timeout_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("timeouts.proxy_ms", config.timeouts.proxy_ms),
        ("timeouts.composite_ms", config.timeouts.composite_ms),
    ];
    for (field, value) in non_zero {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    let health = &config.health_check;
    if health.enabled && health.timeout_secs >= health.interval_secs {
        errors.push(ValidationError::ProbeTimeout {
            timeout: health.timeout_secs,
            interval: health.interval_secs,
        });
    }
    if !health.path.starts_with('/') {
        errors.push(ValidationError::HealthPath(health.path.clone()));
    }

    let mut seen = HashSet::new();
    for route in &config.routes {
        if !route.prefix.starts_with('/') {
            errors.push(ValidationError::RoutePrefix(route.prefix.clone()));
        }
        if !route.rewrite.starts_with('/') {
            errors.push(ValidationError::RouteRewrite(route.rewrite.clone()));
        }
        if route.service.trim().is_empty() {
            errors.push(ValidationError::RouteService(route.prefix.clone()));
        }
        if !seen.insert(route.prefix.trim_end_matches('/')) {
            errors.push(ValidationError::DuplicatePrefix(route.prefix.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RouteConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&GatewayConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = GatewayConfig::default();
        config.registry.trip_threshold = 0;
        config.health_check.timeout_secs = 30;
        config.routes.push(RouteConfig::new("api/broken", "", "/x"));
        config.routes.push(RouteConfig::new("/api/items/", "other", "/items"));

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::Zero { field: "registry.trip_threshold" }));
        assert!(errors.contains(&ValidationError::ProbeTimeout { timeout: 30, interval: 30 }));
        assert!(errors.contains(&ValidationError::RoutePrefix("api/broken".into())));
        assert!(errors.contains(&ValidationError::RouteService("api/broken".into())));
        assert!(errors.contains(&ValidationError::DuplicatePrefix("/api/items/".into())));
    }

    #[test]
    fn test_probe_timeout_ignored_when_checks_disabled() {
        let mut config = GatewayConfig::default();
        config.health_check.enabled = false;
        config.health_check.timeout_secs = 60;
        assert!(validate_config(&config).is_ok());
    }
}

//! Registry API and gateway health.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

use crate::admin::auth::AdminKey;
use crate::error::GatewayError;
use crate::http::server::AppState;
use crate::registry::ServiceRecord;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    pub url: String,
    /// Breaker closed.
    pub healthy: bool,
    pub registered_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Whole seconds since registration.
    pub uptime: u64,
    pub consecutive_failures: u32,
}

#[derive(Debug, Serialize)]
pub struct ServiceHealth {
    pub status: &'static str,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct GatewayHealth {
    pub service: &'static str,
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub services: BTreeMap<String, ServiceHealth>,
}

#[derive(Debug, Deserialize)]
pub struct Registration {
    pub name: String,
    pub url: String,
}

/// Records paired with their current breaker verdict. Reading the verdict
/// lets an elapsed cool-down close the breaker before it is reported.
fn snapshot(state: &AppState) -> Vec<(ServiceRecord, bool)> {
    state
        .registry
        .names()
        .into_iter()
        .filter_map(|name| {
            let open = state.registry.is_open(&name);
            state.registry.get(&name).map(|record| (record, !open))
        })
        .collect()
}

pub async fn list_registry(State(state): State<AppState>) -> Json<BTreeMap<String, RegistryEntry>> {
    let now = state.registry.clock().now();
    let entries = snapshot(&state)
        .into_iter()
        .map(|(record, healthy)| {
            let entry = RegistryEntry {
                url: record.base_url.clone(),
                healthy,
                registered_at: record.registered_at,
                last_seen: record.last_seen,
                uptime: record.uptime(now).as_secs(),
                consecutive_failures: record.consecutive_failures,
            };
            (record.name, entry)
        })
        .collect();
    Json(entries)
}

pub async fn gateway_health(State(state): State<AppState>) -> Json<GatewayHealth> {
    let services = snapshot(&state)
        .into_iter()
        .map(|(record, healthy)| {
            let health = ServiceHealth {
                status: if healthy { "healthy" } else { "unhealthy" },
                url: record.base_url,
            };
            (record.name, health)
        })
        .collect();

    Json(GatewayHealth {
        service: "api-gateway",
        status: "healthy",
        timestamp: state.registry.clock().now(),
        services,
    })
}

/// Accepts absolute `http` URLs only; a trailing slash is dropped.
fn normalize_base_url(raw: &str) -> Result<String, GatewayError> {
    let url = Url::parse(raw.trim()).map_err(|e| GatewayError::BadRequest(format!("invalid url `{raw}`: {e}")))?;
    if url.scheme() != "http" || url.host_str().is_none() {
        return Err(GatewayError::BadRequest(format!("url `{raw}` must be an http:// address")));
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}

pub async fn register_service(
    _key: AdminKey,
    State(state): State<AppState>,
    Json(registration): Json<Registration>,
) -> Result<(StatusCode, Json<ServiceRecord>), GatewayError> {
    let name = registration.name.trim();
    if name.is_empty() {
        return Err(GatewayError::BadRequest("service name must not be empty".into()));
    }
    let base_url = normalize_base_url(&registration.url)?;

    let record = state.registry.register(name, &base_url);
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn unregister_service(
    _key: AdminKey,
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> StatusCode {
    state.registry.unregister(&name);
    StatusCode::NO_CONTENT
}

pub async fn heartbeat(
    _key: AdminKey,
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, GatewayError> {
    if state.registry.mark_success(&name) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(GatewayError::UnknownService { service: name })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(normalize_base_url("http://localhost:3002/").unwrap(), "http://localhost:3002");
        assert_eq!(normalize_base_url("http://10.0.0.4:80/v1/").unwrap(), "http://10.0.0.4/v1");
        assert!(normalize_base_url("https://items.internal").is_err());
        assert!(normalize_base_url("items.internal:3002").is_err());
        assert!(normalize_base_url("not a url").is_err());
    }
}

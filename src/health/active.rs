//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every registered service
//! - Feed probe outcomes into the registry's breaker state
//!
//! Probes bypass the breaker: they are the only way an open breaker on an
//! idle service learns that the service came back.

use axum::body::Body;
use axum::http::{header, Request, Uri};
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::HealthCheckConfig;
use crate::observability::metrics;
use crate::registry::RegistryStore;
use crate::resilience::timeouts::describe;
use crate::routing::dispatch::{http_client, HttpClient};

/// Result of probing one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub service: String,
    pub healthy: bool,
    /// Why the probe failed, if it did.
    pub reason: Option<String>,
}

pub struct HealthMonitor {
    registry: Arc<RegistryStore>,
    config: HealthCheckConfig,
    client: HttpClient,
}

impl HealthMonitor {
    pub fn new(registry: Arc<RegistryStore>, config: HealthCheckConfig) -> Self {
        Self {
            registry,
            config,
            client: http_client(),
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            path = %self.config.path,
            "Health monitor starting"
        );

        let interval = Duration::from_secs(self.config.interval_secs);
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every registered service concurrently and record the outcomes.
    pub async fn check_all(&self) -> Vec<ProbeReport> {
        let probes = self
            .registry
            .list()
            .into_iter()
            .map(|record| async move {
                let outcome = self.probe(&record.base_url).await;
                (record.name, outcome)
            });

        let mut reports = Vec::new();
        for (service, outcome) in join_all(probes).await {
            let healthy = outcome.is_ok();
            match &outcome {
                Ok(()) => {
                    self.registry.mark_success(&service);
                }
                Err(reason) => {
                    tracing::warn!(service = %service, reason = %reason, "Health check failed");
                    self.registry.mark_failure(&service);
                }
            }
            metrics::record_service_health(&service, healthy);
            reports.push(ProbeReport {
                service,
                healthy,
                reason: outcome.err(),
            });
        }
        reports
    }

    async fn probe(&self, base_url: &str) -> Result<(), String> {
        let uri: Uri = format!("{}{}", base_url.trim_end_matches('/'), self.config.path)
            .parse()
            .map_err(|e| format!("invalid health URL: {e}"))?;

        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .header(header::USER_AGENT, "mesh-gateway-health-check")
            .body(Body::empty())
            .map_err(|e| format!("failed to build health check request: {e}"))?;

        let timeout = Duration::from_secs(self.config.timeout_secs);
        match time::timeout(timeout, self.client.request(request)).await {
            Ok(Ok(response)) if response.status().is_success() => Ok(()),
            Ok(Ok(response)) => Err(format!("non-success status {}", response.status())),
            Ok(Err(e)) => Err(format!("connection error: {}", describe(&e))),
            Err(_) => Err(format!("timeout after {}s", self.config.timeout_secs)),
        }
    }
}

//! Outbound calls to registered services.
//!
//! # Responsibilities
//! - Consult the breaker before any network activity
//! - Resolve the service endpoint from the registry
//! - Send with a deadline and feed the outcome back to the breaker
//!
//! # Design Decisions
//! - Any HTTP response (whatever the status) is a breaker success
//! - Only connection errors and timeouts are breaker failures
//! - Shared by the passthrough proxy and the composite endpoints

use axum::body::Body;
use axum::http::{header, HeaderValue, Method, Request, Response, Uri};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant};

use crate::error::GatewayError;
use crate::observability::metrics;
use crate::registry::RegistryStore;
use crate::resilience::timeouts::{call_with_timeout, describe};

/// Largest composite constituent body the gateway will buffer.
const MAX_JSON_BODY: usize = 4 * 1024 * 1024;

pub type HttpClient = Client<HttpConnector, Body>;

pub fn http_client() -> HttpClient {
    let mut connector = HttpConnector::new();
    connector.set_nodelay(true);
    Client::builder(TokioExecutor::new()).build(connector)
}

#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<RegistryStore>,
    client: HttpClient,
}

impl Dispatcher {
    pub fn new(registry: Arc<RegistryStore>) -> Self {
        Self {
            registry,
            client: http_client(),
        }
    }

    pub fn registry(&self) -> &Arc<RegistryStore> {
        &self.registry
    }

    /// Endpoint for `service` if its breaker is closed.
    pub fn target(&self, service: &str) -> Result<String, GatewayError> {
        if self.registry.is_open(service) {
            metrics::record_breaker_rejection(service);
            tracing::debug!(service = %service, "Circuit open, short-circuiting");
            return Err(GatewayError::BreakerOpen {
                service: service.to_string(),
            });
        }

        self.registry.resolve(service).ok_or_else(|| GatewayError::Unresolved {
            service: service.to_string(),
        })
    }

    /// Send `request` (whose URI holds only a path and query) to `service`.
    pub async fn send(
        &self,
        service: &str,
        mut request: Request<Body>,
        limit: Duration,
    ) -> Result<Response<Incoming>, GatewayError> {
        let base_url = self.target(service)?;

        let path_and_query = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let uri: Uri = format!("{}{}", base_url.trim_end_matches('/'), path_and_query)
            .parse()
            .map_err(|e| GatewayError::Internal(format!("bad endpoint for {service}: {e}")))?;
        *request.uri_mut() = uri;

        match call_with_timeout(service, limit, self.client.request(request)).await {
            Ok(response) => {
                self.registry.mark_success(service);
                Ok(response)
            }
            Err(e) => {
                tracing::warn!(service = %service, error = %e, "Downstream call failed");
                if e.is_breaker_failure() {
                    self.registry.mark_failure(service);
                }
                Err(e)
            }
        }
    }

    /// GET a JSON document from `service`, bounded by `limit` end to end.
    ///
    /// Non-success statuses come back as `GatewayError::Downstream`.
    pub async fn get_json(
        &self,
        service: &str,
        path_and_query: &str,
        credential: Option<&HeaderValue>,
        limit: Duration,
    ) -> Result<Value, GatewayError> {
        let deadline = Instant::now() + limit;

        let mut builder = Request::builder()
            .method(Method::GET)
            .uri(path_and_query)
            .header(header::ACCEPT, "application/json");
        if let Some(credential) = credential {
            builder = builder.header(header::AUTHORIZATION, credential.clone());
        }
        let request = builder
            .body(Body::empty())
            .map_err(|e| GatewayError::Internal(e.to_string()))?;

        let response = self.send(service, request, limit).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Downstream {
                service: service.to_string(),
                status,
            });
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        let read = axum::body::to_bytes(Body::new(response.into_body()), MAX_JSON_BODY);
        let bytes = match time::timeout(remaining, read).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => {
                return Err(GatewayError::InvalidResponse {
                    service: service.to_string(),
                    reason: describe(&e),
                })
            }
            Err(_) => {
                return Err(GatewayError::Timeout {
                    service: service.to_string(),
                    after: limit,
                })
            }
        };

        serde_json::from_slice(&bytes).map_err(|e| GatewayError::InvalidResponse {
            service: service.to_string(),
            reason: e.to_string(),
        })
    }
}

//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: registry API, gateway health, composites, proxy fallback
//! - Wire up middleware (panic guard, timeout, request ID, tracing)
//! - Start background tasks (health monitor, stale sweeper, registry persister, route reload)
//! - Serve until the shutdown signal fires

use arc_swap::ArcSwap;
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::aggregate::{dashboard_handler, search_handler, TokenVerifier, UserServiceVerifier};
use crate::config::GatewayConfig;
use crate::health::HealthMonitor;
use crate::http::proxy::proxy_handler;
use crate::registry::{RegistryError, RegistryPersister, RegistryStore, StaleSweeper, SystemClock};
use crate::resilience::BreakerPolicy;
use crate::routing::{Dispatcher, RouteTable};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub registry: Arc<RegistryStore>,
    /// Swapped wholesale when the config file changes.
    pub routes: Arc<ArcSwap<RouteTable>>,
    pub dispatcher: Dispatcher,
    pub verifier: Arc<dyn TokenVerifier>,
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    state: AppState,
}

impl GatewayServer {
    /// Build a server around an existing registry.
    pub fn new(config: GatewayConfig, registry: Arc<RegistryStore>) -> Self {
        let dispatcher = Dispatcher::new(registry.clone());
        let verifier = Arc::new(UserServiceVerifier::new(
            dispatcher.clone(),
            config.composite.user_service.clone(),
            config.composite.verify_path.clone(),
            config.timeouts.composite(),
        ));
        let routes = Arc::new(ArcSwap::from_pointee(RouteTable::from_config(&config.routes)));

        Self {
            state: AppState {
                config: Arc::new(config),
                registry,
                routes,
                dispatcher,
                verifier,
            },
        }
    }

    /// Open the registry described by `config` and build a server around it.
    pub fn from_config(config: GatewayConfig) -> Result<Self, RegistryError> {
        let policy = BreakerPolicy::new(config.registry.trip_threshold, config.registry.cooldown());
        let clock = Arc::new(SystemClock);
        let registry = match &config.registry.path {
            Some(path) => RegistryStore::open(path, policy, clock)?,
            None => RegistryStore::in_memory(policy, clock),
        };
        Ok(Self::new(config, Arc::new(registry)))
    }

    /// Replace the token verifier used by the dashboard.
    pub fn with_verifier(mut self, verifier: Arc<dyn TokenVerifier>) -> Self {
        self.state.verifier = verifier;
        self
    }

    pub fn registry(&self) -> &Arc<RegistryStore> {
        &self.state.registry
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.state.config
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// The proxy fallback enforces `max_body_size` itself; `DefaultBodyLimit`
    /// covers the JSON extractors of the registry API.
    #[allow(deprecated)]
    pub fn router(&self) -> Router {
        let config = &self.state.config;

        // Outermost first: the request id exists before tracing sees the request.
        let middleware = ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(CatchPanicLayer::custom(panic_response));

        Router::new()
            .route("/health", get(admin::handlers::gateway_health))
            .merge(admin::router())
            .route("/api/dashboard", get(dashboard_handler))
            .route("/api/search", get(search_handler))
            .fallback(proxy_handler)
            .layer(DefaultBodyLimit::max(config.security.max_body_size))
            .with_state(self.state.clone())
            .layer(middleware)
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        route_updates: mpsc::UnboundedReceiver<RouteTable>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let config = self.state.config.clone();
        tracing::info!(address = %addr, routes = self.state.routes.load().len(), "HTTP server starting");

        if config.health_check.enabled {
            let monitor = HealthMonitor::new(self.state.registry.clone(), config.health_check.clone());
            tokio::spawn(monitor.run(shutdown.resubscribe()));
        }

        let sweeper = StaleSweeper::new(
            self.state.registry.clone(),
            Duration::from_secs(config.registry.sweep_interval_secs),
            config.registry.stale_after(),
        );
        tokio::spawn(sweeper.run(shutdown.resubscribe()));

        let persister = RegistryPersister::new(self.state.registry.clone());
        let persister = tokio::spawn(persister.run(shutdown.resubscribe()));

        tokio::spawn(apply_route_updates(
            self.state.routes.clone(),
            route_updates,
            shutdown.resubscribe(),
        ));

        let app = self.router();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        // The persister flushes once more on shutdown; wait for that write.
        if let Err(e) = persister.await {
            tracing::error!(error = %e, "Registry persister task failed");
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Swap in every route table the config watcher delivers.
async fn apply_route_updates(
    routes: Arc<ArcSwap<RouteTable>>,
    mut updates: mpsc::UnboundedReceiver<RouteTable>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(table) = update else { break };
                tracing::info!(routes = table.len(), "Route table reloaded");
                routes.store(Arc::new(table));
            }
            _ = shutdown.recv() => break,
        }
    }
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "Handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "success": false,
            "error": "internal",
            "message": "internal gateway error",
        })),
    )
        .into_response()
}

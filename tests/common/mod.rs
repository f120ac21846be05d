//! Shared utilities for integration tests.
#![allow(dead_code)]

use axum::{
    body::Bytes,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::IntoResponse,
    Json, Router,
};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use mesh_gateway::config::{GatewayConfig, RegistryConfig};
use mesh_gateway::registry::{RegistryStore, SystemClock};
use mesh_gateway::resilience::BreakerPolicy;
use mesh_gateway::{GatewayServer, Shutdown};

/// A config suitable for tests: in-memory registry, no background probing,
/// short deadlines.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.registry = RegistryConfig {
        path: None,
        ..RegistryConfig::default()
    };
    config.health_check.enabled = false;
    config.timeouts.proxy_ms = 1_000;
    config.timeouts.composite_ms = 300;
    config
}

pub fn test_registry(config: &GatewayConfig) -> Arc<RegistryStore> {
    let policy = BreakerPolicy::new(config.registry.trip_threshold, config.registry.cooldown());
    Arc::new(RegistryStore::in_memory(policy, Arc::new(SystemClock)))
}

pub struct TestGateway {
    pub addr: SocketAddr,
    pub registry: Arc<RegistryStore>,
    pub shutdown: Shutdown,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Serve `server` on an ephemeral port.
pub async fn spawn_server(server: GatewayServer) -> TestGateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let registry = server.registry().clone();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let (_, route_updates) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let _ = server.run(listener, route_updates, server_shutdown).await;
    });

    TestGateway {
        addr,
        registry,
        shutdown,
    }
}

pub async fn spawn_gateway(config: GatewayConfig) -> TestGateway {
    let registry = test_registry(&config);
    spawn_server(GatewayServer::new(config, registry)).await
}

/// A client that never reuses connections, so each request is one accept.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Backend that answers every request with `status` and a JSON body.
pub async fn start_json_backend(status: StatusCode, body: Value) -> SocketAddr {
    start_delayed_backend(status, body, Duration::ZERO).await
}

/// Like `start_json_backend`, but each answer is held back by `delay`.
pub async fn start_delayed_backend(status: StatusCode, body: Value, delay: Duration) -> SocketAddr {
    let app = Router::new().fallback(move || {
        let body = body.clone();
        async move {
            tokio::time::sleep(delay).await;
            (status, Json(body))
        }
    });
    serve(app).await
}

#[derive(Debug, Clone)]
pub struct Captured {
    pub method: Method,
    pub uri: Uri,
    pub authorization: Option<String>,
    pub body: Bytes,
}

/// Backend that records every request it sees and answers 200 `{"ok":true}`.
pub async fn start_recording_backend() -> (SocketAddr, Arc<Mutex<Vec<Captured>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    let app = Router::new().fallback(move |method: Method, uri: Uri, headers: HeaderMap, body: Bytes| {
        let log = log.clone();
        async move {
            log.lock().unwrap().push(Captured {
                method,
                uri,
                authorization: headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string),
                body,
            });
            Json(serde_json::json!({ "ok": true })).into_response()
        }
    });
    (serve(app).await, seen)
}

/// Listener that accepts connections and closes them without answering.
/// Returns the number of connections accepted so far.
pub async fn start_dropping_listener() -> (SocketAddr, Arc<AtomicU32>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicU32::new(0));
    let count = accepted.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            count.fetch_add(1, Ordering::SeqCst);
            let _ = socket.shutdown().await;
        }
    });

    (addr, accepted)
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Write `request` on a fresh connection and return the response head the
/// server sends before closing or before `wait` elapses. The write half is
/// left open, so a declared body that was not fully sent stays pending.
pub async fn raw_exchange(addr: SocketAddr, request: &[u8], wait: Duration) -> String {
    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream.write_all(request).await.unwrap();

    let mut received = Vec::new();
    let _ = tokio::time::timeout(wait, async {
        let mut buf = [0u8; 1024];
        loop {
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    received.extend_from_slice(&buf[..n]);
                    if received.windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }
            }
        }
    })
    .await;
    String::from_utf8_lossy(&received).into_owned()
}

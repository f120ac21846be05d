//! Client-side body faults are answered as client errors and never count
//! against the target service's breaker.

use axum::http::StatusCode;
use serde_json::json;
use std::time::Duration;

mod common;

fn chunked_post(path: &str, size: usize) -> Vec<u8> {
    let mut request = format!(
        "POST {path} HTTP/1.1\r\nHost: gateway\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n{size:x}\r\n"
    )
    .into_bytes();
    request.extend(std::iter::repeat(b'x').take(size));
    request.extend_from_slice(b"\r\n0\r\n\r\n");
    request
}

#[tokio::test]
async fn test_oversize_chunked_body_is_413_without_breaker_effect() {
    let (items_addr, seen) = common::start_recording_backend().await;
    let mut config = common::test_config();
    config.security.max_body_size = 16;
    let gateway = common::spawn_gateway(config).await;
    gateway.registry.register("item-service", &format!("http://{items_addr}"));

    for attempt in 1..=3 {
        let head = common::raw_exchange(gateway.addr, &chunked_post("/api/items", 200), Duration::from_secs(5)).await;
        assert!(head.starts_with("HTTP/1.1 413"), "attempt {attempt}: {head}");
        assert!(!head.contains("item-service"), "attempt {attempt}: {head}");
    }

    let record = gateway.registry.get("item-service").unwrap();
    assert_eq!(record.consecutive_failures, 0);
    assert!(!gateway.registry.is_open("item-service"));
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_declared_oversize_body_is_413() {
    let (items_addr, seen) = common::start_recording_backend().await;
    let mut config = common::test_config();
    config.security.max_body_size = 16;
    let gateway = common::spawn_gateway(config).await;
    gateway.registry.register("item-service", &format!("http://{items_addr}"));

    let res = common::client()
        .post(gateway.url("/api/items"))
        .body(vec![b'x'; 200])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "payload_too_large");

    // At the limit is still forwarded.
    let res = common::client()
        .post(gateway.url("/api/items"))
        .body(vec![b'x'; 16])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(seen.lock().unwrap().len(), 1);
    assert_eq!(gateway.registry.get("item-service").unwrap().consecutive_failures, 0);
}

#[tokio::test]
async fn test_stalled_upload_is_408_without_breaker_effect() {
    let (items_addr, seen) = common::start_recording_backend().await;
    let mut config = common::test_config();
    config.timeouts.proxy_ms = 300;
    let gateway = common::spawn_gateway(config).await;
    gateway.registry.register("item-service", &format!("http://{items_addr}"));

    let request = b"POST /api/items HTTP/1.1\r\nHost: gateway\r\nContent-Length: 10\r\n\r\nabc";
    for attempt in 1..=3 {
        let head = common::raw_exchange(gateway.addr, request, Duration::from_secs(5)).await;
        assert!(head.starts_with("HTTP/1.1 408"), "attempt {attempt}: {head}");
    }

    let record = gateway.registry.get("item-service").unwrap();
    assert_eq!(record.consecutive_failures, 0);
    assert!(!gateway.registry.is_open("item-service"));
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_client_disconnect_mid_upload_leaves_breaker_closed() {
    let items_addr = common::start_json_backend(StatusCode::OK, json!([])).await;
    let gateway = common::spawn_gateway(common::test_config()).await;
    gateway.registry.register("item-service", &format!("http://{items_addr}"));

    for _ in 0..3 {
        let mut stream = tokio::net::TcpStream::connect(gateway.addr).await.unwrap();
        tokio::io::AsyncWriteExt::write_all(
            &mut stream,
            b"POST /api/items HTTP/1.1\r\nHost: gateway\r\nContent-Length: 100\r\n\r\nhello",
        )
        .await
        .unwrap();
        drop(stream);
    }
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(gateway.registry.get("item-service").unwrap().consecutive_failures, 0);
    assert!(!gateway.registry.is_open("item-service"));

    let res = common::client().get(gateway.url("/api/items")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

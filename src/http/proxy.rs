//! Passthrough proxy handler.
//!
//! Matches the prefix table, forwards the request to the resolved service
//! and relays the downstream response verbatim. Downstream error statuses
//! pass through unchanged; only gateway-side failures are synthesized.
//!
//! The client body is read in full before anything is sent downstream, so
//! an oversize, stalled or aborted upload is answered as a client error and
//! never counts against the target's breaker.

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{
        header::{HeaderValue, CONTENT_LENGTH},
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Response},
};
use futures_util::StreamExt;
use std::time::{Duration, Instant};

use crate::error::GatewayError;
use crate::http::headers::{clean_response_headers, forwardable_request_headers};
use crate::http::request::{request_id, X_REQUEST_ID};
use crate::http::server::AppState;
use crate::observability::metrics;

pub async fn proxy_handler(State(state): State<AppState>, request: Request) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(request.headers()).to_string();
    let method = request.method().clone();
    let method_str = method.to_string();
    let path = request.uri().path().to_string();

    // 1. Match route
    let target = {
        let routes = state.routes.load();
        routes.resolve(&path, request.uri().query())
    };
    let Some(target) = target else {
        tracing::debug!(request_id = %request_id, path = %path, "No route matched");
        metrics::record_request(&method_str, StatusCode::NOT_FOUND.as_u16(), "none", start_time);
        return GatewayError::NoRoute { path }.into_response();
    };

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        service = %target.service,
        upstream_path = %target.path_and_query,
        "Proxying request"
    );

    // 2. Take the client body under the size cap and the proxy deadline
    let (parts, body) = request.into_parts();
    let limit = state.config.security.max_body_size;
    let body = match read_client_body(&parts.headers, body, limit, state.config.timeouts.proxy()).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::info!(request_id = %request_id, path = %path, error = %e, "Rejected client body");
            metrics::record_request(&method_str, e.status().as_u16(), &target.service, start_time);
            return e.into_response();
        }
    };

    // 3. Build the downstream request
    let mut builder = axum::http::Request::builder()
        .method(method)
        .uri(target.path_and_query.as_str());
    if let Some(headers) = builder.headers_mut() {
        *headers = forwardable_request_headers(&parts.headers);
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            headers.insert(X_REQUEST_ID, value);
        }
    }
    let outbound = match builder.body(Body::from(body)) {
        Ok(req) => req,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Failed to build downstream request");
            return GatewayError::Internal("failed to build downstream request".into()).into_response();
        }
    };

    // 4. Forward through the breaker
    match state
        .dispatcher
        .send(&target.service, outbound, state.config.timeouts.proxy())
        .await
    {
        Ok(response) => {
            metrics::record_request(&method_str, response.status().as_u16(), &target.service, start_time);
            let (mut parts, body) = response.into_parts();
            clean_response_headers(&mut parts.headers);
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::warn!(request_id = %request_id, service = %target.service, error = %e, "Proxy request failed");
            metrics::record_request(&method_str, e.status().as_u16(), &target.service, start_time);
            e.into_response()
        }
    }
}

/// Collect the inbound body, failing fast on a declared length above `limit`.
async fn read_client_body(
    headers: &HeaderMap,
    body: Body,
    limit: usize,
    deadline: Duration,
) -> Result<Bytes, GatewayError> {
    let declared = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if declared.is_some_and(|len| len > limit as u64) {
        return Err(GatewayError::PayloadTooLarge { limit });
    }

    let collect = async {
        let mut stream = body.into_data_stream();
        let mut buf = Vec::with_capacity(declared.map_or(0, |len| len as usize));
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| GatewayError::BadRequest(format!("request body aborted: {e}")))?;
            if buf.len() + chunk.len() > limit {
                return Err(GatewayError::PayloadTooLarge { limit });
            }
            buf.extend_from_slice(&chunk);
        }
        Ok(Bytes::from(buf))
    };

    tokio::time::timeout(deadline, collect)
        .await
        .map_err(|_| GatewayError::RequestTimeout { after: deadline })?
}

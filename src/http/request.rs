//! Request identification.
//!
//! Every inbound request carries an `x-request-id` (generated by
//! `SetRequestIdLayer` when the client sent none). The id is forwarded to
//! downstream services and echoed back on the response.

use axum::http::HeaderMap;

pub const X_REQUEST_ID: &str = "x-request-id";

/// The request id set by the middleware, or "unknown" outside the stack.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

//! Gateway error taxonomy and its HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Dependency known bad; no network attempt was made.
    #[error("service {service} is temporarily unavailable (circuit open)")]
    BreakerOpen { service: String },

    /// Never registered, or removed by unregister/sweep.
    #[error("service {service} is not registered")]
    Unresolved { service: String },

    #[error("service {service} did not answer within {}ms", .after.as_millis())]
    Timeout { service: String, after: Duration },

    #[error("service {service} is unreachable: {reason}")]
    Unreachable { service: String, reason: String },

    /// Reachable downstream answered with a non-success status.
    #[error("service {service} answered {status}")]
    Downstream { service: String, status: StatusCode },

    /// Downstream answered but the body was unusable.
    #[error("service {service} sent an unreadable response: {reason}")]
    InvalidResponse { service: String, reason: String },

    #[error("no route for {path}")]
    NoRoute { path: String },

    /// Registry API call naming a service that is not registered.
    #[error("service {service} is not registered")]
    UnknownService { service: String },

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    BadRequest(String),

    /// Inbound body larger than `security.max_body_size`.
    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// Client did not finish sending its body in time.
    #[error("request body not received within {}ms", .after.as_millis())]
    RequestTimeout { after: Duration },

    #[error("internal gateway error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Network-level failures count against the service's breaker.
    pub fn is_breaker_failure(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Unreachable { .. })
    }

    /// The dependency this error is about, if any.
    pub fn service(&self) -> Option<&str> {
        match self {
            Self::BreakerOpen { service }
            | Self::Unresolved { service }
            | Self::Timeout { service, .. }
            | Self::Unreachable { service, .. }
            | Self::Downstream { service, .. }
            | Self::InvalidResponse { service, .. }
            | Self::UnknownService { service } => Some(service),
            _ => None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BreakerOpen { .. } | Self::Unresolved { .. } | Self::Timeout { .. } | Self::Unreachable { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Downstream { status, .. } => *status,
            Self::InvalidResponse { .. } => StatusCode::BAD_GATEWAY,
            Self::NoRoute { .. } | Self::UnknownService { .. } => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::RequestTimeout { .. } => StatusCode::REQUEST_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BreakerOpen { .. } => "circuit_open",
            Self::Unresolved { .. } => "not_registered",
            Self::Timeout { .. } => "timeout",
            Self::Unreachable { .. } => "unreachable",
            Self::Downstream { .. } => "downstream_error",
            Self::InvalidResponse { .. } => "invalid_response",
            Self::NoRoute { .. } | Self::UnknownService { .. } => "not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::BadRequest(_) => "bad_request",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::RequestTimeout { .. } => "request_timeout",
            Self::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "success": false,
            "error": self.kind(),
            "message": self.to_string(),
        });
        if let Some(service) = self.service() {
            body["service"] = json!(service);
        }
        (self.status(), Json(body)).into_response()
    }
}

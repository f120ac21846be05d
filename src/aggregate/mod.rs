//! Composite endpoints.
//!
//! # Data Flow
//! ```text
//! GET /api/dashboard | /api/search
//!     → precondition (credential / search term), else 401 / 400 with no downstream call
//!     → constituents issued concurrently through routing::Dispatcher
//!       (each still obeys its own breaker and timeout)
//!     → wait for all to settle
//!     → failed constituent → placeholder slice
//!     → { "success": true, "data": ... }
//! ```
//!
//! # Design Decisions
//! - Never fail fast: one slice failing must not hide the others
//! - A partial failure is never surfaced as a top-level error

pub mod dashboard;
pub mod search;
pub mod verifier;

use axum::http::{header, HeaderMap, HeaderValue};
use serde::Serialize;

pub use dashboard::{dashboard_handler, Dashboard};
pub use search::{normalize_results, search_handler, SearchResults, SearchSlice};
pub use verifier::{TokenVerifier, UserServiceVerifier, Verification};

/// Response wrapper shared by the composite endpoints.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data }
    }
}

/// The `Authorization` value if it carries a non-empty bearer token.
pub fn bearer_credential(headers: &HeaderMap) -> Option<&HeaderValue> {
    let value = headers.get(header::AUTHORIZATION)?;
    let text = value.to_str().ok()?;
    let (scheme, token) = text.split_once(' ')?;
    (scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty()).then_some(value)
}
